use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::common::types::{Category, Event, ScraperUnit};
use crate::observability::metrics::units as unit_metrics;

/// Failure record for one unit invocation within one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScraperError {
    pub unit_name: String,
    pub message: String,
    pub trace: String,
}

impl ScraperError {
    pub fn new(
        unit_name: impl Into<String>,
        message: impl Into<String>,
        trace: impl Into<String>,
    ) -> Self {
        Self {
            unit_name: unit_name.into(),
            message: message.into(),
            trace: trace.into(),
        }
    }

    /// Record an error returned by a unit. The message carries the full cause chain;
    /// the trace adds the backtrace when one was captured.
    pub fn from_error(qualified_name: &str, err: &anyhow::Error) -> Self {
        Self::new(
            short_unit_name(qualified_name),
            format!("{err:#}"),
            format!("{err:?}"),
        )
    }

    fn from_panic(qualified_name: &str, payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        Self::new(
            short_unit_name(qualified_name),
            format!("unit panicked: {message}"),
            format!("panic in {qualified_name}: {message}"),
        )
    }
}

/// Last fragment of a qualified unit name, e.g. `scrapers.music.jfr` -> `jfr`
pub fn short_unit_name(qualified: &str) -> &str {
    qualified
        .rsplit(|c: char| c == '.' || c == ':')
        .find(|fragment| !fragment.is_empty())
        .unwrap_or(qualified)
}

/// Combined outcome of one orchestration run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub results: BTreeMap<Category, Vec<Event>>,
    pub errors: Vec<ScraperError>,
    pub units_invoked: usize,
    pub units_succeeded: usize,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            completed_at: None,
            results: Category::all().into_iter().map(|c| (c, Vec::new())).collect(),
            errors: Vec::new(),
            units_invoked: 0,
            units_succeeded: 0,
        }
    }

    pub fn events(&self, category: Category) -> &[Event] {
        self.results.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total_events(&self) -> usize {
        self.results.values().map(Vec::len).sum()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|end| end - self.started_at)
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

enum UnitOutcome {
    Success(Vec<Event>),
    Failure(ScraperError),
}

/// Runs registered scraper units, isolating each one in its own task.
pub struct Orchestrator {
    units: Vec<Arc<dyn ScraperUnit>>,
    concurrency: usize,
}

impl Orchestrator {
    /// Sequential orchestrator over units in registration order
    pub fn new(units: Vec<Arc<dyn ScraperUnit>>) -> Self {
        Self {
            units,
            concurrency: 1,
        }
    }

    /// Allow up to `concurrency` units in flight; results keep registration order.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub async fn run(&self) -> RunReport {
        let mut report = RunReport::new();
        let span = info_span!("orchestration_run", run_id = %report.run_id);

        async {
            info!(
                "Starting run over {} units (concurrency {})",
                self.units.len(),
                self.concurrency
            );

            let outcomes: Vec<(Arc<dyn ScraperUnit>, UnitOutcome)> =
                stream::iter(self.units.iter().cloned())
                    .map(|unit| async move {
                        let outcome = Self::run_unit(unit.clone()).await;
                        (unit, outcome)
                    })
                    .buffered(self.concurrency)
                    .collect()
                    .await;

            for (unit, outcome) in outcomes {
                report.units_invoked += 1;
                match outcome {
                    UnitOutcome::Success(events) => {
                        report.units_succeeded += 1;
                        report
                            .results
                            .entry(unit.category())
                            .or_default()
                            .extend(events);
                    }
                    UnitOutcome::Failure(failure) => report.errors.push(failure),
                }
            }

            report.complete();
            if report.has_errors() {
                warn!(
                    "Run finished: {}/{} units succeeded, {} events, {} failures",
                    report.units_succeeded,
                    report.units_invoked,
                    report.total_events(),
                    report.errors.len()
                );
            } else {
                info!(
                    "Run finished: {} units succeeded, {} events",
                    report.units_succeeded,
                    report.total_events()
                );
            }
        }
        .instrument(span)
        .await;

        report
    }

    /// Invoke one unit in its own task so that errors and panics stay contained.
    async fn run_unit(unit: Arc<dyn ScraperUnit>) -> UnitOutcome {
        let name = unit.name().to_string();
        let span = info_span!("unit", name = %short_unit_name(&name));
        let task_unit = unit.clone();
        let handle = tokio::spawn(async move { task_unit.scrape().await }.instrument(span));

        match handle.await {
            Ok(Ok(events)) => {
                info!("✓ {}: {} events", short_unit_name(&name), events.len());
                unit_metrics::succeeded(events.len());
                UnitOutcome::Success(events)
            }
            Ok(Err(err)) => {
                error!("✗ {}: {:#}", short_unit_name(&name), err);
                unit_metrics::failed();
                UnitOutcome::Failure(ScraperError::from_error(&name, &err))
            }
            Err(join_err) => {
                error!("✗ {}: task failed: {}", short_unit_name(&name), join_err);
                unit_metrics::failed();
                let failure = if join_err.is_panic() {
                    ScraperError::from_panic(&name, join_err.into_panic().as_ref())
                } else {
                    ScraperError::new(
                        short_unit_name(&name),
                        join_err.to_string(),
                        join_err.to_string(),
                    )
                };
                UnitOutcome::Failure(failure)
            }
        }
    }
}
