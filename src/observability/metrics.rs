//! Metric recording helpers, organized by phase.
//!
//! Recording goes through the `metrics` facade; without an installed recorder
//! every call is a no-op, which is what tests and one-off CLI runs get.

/// Fetch gateway metrics
pub mod fetch {
    pub fn attempt(mode: &'static str, attempt: u32) {
        metrics::counter!("gigradar_fetch_attempts_total", "mode" => mode).increment(1);
        if attempt > 1 {
            metrics::counter!("gigradar_fetch_retries_total", "mode" => mode).increment(1);
        }
    }

    pub fn failure(mode: &'static str, kind: &'static str) {
        metrics::counter!("gigradar_fetch_failures_total", "mode" => mode, "kind" => kind)
            .increment(1);
    }

    pub fn duration(mode: &'static str, secs: f64) {
        metrics::histogram!("gigradar_fetch_duration_seconds", "mode" => mode).record(secs);
    }
}

/// Orchestrator metrics
pub mod units {
    pub fn succeeded(events: usize) {
        metrics::counter!("gigradar_units_total", "outcome" => "success").increment(1);
        metrics::histogram!("gigradar_unit_events").record(events as f64);
    }

    pub fn failed() {
        metrics::counter!("gigradar_units_total", "outcome" => "failure").increment(1);
    }
}

/// Alert dispatch metrics
pub mod alerts {
    pub fn outcome(outcome: &'static str) {
        metrics::counter!("gigradar_alerts_total", "outcome" => outcome).increment(1);
    }
}
