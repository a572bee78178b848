use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use gigradar::apis::{create_all_units, create_unit};
use gigradar::app::{AlertOutcome, AlertUseCase};
use gigradar::common::constants::get_supported_units;
use gigradar::common::types::{Category, ScraperUnit};
use gigradar::config::Config;
use gigradar::gateway::{FetchGateway, FetchMode, FetchRequest};
use gigradar::observability::{init_logging, push_run_summary};
use gigradar::pipeline::{Orchestrator, RunReport, ScraperError};

#[derive(Parser)]
#[command(name = "gigradar")]
#[command(about = "Bucharest event scrapers with failure alerts")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scraper units and report failures
    Run {
        /// Specific units to run (comma-separated). Defaults to all
        #[arg(long)]
        units: Option<String>,
        /// Email an alert when any unit fails
        #[arg(long)]
        alert: bool,
        /// Units to run at the same time
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Send a synthetic alert to check mail configuration
    AlertTest,
    /// List registered units
    List,
    /// Run a single unit and print its events
    Scrape {
        #[arg(long)]
        unit: String,
        /// Print events as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fetch one page through the gateway
    Fetch {
        #[arg(long)]
        url: String,
        /// Render with a headless browser
        #[arg(long)]
        rendered: bool,
        #[arg(long)]
        click_selector: Option<String>,
        #[arg(long, default_value_t = 0)]
        max_clicks: u32,
        #[arg(long, default_value_t = 0)]
        max_scrolls: u32,
        #[arg(long)]
        scroll_selector: Option<String>,
        /// Write content to this file instead of stdout
        #[arg(long)]
        output: Option<String>,
    },
}

fn resolve_units(
    names: Option<String>,
    gateway: Arc<FetchGateway>,
    timeout: Duration,
) -> Result<Vec<Arc<dyn ScraperUnit>>> {
    let Some(list) = names else {
        return Ok(create_all_units(gateway, timeout));
    };
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|name| {
            create_unit(name, gateway.clone(), timeout).with_context(|| {
                format!(
                    "Unknown unit '{}'. Available: {}",
                    name,
                    get_supported_units().join(", ")
                )
            })
        })
        .collect()
}

fn print_summary(report: &RunReport) {
    println!("\n📊 Run {} summary:", report.run_id);
    for category in Category::all() {
        println!("   {}: {} events", category, report.events(category).len());
    }
    println!("   Total events: {}", report.total_events());
    println!(
        "   Units succeeded: {}/{}",
        report.units_succeeded, report.units_invoked
    );
    if let Some(duration) = report.duration() {
        println!("   Duration: {:.1}s", duration.num_milliseconds() as f64 / 1000.0);
    }

    if report.has_errors() {
        println!("\n⚠️  {} unit(s) failed:", report.errors.len());
        for err in &report.errors {
            println!("   - {}: {}", err.unit_name, err.message);
        }
    }
}

async fn dispatch_alert(config: &Config, errors: &[ScraperError]) {
    let use_case = AlertUseCase::new(Arc::new(config.build_mailer()));
    match use_case
        .send_scraper_alert(errors, config.alert.notify_email.as_deref())
        .await
    {
        Ok(AlertOutcome::Sent { failures }) => {
            println!("📧 Alert sent for {} failed unit(s)", failures)
        }
        Ok(AlertOutcome::Skipped) => println!("✅ No failures, no alert sent"),
        Err(e) => {
            error!("Alert dispatch failed: {}", e);
            println!("❌ Could not send alert: {}", e);
        }
    }
}

async fn run(
    config: &Config,
    units: Option<String>,
    alert: bool,
    concurrency: Option<usize>,
) -> Result<ExitCode> {
    let gateway = Arc::new(config.build_gateway()?);
    let units = resolve_units(units, gateway, config.fetch_timeout())?;
    let concurrency = concurrency.unwrap_or(config.orchestrator.concurrency).max(1);

    println!("🔄 Running {} unit(s)...", units.len());
    let orchestrator = Orchestrator::new(units).with_concurrency(concurrency);
    let report = orchestrator.run().await;
    print_summary(&report);

    if let Some(url) = &config.orchestrator.pushgateway_url {
        push_run_summary(url, &report).await;
    }

    if report.has_errors() {
        if alert {
            dispatch_alert(config, &report.errors).await;
        } else {
            info!("Alerting disabled, {} error(s) only printed", report.errors.len());
        }
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

async fn scrape(config: &Config, name: &str, json: bool) -> Result<ExitCode> {
    let gateway = Arc::new(config.build_gateway()?);
    let Some(unit) = create_unit(name, gateway, config.fetch_timeout()) else {
        bail!(
            "Unknown unit '{}'. Available: {}",
            name,
            get_supported_units().join(", ")
        );
    };

    let events = unit.scrape().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&events)?);
    } else {
        println!("\n🎵 {} events from {}:", events.len(), unit.name());
        for event in &events {
            println!(
                "   {} | {} | {}{}",
                event.date.format("%Y-%m-%d %H:%M"),
                event.title,
                event.venue,
                event
                    .price
                    .as_ref()
                    .map(|p| format!(" | {p}"))
                    .unwrap_or_default()
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[allow(clippy::too_many_arguments)]
async fn fetch(
    config: &Config,
    url: String,
    rendered: bool,
    click_selector: Option<String>,
    max_clicks: u32,
    max_scrolls: u32,
    scroll_selector: Option<String>,
    output: Option<String>,
) -> Result<ExitCode> {
    let gateway = config.build_gateway()?;
    let mode = if rendered {
        FetchMode::Rendered
    } else {
        FetchMode::Static
    };
    let mut request = FetchRequest::new(url, mode).with_timeout(config.fetch_timeout());
    if let Some(selector) = click_selector {
        request = request.with_click(selector, max_clicks);
    }
    if max_scrolls > 0 {
        request = request.with_scroll(max_scrolls, scroll_selector.as_deref());
    }

    let result = gateway.fetch(&request).await?;
    match output {
        Some(path) => {
            tokio::fs::write(&path, &result.content)
                .await
                .with_context(|| format!("Failed to write {path}"))?;
            println!(
                "💾 Saved {} bytes to {} ({} attempt(s))",
                result.content.len(),
                path,
                result.attempts
            );
        }
        None => println!("{}", result.content),
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let cli = Cli::parse();
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = match cli.command {
        Commands::Run {
            units,
            alert,
            concurrency,
        } => run(&config, units, alert, concurrency).await,
        Commands::AlertTest => {
            println!("📧 Sending test alert...");
            let errors = vec![ScraperError::new(
                "test_scraper",
                "This is a test error to verify alerting works",
                "Synthetic failure raised by `gigradar alert-test`",
            )];
            dispatch_alert(&config, &errors).await;
            Ok(ExitCode::SUCCESS)
        }
        Commands::List => config.build_gateway().map(|gateway| {
            println!("Registered units:");
            for unit in create_all_units(Arc::new(gateway), config.fetch_timeout()) {
                println!("   {} ({})", unit.name(), unit.category());
            }
            ExitCode::SUCCESS
        }),
        Commands::Scrape { unit, json } => scrape(&config, &unit, json).await,
        Commands::Fetch {
            url,
            rendered,
            click_selector,
            max_clicks,
            max_scrolls,
            scroll_selector,
            output,
        } => {
            fetch(
                &config,
                url,
                rendered,
                click_selector,
                max_clicks,
                max_scrolls,
                scroll_selector,
                output,
            )
            .await
        }
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            warn!("Command failed: {:#}", e);
            eprintln!("❌ {e:#}");
            ExitCode::FAILURE
        }
    }
}
