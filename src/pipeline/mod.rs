// Orchestration run: invoke every registered scraper unit and collect results and failures

pub mod orchestrator;

pub use orchestrator::{short_unit_name, Orchestrator, RunReport, ScraperError};
