// Observability: metrics, logging, and run-summary push

pub mod logging;
pub mod metrics;
pub mod pushgateway;

// Re-export main functions for ease of use
pub use logging::init_logging;
pub use pushgateway::push_run_summary;
