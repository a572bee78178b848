pub mod alert_use_case;
pub mod ports;

pub use alert_use_case::{build_alert_message, AlertMessage, AlertOutcome, AlertUseCase};
