use std::sync::Arc;
use std::time::Duration;

use crate::apis::ateneul::AteneulScraper;
use crate::apis::enescu::EnescuScraper;
use crate::apis::jfr::JfrScraper;
use crate::common::constants::{self, get_supported_units};
use crate::common::types::ScraperUnit;
use crate::gateway::FetchGateway;

/// Build the unit registered under `name`, sharing one fetch gateway.
pub fn create_unit(
    name: &str,
    gateway: Arc<FetchGateway>,
    timeout: Duration,
) -> Option<Arc<dyn ScraperUnit>> {
    match name {
        constants::JFR_UNIT => Some(Arc::new(JfrScraper::new(gateway, timeout))),
        constants::ENESCU_UNIT => Some(Arc::new(EnescuScraper::new(gateway, timeout))),
        constants::ATENEUL_UNIT => Some(Arc::new(AteneulScraper::new(gateway, timeout))),
        _ => None,
    }
}

/// Every registered unit, in registration order
pub fn create_all_units(gateway: Arc<FetchGateway>, timeout: Duration) -> Vec<Arc<dyn ScraperUnit>> {
    get_supported_units()
        .into_iter()
        .filter_map(|name| create_unit(name, gateway.clone(), timeout))
        .collect()
}
