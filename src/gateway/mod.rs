//! Fetch gateway: the only path by which scraper units reach the network.
//!
//! A request is served either by the static HTTP fetcher or by the interactive
//! page driver, wrapped in the retry policy with the classifier that fits the
//! chosen strategy. Failures come back as a single [`FetchError`].

pub mod page_driver;
pub mod retry;

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::app::ports::{BrowserPort, HttpClientPort};
use crate::common::constants::DEFAULT_FETCH_TIMEOUT_MS;
use crate::common::error::{AttemptError, FetchError};
use crate::observability::metrics::fetch as fetch_metrics;
pub use page_driver::{DriverTimings, PageDriver};
pub use retry::{retry, Attempted, RetryError, RetryPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Server-rendered HTML, no script execution
    Static,
    /// DOM snapshot from a headless browser
    Rendered,
}

impl FetchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchMode::Static => "static",
            FetchMode::Rendered => "rendered",
        }
    }
}

/// "Load more" button to press repeatedly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickSpec {
    pub selector: String,
    /// Zero disables clicking
    pub max_clicks: u32,
}

/// Infinite-scroll settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollSpec {
    /// Zero disables scrolling
    pub max_scrolls: u32,
    /// Elements to count for convergence; page height is used when absent
    pub convergence_selector: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    url: String,
    mode: FetchMode,
    timeout: Duration,
    click: Option<ClickSpec>,
    scroll: Option<ScrollSpec>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>, mode: FetchMode) -> Self {
        Self {
            url: url.into(),
            mode,
            timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
            click: None,
            scroll: None,
        }
    }

    pub fn static_page(url: impl Into<String>) -> Self {
        Self::new(url, FetchMode::Static)
    }

    pub fn rendered(url: impl Into<String>) -> Self {
        Self::new(url, FetchMode::Rendered)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_click(mut self, selector: impl Into<String>, max_clicks: u32) -> Self {
        self.click = Some(ClickSpec {
            selector: selector.into(),
            max_clicks,
        });
        self
    }

    pub fn with_scroll(mut self, max_scrolls: u32, convergence_selector: Option<&str>) -> Self {
        self.scroll = Some(ScrollSpec {
            max_scrolls,
            convergence_selector: convergence_selector.map(str::to_string),
        });
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn mode(&self) -> FetchMode {
        self.mode
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn click(&self) -> Option<&ClickSpec> {
        self.click.as_ref()
    }

    pub fn scroll(&self) -> Option<&ScrollSpec> {
        self.scroll.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub content: String,
    pub attempts: u32,
}

pub struct FetchGateway {
    http: Arc<dyn HttpClientPort>,
    browser: Arc<dyn BrowserPort>,
    policy: RetryPolicy,
    timings: DriverTimings,
}

impl FetchGateway {
    pub fn new(http: Arc<dyn HttpClientPort>, browser: Arc<dyn BrowserPort>) -> Self {
        Self {
            http,
            browser,
            policy: RetryPolicy::default(),
            timings: DriverTimings::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timings(mut self, timings: DriverTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    #[instrument(skip(self, request), fields(url = %request.url(), mode = request.mode().as_str()))]
    pub async fn fetch(&self, request: &FetchRequest) -> Result<FetchResult, FetchError> {
        let mode = request.mode();
        let started = Instant::now();
        debug!("Fetching {} ({})", request.url(), mode.as_str());

        let outcome = match mode {
            FetchMode::Static => {
                if request.click().is_some() || request.scroll().is_some() {
                    debug!("Ignoring interactive actions for static fetch");
                }
                retry(&self.policy, AttemptError::is_retryable_static, |attempt| {
                    fetch_metrics::attempt(mode.as_str(), attempt);
                    self.http.get_text(request.url(), request.timeout())
                })
                .await
            }
            FetchMode::Rendered => {
                let driver = PageDriver::new(self.browser.as_ref(), self.timings);
                retry(&self.policy, AttemptError::is_retryable_rendered, |attempt| {
                    fetch_metrics::attempt(mode.as_str(), attempt);
                    driver.render(
                        request.url(),
                        request.timeout(),
                        request.click(),
                        request.scroll(),
                    )
                })
                .await
            }
        };
        fetch_metrics::duration(mode.as_str(), started.elapsed().as_secs_f64());

        match outcome {
            Ok(Attempted { value, attempts }) => {
                info!(
                    "Fetched {} ({} bytes, {} attempt(s))",
                    request.url(),
                    value.len(),
                    attempts
                );
                Ok(FetchResult {
                    content: value,
                    attempts,
                })
            }
            Err(RetryError::Permanent { error, attempts }) => {
                warn!(
                    "Permanent failure for {} on attempt {}: {}",
                    request.url(),
                    attempts,
                    error
                );
                fetch_metrics::failure(mode.as_str(), "permanent");
                Err(FetchError::Permanent {
                    url: request.url().to_string(),
                    attempts,
                    source: error,
                })
            }
            Err(RetryError::Exhausted { error, attempts }) => {
                warn!(
                    "Giving up on {} after {} attempts: {}",
                    request.url(),
                    attempts,
                    error
                );
                fetch_metrics::failure(mode.as_str(), "exhausted");
                Err(FetchError::Exhausted {
                    url: request.url().to_string(),
                    attempts,
                    source: error,
                })
            }
        }
    }

    /// Convenience form used by scraper units
    pub async fn fetch_page(
        &self,
        url: &str,
        mode: FetchMode,
        timeout: Duration,
        click: Option<ClickSpec>,
        scroll: Option<ScrollSpec>,
    ) -> Result<String, FetchError> {
        let request = FetchRequest {
            url: url.to_string(),
            mode,
            timeout,
            click,
            scroll,
        };
        self.fetch(&request).await.map(|result| result.content)
    }
}
