//! Headless Chromium adapter for the page driver.
//!
//! Every session launches its own browser process, so concurrent rendered
//! fetches never share pages, cookies or handler tasks.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::app::ports::{BrowserPort, PageSession};
use crate::common::constants::{DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_USER_AGENT};
use crate::common::error::AttemptError;

fn browser_err(err: impl std::fmt::Display) -> AttemptError {
    AttemptError::Browser(err.to_string())
}

/// Quote a selector as a JavaScript string literal.
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Where a navigation stands, judged from the page's location and readyState
#[derive(Debug, Clone, PartialEq, Eq)]
enum NavigationState {
    /// Still on the blank page or parsing the new document
    Pending,
    /// DOMContentLoaded has fired for the target document
    DomReady,
    /// Chrome replaced the page with its own error document
    Failed(String),
}

#[derive(Deserialize)]
struct PageProbe {
    href: String,
    #[serde(rename = "readyState")]
    ready_state: String,
}

const PAGE_PROBE_JS: &str = "({ href: document.location.href, readyState: document.readyState })";

fn navigation_state(probe: &PageProbe) -> NavigationState {
    if probe.href.starts_with("chrome-error://") {
        return NavigationState::Failed(format!("navigation ended on {}", probe.href));
    }
    if probe.href == "about:blank" || probe.ready_state == "loading" {
        return NavigationState::Pending;
    }
    NavigationState::DomReady
}

pub struct ChromiumBrowser {
    executable: Option<PathBuf>,
    headless: bool,
    request_timeout: Duration,
    user_agent: String,
}

impl ChromiumBrowser {
    pub fn new(executable: Option<PathBuf>, headless: bool) -> Self {
        Self {
            executable,
            headless,
            request_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Upper bound for a single CDP command. Keep it at least as long as the fetch timeout.
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    fn config(&self) -> Result<BrowserConfig, AttemptError> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(self.request_timeout)
            .window_size(1920, 1080)
            .arg(format!("--user-agent={}", self.user_agent))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-gpu")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox");
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        if !self.headless {
            builder = builder.with_head();
        }
        builder.build().map_err(browser_err)
    }
}

#[async_trait]
impl BrowserPort for ChromiumBrowser {
    async fn open_session(&self) -> Result<Box<dyn PageSession>, AttemptError> {
        let (browser, mut handler) = Browser::launch(self.config()?)
            .await
            .map_err(browser_err)?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {:?}", e);
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(browser_err(e));
            }
        };

        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler,
            navigation: None,
        }))
    }
}

pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    /// `Page::goto` resolves only on the load event, so it runs detached
    navigation: Option<JoinHandle<Result<(), AttemptError>>>,
}

impl ChromiumSession {
    /// Poll until the target document has fired DOMContentLoaded.
    async fn wait_for_dom(
        &self,
        navigation: &mut JoinHandle<Result<(), AttemptError>>,
    ) -> Result<(), AttemptError> {
        loop {
            if navigation.is_finished() {
                // goto only resolves after the load event, so success implies a parsed DOM
                return navigation.await.map_err(browser_err)?;
            }
            // The execution context is replaced mid-navigation, so probe errors are expected
            if let Ok(probe) = self.eval::<PageProbe>(PAGE_PROBE_JS.to_string()).await {
                match navigation_state(&probe) {
                    NavigationState::DomReady => return Ok(()),
                    NavigationState::Failed(reason) => return Err(AttemptError::Browser(reason)),
                    NavigationState::Pending => {}
                }
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T, AttemptError> {
        self.page
            .evaluate(script)
            .await
            .map_err(browser_err)?
            .into_value::<T>()
            .map_err(browser_err)
    }
}

#[async_trait]
impl PageSession for ChromiumSession {
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), AttemptError> {
        if let Some(previous) = self.navigation.take() {
            previous.abort();
        }
        let page = self.page.clone();
        let target = url.to_string();
        let mut navigation = tokio::spawn(async move {
            page.goto(target).await.map(|_| ()).map_err(browser_err)
        });

        let outcome = tokio::time::timeout(timeout, self.wait_for_dom(&mut navigation))
            .await
            .map_err(|_| AttemptError::NavigationTimeout(timeout))
            .and_then(|inner| inner);
        if outcome.is_err() || navigation.is_finished() {
            navigation.abort();
        } else {
            self.navigation = Some(navigation);
        }
        outcome
    }

    async fn is_first_visible(&mut self, selector: &str) -> Result<bool, AttemptError> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                const style = window.getComputedStyle(el);
                const rect = el.getBoundingClientRect();
                return style.visibility !== 'hidden' && style.display !== 'none'
                    && rect.width > 0 && rect.height > 0;
            }})()"#,
            sel = js_string(selector)
        );
        self.eval(script).await
    }

    async fn click_first(&mut self, selector: &str) -> Result<(), AttemptError> {
        let element = self.page.find_element(selector).await.map_err(browser_err)?;
        element.click().await.map_err(browser_err)?;
        Ok(())
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), AttemptError> {
        self.page
            .evaluate("window.scrollTo(0, document.body.scrollHeight)")
            .await
            .map_err(browser_err)?;
        Ok(())
    }

    async fn count_elements(&mut self, selector: &str) -> Result<u64, AttemptError> {
        let script = format!(
            "document.querySelectorAll({}).length",
            js_string(selector)
        );
        self.eval(script).await
    }

    async fn scroll_height(&mut self) -> Result<u64, AttemptError> {
        self.eval("document.body ? document.body.scrollHeight : 0".to_string())
            .await
    }

    async fn content(&mut self) -> Result<String, AttemptError> {
        self.page.content().await.map_err(browser_err)
    }

    async fn close(mut self: Box<Self>) {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Failed to wait for browser exit: {}", e);
        }
        if let Some(navigation) = self.navigation.take() {
            navigation.abort();
        }
        self.handler.abort();
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        if let Some(navigation) = self.navigation.take() {
            navigation.abort();
        }
        self.handler.abort();
    }
}
