//! Interactive page driver: navigation, settle-wait, click loop, scroll loop and snapshot.

use std::time::Duration;
use tracing::{debug, info, instrument};

use super::{ClickSpec, ScrollSpec};
use crate::app::ports::{BrowserPort, PageSession};
use crate::common::constants::{
    CLICK_WAIT_MS, CONVERGENCE_THRESHOLD, SCROLL_WAIT_MS, SETTLE_WAIT_MS,
};
use crate::common::error::AttemptError;

/// Fixed waits used by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverTimings {
    pub settle: Duration,
    pub click_wait: Duration,
    pub scroll_wait: Duration,
}

impl Default for DriverTimings {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(SETTLE_WAIT_MS),
            click_wait: Duration::from_millis(CLICK_WAIT_MS),
            scroll_wait: Duration::from_millis(SCROLL_WAIT_MS),
        }
    }
}

impl DriverTimings {
    pub fn none() -> Self {
        Self {
            settle: Duration::ZERO,
            click_wait: Duration::ZERO,
            scroll_wait: Duration::ZERO,
        }
    }
}

/// Counts consecutive unchanged measurements of a scroll signal.
#[derive(Debug, Clone)]
pub struct ConvergenceTracker {
    previous: u64,
    unchanged: u32,
    threshold: u32,
}

impl ConvergenceTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            previous: 0,
            unchanged: 0,
            threshold,
        }
    }

    /// Record a measurement; returns true once the signal has converged.
    pub fn observe(&mut self, measurement: u64) -> bool {
        if measurement == self.previous {
            self.unchanged += 1;
        } else {
            self.unchanged = 0;
            self.previous = measurement;
        }
        self.unchanged >= self.threshold
    }
}

impl Default for ConvergenceTracker {
    fn default() -> Self {
        Self::new(CONVERGENCE_THRESHOLD)
    }
}

/// What the interactive loops actually did; logged, not returned to callers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InteractionSummary {
    pub clicks: u32,
    pub scrolls: u32,
    pub converged: bool,
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

pub struct PageDriver<'a> {
    browser: &'a dyn BrowserPort,
    timings: DriverTimings,
}

impl<'a> PageDriver<'a> {
    pub fn new(browser: &'a dyn BrowserPort, timings: DriverTimings) -> Self {
        Self { browser, timings }
    }

    /// One complete rendered fetch. The session is closed on every exit path.
    #[instrument(skip(self, click, scroll))]
    pub async fn render(
        &self,
        url: &str,
        timeout: Duration,
        click: Option<&ClickSpec>,
        scroll: Option<&ScrollSpec>,
    ) -> Result<String, AttemptError> {
        let mut session = self.browser.open_session().await?;
        let outcome = self
            .drive(session.as_mut(), url, timeout, click, scroll)
            .await;
        session.close().await;

        let (content, summary) = outcome?;
        info!(
            "Rendered {} ({} bytes, {} clicks, {} scrolls, converged: {})",
            url,
            content.len(),
            summary.clicks,
            summary.scrolls,
            summary.converged
        );
        Ok(content)
    }

    async fn drive(
        &self,
        session: &mut dyn PageSession,
        url: &str,
        timeout: Duration,
        click: Option<&ClickSpec>,
        scroll: Option<&ScrollSpec>,
    ) -> Result<(String, InteractionSummary), AttemptError> {
        session.goto(url, timeout).await?;
        pause(self.timings.settle).await;

        let mut summary = InteractionSummary::default();
        if let Some(spec) = click.filter(|c| c.max_clicks > 0) {
            summary.clicks = self.click_loop(session, spec).await;
        }
        if let Some(spec) = scroll.filter(|s| s.max_scrolls > 0) {
            let (scrolls, converged) = self.scroll_loop(session, spec).await?;
            summary.scrolls = scrolls;
            summary.converged = converged;
        }

        let content = session.content().await?;
        Ok((content, summary))
    }

    /// Click the first matching element until it disappears or the budget runs out.
    /// Errors while locating or clicking only end the loop.
    pub async fn click_loop(&self, session: &mut dyn PageSession, spec: &ClickSpec) -> u32 {
        let mut clicks = 0;
        for _ in 0..spec.max_clicks {
            match session.is_first_visible(&spec.selector).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!("'{}' no longer visible after {} clicks", spec.selector, clicks);
                    break;
                }
                Err(e) => {
                    debug!("Stopping click loop on '{}': {}", spec.selector, e);
                    break;
                }
            }
            if let Err(e) = session.click_first(&spec.selector).await {
                debug!("Stopping click loop on '{}': {}", spec.selector, e);
                break;
            }
            clicks += 1;
            pause(self.timings.click_wait).await;
        }
        clicks
    }

    /// Scroll to the bottom until the measured signal stops changing or the budget runs out.
    /// Returns the number of scrolls performed and whether the loop converged.
    pub async fn scroll_loop(
        &self,
        session: &mut dyn PageSession,
        spec: &ScrollSpec,
    ) -> Result<(u32, bool), AttemptError> {
        let mut tracker = ConvergenceTracker::default();
        let mut scrolls = 0;
        for _ in 0..spec.max_scrolls {
            session.scroll_to_bottom().await?;
            scrolls += 1;
            pause(self.timings.scroll_wait).await;

            let measurement = match &spec.convergence_selector {
                Some(selector) => session.count_elements(selector).await?,
                None => session.scroll_height().await?,
            };
            if tracker.observe(measurement) {
                debug!("Scroll converged after {} scrolls at {}", scrolls, measurement);
                return Ok((scrolls, true));
            }
        }
        Ok((scrolls, false))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Shared record of what a fake session was asked to do
    #[derive(Debug, Default)]
    pub struct SessionLog {
        pub opened: u32,
        pub closed: u32,
        pub gotos: Vec<String>,
        pub clicks: u32,
        pub scrolls: u32,
    }

    #[derive(Clone, Default)]
    pub struct FakeScript {
        /// Navigation error returned by every session
        pub fail_goto: Option<AttemptError>,
        /// Number of leading sessions whose navigation fails
        pub fail_goto_times: u32,
        /// Visibility answers for successive lookups; missing entries mean invisible
        pub visible: Vec<bool>,
        /// Successive measurements; the last one repeats
        pub measurements: Vec<u64>,
        pub content: String,
    }

    pub struct FakeBrowser {
        pub script: FakeScript,
        pub log: Arc<Mutex<SessionLog>>,
    }

    impl FakeBrowser {
        pub fn new(script: FakeScript) -> Self {
            Self {
                script,
                log: Arc::new(Mutex::new(SessionLog::default())),
            }
        }
    }

    struct FakeSession {
        script: FakeScript,
        goto_error: Option<AttemptError>,
        visible: VecDeque<bool>,
        measurements: VecDeque<u64>,
        last_measurement: u64,
        log: Arc<Mutex<SessionLog>>,
    }

    #[async_trait]
    impl BrowserPort for FakeBrowser {
        async fn open_session(&self) -> Result<Box<dyn PageSession>, AttemptError> {
            let index = {
                let mut log = self.log.lock().unwrap();
                log.opened += 1;
                log.opened
            };
            let goto_error = self.script.fail_goto.clone().or_else(|| {
                (index <= self.script.fail_goto_times)
                    .then(|| AttemptError::Browser(format!("navigation {index} failed")))
            });
            Ok(Box::new(FakeSession {
                script: self.script.clone(),
                goto_error,
                visible: self.script.visible.clone().into(),
                measurements: self.script.measurements.clone().into(),
                last_measurement: 0,
                log: self.log.clone(),
            }))
        }
    }

    impl FakeSession {
        fn next_measurement(&mut self) -> u64 {
            if let Some(m) = self.measurements.pop_front() {
                self.last_measurement = m;
            }
            self.last_measurement
        }
    }

    #[async_trait]
    impl PageSession for FakeSession {
        async fn goto(&mut self, url: &str, _timeout: Duration) -> Result<(), AttemptError> {
            self.log.lock().unwrap().gotos.push(url.to_string());
            match &self.goto_error {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }

        async fn is_first_visible(&mut self, _selector: &str) -> Result<bool, AttemptError> {
            Ok(self.visible.pop_front().unwrap_or(false))
        }

        async fn click_first(&mut self, _selector: &str) -> Result<(), AttemptError> {
            self.log.lock().unwrap().clicks += 1;
            Ok(())
        }

        async fn scroll_to_bottom(&mut self) -> Result<(), AttemptError> {
            self.log.lock().unwrap().scrolls += 1;
            Ok(())
        }

        async fn count_elements(&mut self, _selector: &str) -> Result<u64, AttemptError> {
            Ok(self.next_measurement())
        }

        async fn scroll_height(&mut self) -> Result<u64, AttemptError> {
            Ok(self.next_measurement())
        }

        async fn content(&mut self) -> Result<String, AttemptError> {
            Ok(self.script.content.clone())
        }

        async fn close(self: Box<Self>) {
            self.log.lock().unwrap().closed += 1;
        }
    }

    fn scroll_spec(max_scrolls: u32, selector: Option<&str>) -> ScrollSpec {
        ScrollSpec {
            max_scrolls,
            convergence_selector: selector.map(str::to_string),
        }
    }

    #[test]
    fn test_convergence_tracker_needs_three_unchanged() {
        let mut tracker = ConvergenceTracker::default();
        assert!(!tracker.observe(10));
        assert!(!tracker.observe(10));
        assert!(!tracker.observe(10));
        assert!(tracker.observe(10));
    }

    #[test]
    fn test_convergence_tracker_resets_on_change() {
        let mut tracker = ConvergenceTracker::default();
        assert!(!tracker.observe(5));
        assert!(!tracker.observe(5));
        assert!(!tracker.observe(6));
        assert!(!tracker.observe(6));
        assert!(!tracker.observe(6));
        assert!(tracker.observe(6));
    }

    #[tokio::test]
    async fn test_scroll_stops_after_three_unchanged_counts() {
        let browser = FakeBrowser::new(FakeScript {
            measurements: vec![10, 20],
            content: "<html>ok</html>".into(),
            ..Default::default()
        });
        let driver = PageDriver::new(&browser, DriverTimings::none());
        let content = driver
            .render(
                "https://example.com",
                Duration::from_secs(1),
                None,
                Some(&scroll_spec(50, Some("a.event"))),
            )
            .await
            .unwrap();

        assert_eq!(content, "<html>ok</html>");
        let log = browser.log.lock().unwrap();
        assert_eq!(log.scrolls, 5);
        assert_eq!(log.closed, 1);
    }

    #[tokio::test]
    async fn test_scroll_never_exceeds_budget() {
        let browser = FakeBrowser::new(FakeScript {
            measurements: vec![100, 200, 300, 400, 500, 600],
            ..Default::default()
        });
        let driver = PageDriver::new(&browser, DriverTimings::none());
        let mut session = browser.open_session().await.unwrap();
        let (scrolls, converged) = driver
            .scroll_loop(session.as_mut(), &scroll_spec(4, None))
            .await
            .unwrap();

        assert_eq!(scrolls, 4);
        assert!(!converged);
        assert_eq!(browser.log.lock().unwrap().scrolls, 4);
    }

    #[tokio::test]
    async fn test_click_loop_stops_when_button_disappears() {
        let browser = FakeBrowser::new(FakeScript {
            visible: vec![true, true, false, true],
            ..Default::default()
        });
        let driver = PageDriver::new(&browser, DriverTimings::none());
        let spec = ClickSpec {
            selector: "button.more".into(),
            max_clicks: 20,
        };
        driver
            .render("https://example.com", Duration::from_secs(1), Some(&spec), None)
            .await
            .unwrap();

        assert_eq!(browser.log.lock().unwrap().clicks, 2);
    }

    #[tokio::test]
    async fn test_click_loop_respects_max_clicks() {
        let browser = FakeBrowser::new(FakeScript {
            visible: vec![true; 10],
            ..Default::default()
        });
        let driver = PageDriver::new(&browser, DriverTimings::none());
        let mut session = browser.open_session().await.unwrap();
        let spec = ClickSpec {
            selector: "button.more".into(),
            max_clicks: 3,
        };

        assert_eq!(driver.click_loop(session.as_mut(), &spec).await, 3);
    }

    #[tokio::test]
    async fn test_zero_budgets_skip_interaction() {
        let browser = FakeBrowser::new(FakeScript {
            visible: vec![true; 5],
            measurements: vec![1, 2, 3],
            ..Default::default()
        });
        let driver = PageDriver::new(&browser, DriverTimings::none());
        let click = ClickSpec {
            selector: "button".into(),
            max_clicks: 0,
        };
        driver
            .render(
                "https://example.com",
                Duration::from_secs(1),
                Some(&click),
                Some(&scroll_spec(0, None)),
            )
            .await
            .unwrap();

        let log = browser.log.lock().unwrap();
        assert_eq!(log.clicks, 0);
        assert_eq!(log.scrolls, 0);
    }

    #[tokio::test]
    async fn test_session_closed_when_navigation_fails() {
        let browser = FakeBrowser::new(FakeScript {
            fail_goto: Some(AttemptError::NavigationTimeout(Duration::from_secs(30))),
            ..Default::default()
        });
        let driver = PageDriver::new(&browser, DriverTimings::none());
        let result = driver
            .render("https://example.com", Duration::from_secs(30), None, None)
            .await;

        assert!(matches!(result, Err(AttemptError::NavigationTimeout(_))));
        let log = browser.log.lock().unwrap();
        assert_eq!(log.opened, 1);
        assert_eq!(log.closed, 1);
    }
}
