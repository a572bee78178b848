use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::app::ports::{BrowserPort, HttpClientPort};
use crate::common::constants::{
    BACKOFF_BASE_MS, BACKOFF_CAP_MS, BACKOFF_MULTIPLIER, CLICK_WAIT_MS, DEFAULT_ALERT_FROM,
    DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_RESEND_BASE_URL, DEFAULT_USER_AGENT, MAX_FETCH_ATTEMPTS,
    NOTIFY_EMAIL_VAR, RESEND_API_KEY_VAR, SCROLL_WAIT_MS, SETTLE_WAIT_MS,
};
use crate::common::error::ConfigError;
use crate::gateway::{DriverTimings, FetchGateway, RetryPolicy};
use crate::infra::{ChromiumBrowser, ReqwestHttp, ResendMailer};

pub const CONFIG_PATH_VAR: &str = "GIGRADAR_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub fetch: FetchConfig,
    pub browser: BrowserConfig,
    pub orchestrator: OrchestratorConfig,
    pub alert: AlertConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_ms: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            max_attempts: MAX_FETCH_ATTEMPTS,
            backoff_base_ms: BACKOFF_BASE_MS,
            backoff_cap_ms: BACKOFF_CAP_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BrowserConfig {
    pub chromium_path: Option<PathBuf>,
    pub headless: bool,
    pub settle_ms: u64,
    pub click_wait_ms: u64,
    pub scroll_wait_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chromium_path: None,
            headless: true,
            settle_ms: SETTLE_WAIT_MS,
            click_wait_ms: CLICK_WAIT_MS,
            scroll_wait_ms: SCROLL_WAIT_MS,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub concurrency: usize,
    pub pushgateway_url: Option<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            pushgateway_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlertConfig {
    pub notify_email: Option<String>,
    pub resend_api_key: Option<String>,
    pub from: String,
    pub resend_base_url: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            notify_email: None,
            resend_api_key: None,
            from: DEFAULT_ALERT_FROM.to_string(),
            resend_base_url: DEFAULT_RESEND_BASE_URL.to_string(),
        }
    }
}

impl Config {
    /// `.env`, then the TOML file, then process environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let mut config = Self::load_from(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Read a TOML file; a missing file yields the defaults.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply overrides from `lookup`, usually the process environment.
    /// Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(NOTIFY_EMAIL_VAR) {
            self.alert.notify_email = Some(v);
        }
        if let Some(v) = get(RESEND_API_KEY_VAR) {
            self.alert.resend_api_key = Some(v);
        }
        if let Some(v) = get("ALERT_FROM") {
            self.alert.from = v;
        }
        if let Some(v) = get("CHROMIUM_PATH") {
            self.browser.chromium_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("GIGRADAR_CONCURRENCY") {
            self.orchestrator.concurrency = v
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    key: "GIGRADAR_CONCURRENCY",
                    value: v.clone(),
                })?;
        }
        if let Some(v) = get("GIGRADAR_PUSHGATEWAY_URL") {
            self.orchestrator.pushgateway_url = Some(v);
        }
        self.validate()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "fetch.max_attempts",
                value: "0".into(),
            });
        }
        if self.orchestrator.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                key: "orchestrator.concurrency",
                value: "0".into(),
            });
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch.timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.fetch.max_attempts,
            base: Duration::from_millis(self.fetch.backoff_base_ms),
            multiplier: BACKOFF_MULTIPLIER,
            cap: Duration::from_millis(self.fetch.backoff_cap_ms),
        }
    }

    pub fn driver_timings(&self) -> DriverTimings {
        DriverTimings {
            settle: Duration::from_millis(self.browser.settle_ms),
            click_wait: Duration::from_millis(self.browser.click_wait_ms),
            scroll_wait: Duration::from_millis(self.browser.scroll_wait_ms),
        }
    }

    /// Production gateway: reqwest for static pages, Chromium for rendered ones.
    pub fn build_gateway(&self) -> anyhow::Result<FetchGateway> {
        let http: Arc<dyn HttpClientPort> = Arc::new(ReqwestHttp::new(&self.fetch.user_agent)?);
        let browser: Arc<dyn BrowserPort> = Arc::new(self.build_browser());
        Ok(FetchGateway::new(http, browser)
            .with_policy(self.retry_policy())
            .with_timings(self.driver_timings()))
    }

    /// CDP commands share the fetch timeout so `goto` is bounded by the request, not a fixed cap.
    pub fn build_browser(&self) -> ChromiumBrowser {
        ChromiumBrowser::new(self.browser.chromium_path.clone(), self.browser.headless)
            .with_user_agent(self.fetch.user_agent.clone())
            .with_request_timeout(self.fetch_timeout())
    }

    pub fn build_mailer(&self) -> ResendMailer {
        ResendMailer::new(self.alert.resend_api_key.clone())
            .with_from(self.alert.from.clone())
            .with_base_url(self.alert.resend_base_url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(dir.path().join("absent.toml")).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.driver_timings(), DriverTimings::default());
        assert_eq!(config.orchestrator.concurrency, 1);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[fetch]\ntimeout_ms = 5000\n\n[browser]\nheadless = false\n\n[orchestrator]\nconcurrency = 4"
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();

        assert_eq!(config.fetch_timeout(), Duration::from_millis(5000));
        assert_eq!(config.fetch.max_attempts, 3);
        assert!(!config.browser.headless);
        assert_eq!(config.browser.settle_ms, 3000);
        assert_eq!(config.orchestrator.concurrency, 4);
        assert_eq!(config.alert.from, DEFAULT_ALERT_FROM);
    }

    #[test]
    fn test_browser_request_timeout_tracks_fetch_timeout() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[fetch]\ntimeout_ms = 90000").unwrap();

        let config = Config::load_from(file.path()).unwrap();

        assert_eq!(config.build_browser().request_timeout(), Duration::from_secs(90));
    }

    #[test]
    fn test_malformed_file_is_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[fetch\ntimeout_ms = ").unwrap();

        assert!(matches!(Config::load_from(file.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_overrides_win_over_file_values() {
        let env: HashMap<&str, &str> = [
            ("NOTIFY_EMAIL", "ops@example.com"),
            ("RESEND_API_KEY", "re_123"),
            ("GIGRADAR_CONCURRENCY", "3"),
            ("CHROMIUM_PATH", ""),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.alert.notify_email.as_deref(), Some("ops@example.com"));
        assert_eq!(config.alert.resend_api_key.as_deref(), Some("re_123"));
        assert_eq!(config.orchestrator.concurrency, 3);
        assert!(config.browser.chromium_path.is_none());
    }

    #[test]
    fn test_invalid_concurrency_override() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(|k| (k == "GIGRADAR_CONCURRENCY").then(|| "many".to_string()))
            .unwrap_err();

        assert!(matches!(
            err,
            ConfigError::InvalidValue { key: "GIGRADAR_CONCURRENCY", .. }
        ));
    }
}
