use std::time::Duration;
use thiserror::Error;

use crate::common::constants::RETRYABLE_STATUS_CODES;

/// Failure of a single strategy invocation, before the retry policy has decided anything.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    #[error("HTTP {status}")]
    Status { status: u16 },

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("navigation timed out after {0:?}")]
    NavigationTimeout(Duration),

    #[error("browser error: {0}")]
    Browser(String),
}

impl AttemptError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            AttemptError::Status { status } => Some(*status),
            _ => None,
        }
    }

    /// Static path classifier: retryable statuses, connection failures and timeouts.
    pub fn is_retryable_static(&self) -> bool {
        match self {
            AttemptError::Status { status } => RETRYABLE_STATUS_CODES.contains(status),
            AttemptError::Connect(_) | AttemptError::Timeout(_) => true,
            _ => false,
        }
    }

    /// Rendered path classifier. Browser automation failures are treated as transient,
    /// so every error is retried, timeouts included.
    pub fn is_retryable_rendered(&self) -> bool {
        true
    }

    /// Label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            AttemptError::Status { .. } => "status",
            AttemptError::Connect(_) => "connect",
            AttemptError::Timeout(_) => "timeout",
            AttemptError::Request(_) => "request",
            AttemptError::NavigationTimeout(_) => "navigation_timeout",
            AttemptError::Browser(_) => "browser",
        }
    }
}

impl From<reqwest::Error> for AttemptError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AttemptError::Timeout(err.to_string())
        } else if err.is_connect() {
            AttemptError::Connect(err.to_string())
        } else if let Some(status) = err.status() {
            AttemptError::Status { status: status.as_u16() }
        } else {
            AttemptError::Request(err.to_string())
        }
    }
}

/// The single error kind surfaced by the fetch gateway.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("permanent failure fetching {url} on attempt {attempts}: {source}")]
    Permanent {
        url: String,
        attempts: u32,
        source: AttemptError,
    },

    #[error("failed to fetch {url} after {attempts} attempts: {source}")]
    Exhausted {
        url: String,
        attempts: u32,
        source: AttemptError,
    },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::Permanent { url, .. } | FetchError::Exhausted { url, .. } => url,
        }
    }

    pub fn last_error(&self) -> &AttemptError {
        match self {
            FetchError::Permanent { source, .. } | FetchError::Exhausted { source, .. } => source,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        self.last_error().status_code()
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, FetchError::Permanent { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            FetchError::Permanent { attempts, .. } | FetchError::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum AlertError {
    #[error("{0} not set, cannot send alert")]
    ConfigMissing(&'static str),

    #[error("alert transport failed: {0}")]
    Transport(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}
