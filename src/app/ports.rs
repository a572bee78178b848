use async_trait::async_trait;
use std::time::Duration;

use crate::common::error::{AlertError, AttemptError};

// Fetch-side ports
#[async_trait]
pub trait HttpClientPort: Send + Sync {
    /// Single GET following redirects; non-2xx statuses become `AttemptError::Status`.
    async fn get_text(&self, url: &str, timeout: Duration) -> Result<String, AttemptError>;
}

#[async_trait]
pub trait BrowserPort: Send + Sync {
    /// Launch an isolated session owned exclusively by the caller.
    async fn open_session(&self) -> Result<Box<dyn PageSession>, AttemptError>;
}

/// One headless browser page. Implementations must release every resource in `close`.
#[async_trait]
pub trait PageSession: Send {
    /// Navigate and wait for DOMContentLoaded, bounded by `timeout`.
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), AttemptError>;

    /// Whether the first element matching `selector` exists and is visible.
    async fn is_first_visible(&mut self, selector: &str) -> Result<bool, AttemptError>;

    async fn click_first(&mut self, selector: &str) -> Result<(), AttemptError>;

    async fn scroll_to_bottom(&mut self) -> Result<(), AttemptError>;

    async fn count_elements(&mut self, selector: &str) -> Result<u64, AttemptError>;

    async fn scroll_height(&mut self) -> Result<u64, AttemptError>;

    /// Serialized DOM of the current page
    async fn content(&mut self) -> Result<String, AttemptError>;

    async fn close(self: Box<Self>);
}

// Alert-side ports
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait MailSenderPort: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), AlertError>;
}
