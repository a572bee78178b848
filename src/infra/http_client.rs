use async_trait::async_trait;
use reqwest::redirect;
use std::time::Duration;

use crate::app::ports::HttpClientPort;
use crate::common::constants::MAX_REDIRECTS;
use crate::common::error::AttemptError;

pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    pub fn new(user_agent: &str) -> Result<Self, AttemptError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClientPort for ReqwestHttp {
    async fn get_text(&self, url: &str, timeout: Duration) -> Result<String, AttemptError> {
        let resp = self.client.get(url).timeout(timeout).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AttemptError::Status {
                status: status.as_u16(),
            });
        }
        Ok(resp.text().await?)
    }
}
