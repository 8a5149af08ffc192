use async_trait::async_trait;
use reqwest::Client;

use crate::{Result, WebhookError};

/// Posting seam for outbound notifications.
///
/// Failures are reported, never retried; the caller decides what to log and
/// whether siblings continue.
#[async_trait]
pub trait WebhookPost: Send + Sync {
    /// POST a rendered JSON body to the endpoint.
    async fn post(&self, url: &str, body: String) -> Result<()>;
}

/// reqwest-backed sender.
pub struct HttpWebhookPost {
    client: Client,
}

impl HttpWebhookPost {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WebhookPost for HttpWebhookPost {
    async fn post(&self, url: &str, body: String) -> Result<()> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WebhookError::Rejected {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
