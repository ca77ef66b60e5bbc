use anyhow::{anyhow, Result};
use reqwest::Client;
use std::time::Duration;

use super::DigestItem;

/// Posts accepted articles to an automation webhook (one JSON body per
/// article). Optional: disabled when DIGEST_WEBHOOK_URL is unset.
#[derive(Clone)]
pub struct WebhookSender {
    webhook_url: Option<String>,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl WebhookSender {
    pub fn from_env() -> Self {
        Self {
            webhook_url: std::env::var("DIGEST_WEBHOOK_URL").ok(),
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    /// Builder for tests/tools.
    pub fn new(url: String) -> Self {
        Self {
            webhook_url: Some(url),
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    pub async fn send_item(&self, item: &DigestItem) -> Result<()> {
        let Some(url) = &self.webhook_url else {
            tracing::debug!("webhook disabled (no DIGEST_WEBHOOK_URL)");
            return Ok(());
        };

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(url)
                .timeout(self.timeout)
                .json(item)
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    if let Err(e) = rsp.error_for_status_ref() {
                        if attempt < self.max_retries {
                            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1)))
                                .await;
                            continue;
                        }
                        return Err(anyhow!("webhook HTTP error: {e}"));
                    }
                    return Ok(());
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                        continue;
                    }
                    return Err(anyhow!("webhook request failed: {e}"));
                }
            }
        }
    }

    /// Send all items, logging per-item failures without aborting the batch.
    pub async fn send_items(&self, items: &[DigestItem]) -> usize {
        let mut delivered = 0usize;
        for item in items {
            match self.send_item(item).await {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!(error = %e, title = %item.title, "webhook delivery failed"),
            }
        }
        delivered
    }
}
