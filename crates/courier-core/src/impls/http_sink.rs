//! HttpReceiptSink - posts flushed receipts to the ingress route.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::domain::errors::VendorError;
use crate::domain::receipt::DeliveryReceipt;
use crate::ports::ReceiptSink;

/// Default timeout for one flush request in seconds.
pub const DEFAULT_FLUSH_TIMEOUT_SECS: u64 = 10;

pub struct HttpReceiptSink {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpReceiptSink {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Result<Self, VendorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_FLUSH_TIMEOUT_SECS))
            .build()
            .map_err(|e| VendorError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            api_key,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ReceiptSink for HttpReceiptSink {
    async fn deliver(&self, receipts: Vec<DeliveryReceipt>) -> Result<(), VendorError> {
        let mut request = self.client.post(&self.url).json(&receipts);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| VendorError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VendorError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
