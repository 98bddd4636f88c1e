// push/mod.rs - outbound client for the push relay

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::config;

/// Ticket error the relay reports for a token whose app was removed.
/// Such tokens are dead and get dropped from the device table.
pub const DEVICE_NOT_REGISTERED: &str = "DeviceNotRegistered";

#[derive(Debug, Error)]
pub enum PushError {
    #[error("push relay request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("push relay returned {0}")]
    BadResponse(String),
}

#[derive(Debug, Serialize)]
pub struct PushMessage {
    pub to: String,
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Per-message outcome, positionally aligned with the batch we sent.
#[derive(Debug, Deserialize)]
pub struct PushTicket {
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
}

impl PushTicket {
    pub fn delivered(&self) -> bool {
        self.status == "ok"
    }

    pub fn device_gone(&self) -> bool {
        self.error.as_deref() == Some(DEVICE_NOT_REGISTERED)
    }
}

#[derive(Debug, Deserialize)]
struct RelayResponse {
    data: Vec<PushTicket>,
}

#[derive(Clone)]
pub struct PushRelay {
    client: Client,
    base_url: String,
}

impl PushRelay {
    pub fn new(base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config::config().push.send_timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config() -> Self {
        Self::new(&config::config().push.relay_url)
    }

    /// POST one batch to the relay. Tickets come back in request order,
    /// one per message.
    pub async fn send_batch(&self, messages: &[PushMessage]) -> Result<Vec<PushTicket>, PushError> {
        let response = self
            .client
            .post(format!("{}/send", self.base_url))
            .json(messages)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PushError::BadResponse(status.to_string()));
        }
        let parsed: RelayResponse = response.json().await?;
        Ok(parsed.data)
    }
}
