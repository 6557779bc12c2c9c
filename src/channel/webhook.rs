//! A channel that POSTs notifications to an HTTP webhook endpoint.

use crate::channel::{generate_name, Channel, ChannelError, Inbox};
use crate::notification::{DeliveryOutcome, Notification};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Channel name; generated as `webhook<8-hex>` when `None`.
    pub name: Option<String>,
    /// Endpoint the JSON-serialized notification is POSTed to.
    pub endpoint: String,
    /// Extra headers set on every request.
    pub headers: HashMap<String, String>,
    /// Skip TLS certificate verification.
    pub insecure: bool,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            name: None,
            endpoint: String::new(),
            headers: HashMap::new(),
            insecure: false,
            timeout_ms: 10_000,
        }
    }
}

impl WebhookConfig {
    fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// The webhook delivery backend. Success is HTTP 200 exactly; any other
/// status, network error, or timeout is a failed outcome.
pub struct WebhookChannel {
    name: String,
    config: WebhookConfig,
    inbox: Inbox,
    client: Mutex<Option<reqwest::Client>>,
}

impl WebhookChannel {
    pub fn new(config: WebhookConfig) -> Self {
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| generate_name("webhook"));
        Self {
            name,
            config,
            inbox: Inbox::new(),
            client: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Channel for WebhookChannel {
    fn kind(&self) -> &'static str {
        "webhook"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    async fn connect(&self) -> Result<(), ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(self.config.timeout())
            .danger_accept_invalid_certs(self.config.insecure)
            .build()
            .map_err(|e| ChannelError::Connect {
                reason: e.to_string(),
            })?;

        debug!(channel = %self.name, endpoint = %self.config.endpoint, "webhook client ready");
        *self.client.lock().unwrap() = Some(client);
        Ok(())
    }

    async fn close(&self) -> Result<(), ChannelError> {
        match self.client.lock().unwrap().take() {
            Some(_) => Ok(()),
            None => Err(ChannelError::NotConnected),
        }
    }

    async fn deliver(&self, message: &Notification) -> DeliveryOutcome {
        let client = match self.client.lock().unwrap().clone() {
            Some(client) => client,
            None => return DeliveryOutcome::failed("webhook client is not connected"),
        };

        let mut request = client.post(&self.config.endpoint).json(message);
        for (key, value) in &self.config.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        match request.send().await {
            Ok(response) if response.status() == StatusCode::OK => DeliveryOutcome::ok(),
            Ok(response) => DeliveryOutcome::failed(format!(
                "webhook returned non-OK status: {}",
                response.status().as_u16()
            )),
            Err(e) if e.is_timeout() => DeliveryOutcome::failed("webhook request timed out"),
            Err(e) => DeliveryOutcome::failed(e.to_string()),
        }
    }
}
