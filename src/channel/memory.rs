//! An in-memory channel used as the reference implementation and test double.
//!
//! Records every delivered notification in an ordered, queryable log. A
//! delivery succeeds only when the payload deserializes to a
//! [`DeliveryOutcome`]; any other payload yields a failed outcome, which
//! tests use to simulate delivery errors without a transport.

use crate::channel::{generate_name, Channel, ChannelError, Inbox};
use crate::notification::{DeliveryOutcome, Notification};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct MemoryConfig {
    /// Channel name; generated as `memory<8-hex>` when `None`.
    pub name: Option<String>,
    /// When set, `connect` fails with this reason.
    pub connect_error: Option<String>,
    /// Artificial time spent inside each delivery, for tests asserting that
    /// per-channel deliveries never overlap.
    pub delivery_delay: Option<Duration>,
}

/// The test/in-memory delivery backend.
pub struct MemoryChannel {
    name: String,
    config: MemoryConfig,
    inbox: Inbox,
    delivered: Mutex<Vec<Arc<Notification>>>,
    spans: Mutex<Vec<(Instant, Instant)>>,
}

impl MemoryChannel {
    pub fn new(config: MemoryConfig) -> Self {
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| generate_name("memory"));
        Self {
            name,
            config,
            inbox: Inbox::new(),
            delivered: Mutex::new(Vec::new()),
            spans: Mutex::new(Vec::new()),
        }
    }

    /// Everything delivered so far, in arrival order.
    pub fn delivered(&self) -> Vec<Arc<Notification>> {
        self.delivered.lock().unwrap().clone()
    }

    /// Whether a notification with the given id was delivered.
    pub fn contains(&self, id: &str) -> bool {
        self.delivered.lock().unwrap().iter().any(|n| n.id == id)
    }

    /// The first delivered notification, if any.
    pub fn first(&self) -> Option<Arc<Notification>> {
        self.delivered.lock().unwrap().first().cloned()
    }

    pub fn len(&self) -> usize {
        self.delivered.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.delivered.lock().unwrap().is_empty()
    }

    /// Entry/exit instants of each delivery, in completion order.
    pub fn delivery_spans(&self) -> Vec<(Instant, Instant)> {
        self.spans.lock().unwrap().clone()
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    async fn connect(&self) -> Result<(), ChannelError> {
        match &self.config.connect_error {
            Some(reason) => Err(ChannelError::Connect {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn close(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn deliver(&self, message: &Notification) -> DeliveryOutcome {
        let entered = Instant::now();
        if let Some(delay) = self.config.delivery_delay {
            tokio::time::sleep(delay).await;
        }

        // Record before judging the payload so failed deliveries are still
        // observable in the log.
        self.delivered
            .lock()
            .unwrap()
            .push(Arc::new(message.clone()));
        self.spans.lock().unwrap().push((entered, Instant::now()));

        match serde_json::from_value::<DeliveryOutcome>(message.data.clone()) {
            Ok(outcome) => outcome,
            Err(_) => DeliveryOutcome::failed(format!("unexpected payload: {}", message.data)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outcome_payload() -> serde_json::Value {
        serde_json::to_value(DeliveryOutcome::ok()).unwrap()
    }

    #[tokio::test]
    async fn deliver_records_and_succeeds_on_outcome_payload() {
        let channel = MemoryChannel::new(MemoryConfig::default());
        let mut message = Notification::new("test", outcome_payload());
        message.id = "n-1".into();

        let outcome = channel.deliver(&message).await;

        assert!(outcome.success);
        assert_eq!(channel.len(), 1);
        assert!(channel.contains("n-1"));
        assert_eq!(channel.first().unwrap().event, "test");
    }

    #[tokio::test]
    async fn deliver_fails_on_unexpected_payload_but_still_records() {
        let channel = MemoryChannel::new(MemoryConfig::default());
        let message = Notification::new("test", json!({"not": "an outcome"}));

        let outcome = channel.deliver(&message).await;

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("unexpected payload"));
        assert_eq!(channel.len(), 1);
    }

    #[tokio::test]
    async fn connect_error_is_configurable() {
        let channel = MemoryChannel::new(MemoryConfig {
            connect_error: Some("backend down".into()),
            ..Default::default()
        });

        let err = channel.connect().await.unwrap_err();
        assert_eq!(
            err,
            ChannelError::Connect {
                reason: "backend down".into()
            }
        );
    }

    #[test]
    fn name_defaults_to_generated_and_respects_caller() {
        let generated = MemoryChannel::new(MemoryConfig::default());
        assert!(generated.name().starts_with("memory"));

        let named = MemoryChannel::new(MemoryConfig {
            name: Some("audit".into()),
            ..Default::default()
        });
        assert_eq!(named.name(), "audit");
    }
}
