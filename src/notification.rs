//! The notification data model shared by the engine and every channel.

use serde::{Deserialize, Serialize};

/// A single logical notification event.
///
/// The payload is opaque to the engine; channels only touch it when
/// serializing for their transport. An empty `targets` list means the
/// notification is broadcast to every registered channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique id per logical event. Backfilled by the engine with a UUIDv4
    /// if the caller leaves it empty.
    #[serde(default)]
    pub id: String,
    /// Opaque tag naming the event kind, passed through verbatim.
    pub event: String,
    /// Arbitrary payload.
    #[serde(default)]
    pub data: serde_json::Value,
    /// Channel names to deliver to; empty means broadcast.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,
}

impl Notification {
    /// Creates a broadcast notification with the given event tag and payload.
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
            ..Default::default()
        }
    }

    /// Restricts the notification to the named channels.
    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }
}

/// The result of one delivery attempt by one channel.
///
/// Created fresh per attempt and never mutated after return. `error` is
/// present iff `success` is false; [`ok`](DeliveryOutcome::ok) and
/// [`failed`](DeliveryOutcome::failed) are the only intended constructors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryOutcome {
    /// A successful delivery.
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// A failed delivery with a human-readable cause.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn notification_serializes_without_empty_targets() {
        let notification = Notification::new("order.created", json!({"total": 42}));
        let encoded = serde_json::to_value(&notification).unwrap();

        assert_eq!(encoded["event"], "order.created");
        assert_eq!(encoded["data"]["total"], 42);
        assert!(encoded.get("targets").is_none());
    }

    #[test]
    fn with_targets_sets_the_subset() {
        let notification =
            Notification::new("order.created", json!(null)).with_targets(["webhook-a", "mq"]);

        assert_eq!(notification.targets, vec!["webhook-a", "mq"]);
    }

    #[test]
    fn outcome_constructors() {
        assert!(DeliveryOutcome::ok().success);
        assert!(DeliveryOutcome::ok().error.is_none());

        let failed = DeliveryOutcome::failed("boom");
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }

    #[test]
    fn outcome_round_trips_through_json() {
        let outcome = DeliveryOutcome::ok();
        let value = serde_json::to_value(&outcome).unwrap();
        let decoded: DeliveryOutcome = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, outcome);
    }
}
