//! The delivery channel contract and its shared plumbing.
//!
//! A channel is a polymorphic delivery backend (webhook, AMQP 0.9, AMQP 1.0,
//! in-memory) with its own connection lifecycle and its own inbound queue.
//! The engine only ever talks to the [`Channel`] trait; each variant owns its
//! mutable state exclusively.

pub mod amqp09;
pub mod amqp10;
pub mod memory;
pub mod webhook;

use crate::notification::{DeliveryOutcome, Notification};
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, warn};

/// Errors raised by a channel outside of delivery attempts.
///
/// Delivery failures are data, not errors: they travel as a failed
/// [`DeliveryOutcome`] so one bad notification can never kill a worker.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ChannelError {
    #[error("connecting: {reason}")]
    Connect { reason: String },
    #[error("channel is not connected")]
    NotConnected,
    #[error("closing: {0}")]
    Close(String),
    #[error("{0}")]
    Delivery(String),
}

/// The inbound queue of a channel.
///
/// A bounded (capacity 1) hand-off between the dispatching task and the
/// channel's worker: a sender blocks until the worker is ready to take the
/// message, so dispatch completion means acceptance by every target worker,
/// not delivery completion. Closing the inbox is the sole termination signal
/// for the worker loop; messages accepted before the close are still drained.
#[derive(Debug, Clone)]
pub struct Inbox {
    tx: async_channel::Sender<Arc<Notification>>,
    rx: async_channel::Receiver<Arc<Notification>>,
}

impl Inbox {
    pub fn new() -> Self {
        let (tx, rx) = async_channel::bounded(1);
        Self { tx, rx }
    }

    /// Enqueues a notification for the worker, blocking on backpressure.
    ///
    /// Sending onto a closed inbox (dispatch after stop) is absorbed with a
    /// warning rather than propagated.
    pub async fn push(&self, message: Arc<Notification>) {
        if let Err(async_channel::SendError(message)) = self.tx.send(message).await {
            warn!(id = %message.id, "inbox is closed, dropping notification");
        }
    }

    /// Receives the next notification; errors once the inbox is closed and
    /// fully drained.
    pub async fn recv(&self) -> Result<Arc<Notification>, async_channel::RecvError> {
        self.rx.recv().await
    }

    /// Closes the inbox, terminating the worker loop after the remaining
    /// buffered messages are delivered. Returns `false` if already closed.
    pub fn close(&self) -> bool {
        self.tx.close()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered delivery backend.
///
/// Lifecycle: `Unconnected -> Connected (worker running) -> Closed`. The
/// engine calls [`connect`](Channel::connect) once, then runs
/// [`run`](Channel::run) as a dedicated task until the inbox is closed. A
/// closed channel must be discarded, not reused.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Variant tag, used as the prefix for generated names.
    fn kind(&self) -> &'static str;

    /// Stable identifier, set at construction; registry key and dispatch
    /// target literal.
    fn name(&self) -> &str;

    /// The inbound queue handle. The owner closes it to terminate the worker.
    fn inbox(&self) -> &Inbox;

    /// Establishes the long-lived backend resource. Failure prevents the
    /// worker from starting.
    async fn connect(&self) -> Result<(), ChannelError>;

    /// Releases the backend resource. Returns
    /// [`ChannelError::NotConnected`] when `connect` never succeeded.
    async fn close(&self) -> Result<(), ChannelError>;

    /// Performs exactly one delivery attempt and reports its outcome.
    /// Implementations apply their own timeout where the backend protocol
    /// supports one and report a distinguishable "timed out" failure.
    async fn deliver(&self, message: &Notification) -> DeliveryOutcome;

    /// Enqueues a notification for asynchronous delivery. Blocks only on the
    /// inbox's own backpressure.
    async fn notify(&self, message: Arc<Notification>) {
        self.inbox().push(message).await;
    }

    /// The worker loop: deliver one notification at a time, in arrival
    /// order, until the inbox is closed and drained. Failed outcomes are
    /// logged and never unwind across the loop.
    async fn run(&self) {
        while let Ok(message) = self.inbox().recv().await {
            let outcome = self.deliver(&message).await;
            if !outcome.success {
                error!(
                    channel = %self.name(),
                    id = %message.id,
                    error = %outcome.error.as_deref().unwrap_or("unknown"),
                    "delivery failed"
                );
            }
        }
    }
}

/// Builds a channel name of the form `<kind><8-hex-chars>` when the caller
/// supplies none.
pub(crate) fn generate_name(kind: &str) -> String {
    let suffix: u32 = rand::rng().random();
    format!("{kind}{suffix:08x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generated_names_carry_the_kind_prefix() {
        let name = generate_name("webhook");
        assert!(name.starts_with("webhook"));
        assert_eq!(name.len(), "webhook".len() + 8);
        assert!(name["webhook".len()..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_names_are_distinct() {
        assert_ne!(generate_name("amqp09"), generate_name("amqp09"));
    }

    #[tokio::test]
    async fn push_after_close_is_a_no_op() {
        let inbox = Inbox::new();
        assert!(inbox.close());
        assert!(inbox.is_closed());

        // Must neither panic nor deadlock.
        inbox
            .push(Arc::new(Notification::new("test", json!(null))))
            .await;
        assert!(inbox.recv().await.is_err());
    }

    #[tokio::test]
    async fn close_drains_buffered_messages() {
        let inbox = Inbox::new();
        inbox
            .push(Arc::new(Notification::new("test", json!(1))))
            .await;
        inbox.close();

        let message = inbox.recv().await.expect("buffered message survives close");
        assert_eq!(message.event, "test");
        assert!(inbox.recv().await.is_err());
    }
}
