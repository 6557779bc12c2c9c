//! A channel that sends notifications over an AMQP 1.0 link.
//!
//! Mirrors the 0.9 variant's layout: the protocol client lives behind
//! [`Amqp10Transport`], with `fe2o3-amqp` as the production implementation
//! (open connection, begin session, attach sender; detached in reverse order
//! on close).

use crate::channel::{generate_name, Channel, ChannelError, Inbox};
use crate::notification::{DeliveryOutcome, Notification};
use async_trait::async_trait;
use fe2o3_amqp::{Connection, Sender, Session};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Amqp10Config {
    /// Channel name; generated as `amqp10<8-hex>` when `None`.
    pub name: Option<String>,
    /// Broker address, e.g. `amqp://localhost:5672`.
    pub address: String,
    /// Container id announced on the connection; derived from the channel
    /// name when `None`.
    pub container_id: Option<String>,
    /// Target node (queue or topic address) the sender link attaches to.
    pub node: String,
    /// Bound on one send attempt, in milliseconds.
    pub delivery_timeout_ms: u64,
}

impl Default for Amqp10Config {
    fn default() -> Self {
        Self {
            name: None,
            address: String::new(),
            container_id: None,
            node: String::new(),
            delivery_timeout_ms: 5_000,
        }
    }
}

impl Amqp10Config {
    fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }
}

/// The slice of the AMQP 1.0 client the channel actually uses.
#[async_trait]
pub trait Amqp10Transport: Send + Sync {
    async fn attach(
        &self,
        container_id: &str,
        address: &str,
        node: &str,
    ) -> Result<(), ChannelError>;
    async fn send(&self, payload: String) -> Result<(), ChannelError>;
    async fn close(&self) -> Result<(), ChannelError>;
}

struct Fe2o3Link {
    connection: fe2o3_amqp::connection::ConnectionHandle<()>,
    session: fe2o3_amqp::session::SessionHandle<()>,
    sender: Sender,
}

/// Production transport backed by `fe2o3-amqp`.
#[derive(Default)]
pub struct Fe2o3Transport {
    link: tokio::sync::Mutex<Option<Fe2o3Link>>,
}

#[async_trait]
impl Amqp10Transport for Fe2o3Transport {
    async fn attach(
        &self,
        container_id: &str,
        address: &str,
        node: &str,
    ) -> Result<(), ChannelError> {
        let mut connection =
            Connection::open(container_id, address)
                .await
                .map_err(|e| ChannelError::Connect {
                    reason: format!("opening connection: {e}"),
                })?;
        let mut session = Session::begin(&mut connection)
            .await
            .map_err(|e| ChannelError::Connect {
                reason: format!("beginning session: {e}"),
            })?;
        let sender = Sender::attach(&mut session, format!("{container_id}-sender"), node)
            .await
            .map_err(|e| ChannelError::Connect {
                reason: format!("attaching sender: {e}"),
            })?;

        *self.link.lock().await = Some(Fe2o3Link {
            connection,
            session,
            sender,
        });
        Ok(())
    }

    async fn send(&self, payload: String) -> Result<(), ChannelError> {
        let mut guard = self.link.lock().await;
        let link = guard.as_mut().ok_or(ChannelError::NotConnected)?;

        let _outcome = link
            .sender
            .send(payload)
            .await
            .map_err(|e| ChannelError::Delivery(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<(), ChannelError> {
        match self.link.lock().await.take() {
            Some(mut link) => {
                link.sender
                    .close()
                    .await
                    .map_err(|e| ChannelError::Close(e.to_string()))?;
                link.session
                    .end()
                    .await
                    .map_err(|e| ChannelError::Close(e.to_string()))?;
                link.connection
                    .close()
                    .await
                    .map_err(|e| ChannelError::Close(e.to_string()))?;
                Ok(())
            }
            None => Err(ChannelError::NotConnected),
        }
    }
}

/// The AMQP 1.0 delivery backend.
pub struct Amqp10Channel {
    name: String,
    config: Amqp10Config,
    inbox: Inbox,
    transport: Arc<dyn Amqp10Transport>,
}

impl Amqp10Channel {
    pub fn new(config: Amqp10Config) -> Self {
        Self::with_transport(config, Arc::new(Fe2o3Transport::default()))
    }

    pub fn with_transport(config: Amqp10Config, transport: Arc<dyn Amqp10Transport>) -> Self {
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| generate_name("amqp10"));
        Self {
            name,
            config,
            inbox: Inbox::new(),
            transport,
        }
    }

    fn container_id(&self) -> String {
        self.config
            .container_id
            .clone()
            .unwrap_or_else(|| self.name.clone())
    }
}

#[async_trait]
impl Channel for Amqp10Channel {
    fn kind(&self) -> &'static str {
        "amqp10"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    async fn connect(&self) -> Result<(), ChannelError> {
        self.transport
            .attach(&self.container_id(), &self.config.address, &self.config.node)
            .await?;
        debug!(
            channel = %self.name,
            address = %self.config.address,
            node = %self.config.node,
            "AMQP 1.0 sender attached"
        );
        Ok(())
    }

    async fn close(&self) -> Result<(), ChannelError> {
        self.transport.close().await
    }

    async fn deliver(&self, message: &Notification) -> DeliveryOutcome {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(e) => return DeliveryOutcome::failed(e.to_string()),
        };

        match timeout(self.config.delivery_timeout(), self.transport.send(payload)).await {
            Err(_) => DeliveryOutcome::failed("message delivery timed out"),
            Ok(Err(e)) => DeliveryOutcome::failed(format!("sending message: {e}")),
            Ok(Ok(())) => DeliveryOutcome::ok(),
        }
    }
}
