//! Notifier - a notification fan-out engine
//!
//! This library delivers logical notification events to any number of
//! independently-configured delivery backends ("channels"). Each registered
//! channel owns its own connection and a dedicated worker task fed by a
//! bounded inbound queue; the engine fans a notification out concurrently to
//! the selected channels and returns once every live target has accepted it.

pub mod channel;
pub mod engine;
pub mod notification;

// Re-export the core surface for convenience
pub use channel::{Channel, ChannelError, Inbox};
pub use engine::{Engine, EngineConfig, EngineError, ErrorCallback};
pub use notification::{DeliveryOutcome, Notification};
