//! The dispatch engine: channel registry, worker lifecycle, and fan-out.

use crate::channel::{Channel, ChannelError};
use crate::notification::Notification;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Errors surfaced through the engine's error callback.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A channel failed to connect during [`Engine::start`]; it stays
    /// registered but its worker never runs.
    #[error("starting channel {channel}: {source}")]
    Start {
        channel: String,
        source: ChannelError,
    },
    /// A targeted dispatch named a channel that is not registered.
    #[error("{id}: channel {target} not found")]
    UnknownTarget { id: String, target: String },
}

/// Invoked synchronously for every reported error, possibly from several
/// worker tasks at once.
pub type ErrorCallback = Arc<dyn Fn(EngineError) + Send + Sync>;

/// Engine configuration.
///
/// Without an error callback the engine delivers best-effort and silently:
/// connect and routing failures are dropped. That is a configuration choice,
/// not a bug; callers who want to observe failures supply `on_error`.
#[derive(Clone, Default)]
pub struct EngineConfig {
    pub on_error: Option<ErrorCallback>,
}

/// Orchestrates registered channels: starts and stops their workers and fans
/// notifications out to the selected subset.
///
/// The registry is mutated only by [`register_channel`](Engine::register_channel),
/// which is expected to happen before [`start`](Engine::start); afterwards it
/// is read-only and safe for concurrent dispatch.
pub struct Engine {
    on_error: Option<ErrorCallback>,
    channels: HashMap<String, Arc<dyn Channel>>,
    workers: Mutex<Vec<(String, JoinHandle<()>)>>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            on_error: config.on_error,
            channels: HashMap::new(),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Adds a channel to the registry keyed by its name and returns that
    /// name for later use as a dispatch target.
    ///
    /// Duplicate names overwrite the previous registration (last writer
    /// wins); this is logged but raises no error.
    pub fn register_channel(&mut self, channel: Arc<dyn Channel>) -> String {
        let name = channel.name().to_string();
        if self.channels.insert(name.clone(), channel).is_some() {
            warn!(channel = %name, "channel name collision, previous registration replaced");
        }
        name
    }

    /// Connects every registered channel and starts one worker task per
    /// channel that connected successfully. A channel whose `connect` fails
    /// is reported via the error callback and left registered but inert.
    pub async fn start(&self) {
        for channel in self.channels.values() {
            if let Err(source) = channel.connect().await {
                self.handle_error(EngineError::Start {
                    channel: channel.name().to_string(),
                    source,
                });
                continue;
            }

            let name = channel.name().to_string();
            debug!(channel = %name, kind = channel.kind(), "starting worker");
            let worker = Arc::clone(channel);
            let handle = tokio::spawn(async move { worker.run().await });
            self.workers.lock().unwrap().push((name, handle));
        }
    }

    /// Closes every channel's inbox, then waits for all workers to drain and
    /// exit. Notifications accepted before the close are still delivered.
    pub async fn stop(&self) {
        for channel in self.channels.values() {
            channel.inbox().close();
        }

        let workers: Vec<_> = self.workers.lock().unwrap().drain(..).collect();
        info!("stopping engine, waiting for {} workers", workers.len());

        for (name, handle) in workers {
            match handle.await {
                Ok(()) => debug!(channel = %name, "worker exited"),
                Err(e) => error!(channel = %name, error = %e, "worker panicked during shutdown"),
            }
        }
    }

    /// Fans a notification out to the selected channels.
    ///
    /// Backfills `id` once, before fan-out, if the caller left it empty.
    /// Empty `targets` broadcasts to every registered channel; otherwise only
    /// the named subset is selected, and each unknown name is reported via
    /// the error callback without affecting the remaining targets.
    ///
    /// Returns once every selected channel has accepted the notification
    /// into its inbound queue, not once deliveries have completed.
    pub async fn dispatch(&self, message: Notification) {
        let mut message = message;
        if message.id.is_empty() {
            message.id = Uuid::new_v4().to_string();
        }

        let targets = message.targets.clone();
        let message = Arc::new(message);

        let selected: Vec<&Arc<dyn Channel>> = if targets.is_empty() {
            self.channels.values().collect()
        } else {
            let mut selected = Vec::with_capacity(targets.len());
            for target in &targets {
                match self.channels.get(target) {
                    Some(channel) => selected.push(channel),
                    None => self.handle_error(EngineError::UnknownTarget {
                        id: message.id.clone(),
                        target: target.clone(),
                    }),
                }
            }
            selected
        };

        join_all(selected.into_iter().map(|channel| {
            debug!(channel = %channel.name(), id = %message.id, "dispatching");
            channel.notify(Arc::clone(&message))
        }))
        .await;
    }

    /// Routes an error to the configured callback, or drops it when none was
    /// supplied.
    pub fn handle_error(&self, err: EngineError) {
        match &self.on_error {
            Some(on_error) => on_error(err),
            None => debug!(error = %err, "no error callback configured, dropping error"),
        }
    }
}
