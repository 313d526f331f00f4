// ── Model façade ──
//
// The application-facing handle. Writes go through the actor queue;
// reads come straight off the result board and never wait on the actor.

mod actor;
mod state;

use std::sync::Arc;

use appstax_api::{RealtimeHub, ReconnectConfig};
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use self::actor::{ModelActor, ModelCommand};
use crate::channel::{ChannelFactory, NoChannels, RealtimeChannels};
use crate::config::{ClientConfig, ModelConfig};
use crate::error::CoreError;
use crate::hub::{EventHub, ListenerId, ModelEvent, ModelEventKind};
use crate::object::Object;
use crate::source::{ObjectSource, RestObjectSource};
use crate::store::{ResultBoard, Snapshot};
use crate::stream::ResultStream;
use crate::watch::WatchOptions;

/// A set of named live views over remote collections sharing one
/// normalization store.
///
/// Cheaply cloneable via `Arc<ModelInner>`. Must be created inside a Tokio
/// runtime; the actor task is spawned immediately. Dropping the last
/// handle stops it.
#[derive(Clone)]
pub struct Model {
    inner: Arc<ModelInner>,
}

struct ModelInner {
    commands: mpsc::Sender<ModelCommand>,
    hub: Arc<EventHub>,
    board: Arc<ResultBoard>,
    cancel: CancellationToken,
    actor: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for ModelInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Model {
    /// Model over the given collaborators with default tuning.
    pub fn new(source: Arc<dyn ObjectSource>, channels: Arc<dyn ChannelFactory>) -> Self {
        Self::with_config(ModelConfig::default(), source, channels)
    }

    pub fn with_config(
        config: ModelConfig,
        source: Arc<dyn ObjectSource>,
        channels: Arc<dyn ChannelFactory>,
    ) -> Self {
        Self::spawn(config, source, channels, CancellationToken::new())
    }

    /// Model over the REST object API and the real-time WebSocket endpoint
    /// described by `config`.
    pub fn connect(config: &ClientConfig) -> Result<Self, CoreError> {
        let transport = config.transport();
        let source: Arc<dyn ObjectSource> = Arc::new(RestObjectSource::from_config(config)?);
        let cancel = CancellationToken::new();

        let channels: Arc<dyn ChannelFactory> = if config.realtime_enabled {
            let ws_url = config.realtime_endpoint()?;
            info!(url = %ws_url, "opening real-time connection");
            let reconnect = ReconnectConfig {
                max_retries: config.reconnect_max_retries,
                ..ReconnectConfig::default()
            };
            let hub = RealtimeHub::connect(
                ws_url,
                transport.auth_headers()?,
                reconnect,
                cancel.child_token(),
            );
            Arc::new(RealtimeChannels::new(hub))
        } else {
            debug!("real-time disabled");
            Arc::new(NoChannels)
        };

        Ok(Self::spawn(ModelConfig::default(), source, channels, cancel))
    }

    fn spawn(
        config: ModelConfig,
        source: Arc<dyn ObjectSource>,
        channels: Arc<dyn ChannelFactory>,
        cancel: CancellationToken,
    ) -> Self {
        let (commands, rx) = mpsc::channel(config.command_buffer.max(1));
        let hub = Arc::new(EventHub::new(config.event_buffer));
        let board = Arc::new(ResultBoard::new());

        let actor = ModelActor::new(
            source,
            channels,
            Arc::clone(&hub),
            Arc::clone(&board),
            commands.clone(),
            cancel.clone(),
        );
        let handle = tokio::spawn(actor.run(rx));

        Self {
            inner: Arc::new(ModelInner {
                commands,
                hub,
                board,
                cancel,
                actor: Mutex::new(Some(handle)),
            }),
        }
    }

    // ── Watches ──────────────────────────────────────────────────────

    /// Start (or replace) the watch `name`.
    ///
    /// Returns once the watch is registered; the initial load and channel
    /// subscriptions proceed in the background and announce themselves as
    /// change events.
    pub async fn watch(&self, name: &str, options: WatchOptions) -> Result<WatchHandle, CoreError> {
        let (reply, rx) = oneshot::channel();
        send(
            &self.inner.commands,
            ModelCommand::Watch {
                name: name.to_owned(),
                options,
                reply,
            },
        )
        .await?;
        let generation = rx.await.map_err(|_| CoreError::ModelClosed)?;

        Ok(WatchHandle {
            name: name.to_owned(),
            generation,
            commands: self.inner.commands.clone(),
            board: Arc::clone(&self.inner.board),
        })
    }

    /// Remove the watch `name`, closing its channels. Returns `false` if
    /// there was none.
    pub async fn unwatch(&self, name: &str) -> Result<bool, CoreError> {
        unwatch(&self.inner.commands, name, None).await
    }

    /// Latest result list of `name`.
    pub fn get(&self, name: &str) -> Option<Snapshot> {
        self.inner.board.snapshot(name)
    }

    /// Live subscription to the results of `name`.
    pub fn results(&self, name: &str) -> Option<ResultStream> {
        self.inner.board.subscribe(name).map(ResultStream::new)
    }

    /// Names of all current watches, sorted.
    pub fn watch_names(&self) -> Vec<String> {
        self.inner.board.names()
    }

    /// Merge an externally obtained object into the store and refresh
    /// every watch. Resolves after the change has been published.
    pub async fn update(&self, object: Object, depth: u32) -> Result<(), CoreError> {
        let (reply, rx) = oneshot::channel();
        send(
            &self.inner.commands,
            ModelCommand::Update {
                object,
                depth,
                reply,
            },
        )
        .await?;
        rx.await.map_err(|_| CoreError::ModelClosed)
    }

    // ── Events ───────────────────────────────────────────────────────

    /// Register a callback. It runs on the model's task, after results
    /// have been published, and must not block.
    pub fn on<F>(&self, kind: ModelEventKind, handler: F) -> ListenerId
    where
        F: Fn(&ModelEvent) + Send + Sync + 'static,
    {
        self.inner.hub.on(kind, handler)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.hub.off(id)
    }

    /// Async feed of every dispatched event.
    pub fn events(&self) -> broadcast::Receiver<ModelEvent> {
        self.inner.hub.subscribe()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Stop the actor and every watch, then wait for the actor to exit.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some(handle) = self.inner.actor.lock().await.take() {
            let _ = handle.await;
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }
}

// ── WatchHandle ──────────────────────────────────────────────────────

/// Handle to one watch incarnation.
///
/// Dropping it does not stop the watch; call [`dispose`](Self::dispose).
/// Disposing a handle whose watch has since been replaced is a no-op.
#[derive(Clone)]
pub struct WatchHandle {
    name: String,
    generation: u64,
    commands: mpsc::Sender<ModelCommand>,
    board: Arc<ResultBoard>,
}

impl WatchHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self) -> Option<Snapshot> {
        self.board.snapshot(&self.name)
    }

    pub fn results(&self) -> Option<ResultStream> {
        self.board.subscribe(&self.name).map(ResultStream::new)
    }

    /// Stop this watch and close its channels.
    pub async fn dispose(self) -> Result<bool, CoreError> {
        unwatch(&self.commands, &self.name, Some(self.generation)).await
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("name", &self.name)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

async fn send(commands: &mpsc::Sender<ModelCommand>, command: ModelCommand) -> Result<(), CoreError> {
    commands
        .send(command)
        .await
        .map_err(|_| CoreError::ModelClosed)
}

async fn unwatch(
    commands: &mpsc::Sender<ModelCommand>,
    name: &str,
    generation: Option<u64>,
) -> Result<bool, CoreError> {
    let (reply, rx) = oneshot::channel();
    send(
        commands,
        ModelCommand::Unwatch {
            name: name.to_owned(),
            generation,
            reply,
        },
    )
    .await?;
    rx.await.map_err(|_| CoreError::ModelClosed)
}
