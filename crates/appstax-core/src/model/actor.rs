// ── Model actor ──
//
// The single task that owns `ModelState`. Commands from `Model` handles
// and results from spawned load/expand/channel tasks arrive on one queue
// and are applied strictly in order. Spawned tasks tag their results with
// the watch key so that results for a replaced watch are dropped.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::state::{Changed, ModelState, Outcome, WatchKey};
use crate::channel::{Channel, ChannelEvent, ChannelFactory};
use crate::error::CoreError;
use crate::hub::{EventHub, ModelEvent};
use crate::object::Object;
use crate::source::ObjectSource;
use crate::store::ResultBoard;
use crate::watch::{ArrayWatch, ChannelRequest, ChannelRole, LoadRequest, WatchOptions};

/// Everything the actor reacts to.
pub(crate) enum ModelCommand {
    // ── From Model handles ──
    Watch {
        name: String,
        options: WatchOptions,
        reply: oneshot::Sender<u64>,
    },
    Unwatch {
        name: String,
        generation: Option<u64>,
        reply: oneshot::Sender<bool>,
    },
    Update {
        object: Object,
        depth: u32,
        reply: oneshot::Sender<()>,
    },

    // ── From spawned tasks ──
    Loaded {
        key: WatchKey,
        result: Result<Vec<Object>, CoreError>,
    },
    Event {
        key: WatchKey,
        role: ChannelRole,
        event: ChannelEvent,
    },
    Expanded {
        key: WatchKey,
        depth: u32,
        result: Result<Object, CoreError>,
    },
}

pub(crate) struct ModelActor {
    state: ModelState,
    source: Arc<dyn ObjectSource>,
    channels: Arc<dyn ChannelFactory>,
    hub: Arc<EventHub>,
    board: Arc<ResultBoard>,
    commands: mpsc::Sender<ModelCommand>,
    cancel: CancellationToken,
    /// Per-watch token; cancelling it stops that watch's tasks.
    tokens: HashMap<String, CancellationToken>,
    next_generation: u64,
}

impl ModelActor {
    pub(crate) fn new(
        source: Arc<dyn ObjectSource>,
        channels: Arc<dyn ChannelFactory>,
        hub: Arc<EventHub>,
        board: Arc<ResultBoard>,
        commands: mpsc::Sender<ModelCommand>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            state: ModelState::new(),
            source,
            channels,
            hub,
            board,
            commands,
            cancel,
            tokens: HashMap::new(),
            next_generation: 0,
        }
    }

    pub(crate) async fn run(mut self, mut rx: mpsc::Receiver<ModelCommand>) {
        debug!("model actor started");
        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                command = rx.recv() => {
                    let Some(command) = command else { break };
                    self.handle(command);
                }
            }
        }

        for token in self.tokens.values() {
            token.cancel();
        }
        self.board.clear();
        debug!(objects = self.state.store().len(), "model actor stopped");
    }

    fn handle(&mut self, command: ModelCommand) {
        match command {
            ModelCommand::Watch {
                name,
                options,
                reply,
            } => {
                let generation = self.start_watch(name, &options);
                let _ = reply.send(generation);
            }
            ModelCommand::Unwatch {
                name,
                generation,
                reply,
            } => {
                let removed = self.stop_watch(&name, generation);
                let _ = reply.send(removed);
            }
            ModelCommand::Update {
                object,
                depth,
                reply,
            } => {
                let outcome = self.state.apply_update(object, depth);
                self.finish(None, outcome);
                let _ = reply.send(());
            }
            ModelCommand::Loaded { key, result } => match result {
                Ok(objects) => {
                    debug!(watch = %key.name, count = objects.len(), "initial load complete");
                    let outcome = self.state.apply_loaded(&key, objects);
                    self.finish_for(&key, outcome);
                }
                Err(e) => warn!(watch = %key.name, error = %e, "initial load failed"),
            },
            ModelCommand::Event { key, role, event } => {
                let outcome = self.state.apply_event(&key, role, event);
                self.finish_for(&key, outcome);
            }
            ModelCommand::Expanded { key, depth, result } => match result {
                Ok(object) => {
                    let outcome = self.state.apply_expanded(&key, object, depth);
                    self.finish_for(&key, outcome);
                }
                Err(e) => warn!(watch = %key.name, depth, error = %e, "expansion failed, update skipped"),
            },
        }
    }

    // ── Watch lifecycle ──────────────────────────────────────────────

    fn start_watch(&mut self, name: String, options: &WatchOptions) -> u64 {
        self.next_generation += 1;
        let key = WatchKey {
            name,
            generation: self.next_generation,
        };

        let token = self.cancel.child_token();
        if let Some(previous) = self.tokens.insert(key.name.clone(), token) {
            debug!(watch = %key.name, "replacing watch");
            previous.cancel();
        }

        let observer = Box::new(ArrayWatch::new(&key.name, options));
        let (load, channels) = self.state.insert(key.generation, observer);
        self.board.open(&key.name);
        info!(watch = %key.name, collection = %load.collection, "watch started");

        self.spawn_load(&key, load);
        self.open_channels(&key, channels);
        key.generation
    }

    fn stop_watch(&mut self, name: &str, generation: Option<u64>) -> bool {
        if !self.state.remove(name, generation) {
            return false;
        }
        if let Some(token) = self.tokens.remove(name) {
            token.cancel();
        }
        self.board.close(name);
        info!(watch = %name, "watch removed");
        true
    }

    // ── Effects ──────────────────────────────────────────────────────

    fn finish_for(&mut self, key: &WatchKey, outcome: Option<Outcome>) {
        match outcome {
            Some(outcome) => self.finish(Some(key), outcome),
            None => debug!(watch = %key.name, generation = key.generation, "dropping stale result"),
        }
    }

    fn finish(&mut self, key: Option<&WatchKey>, outcome: Outcome) {
        if let Some(key) = key {
            self.open_channels(key, outcome.channels);
            if let Some((object, depth)) = outcome.expand {
                self.spawn_expand(key, object, depth);
            }
        }

        match outcome.changed {
            Changed::Nothing => {}
            Changed::Watch(name) => {
                self.publish(&name);
                self.hub.dispatch(&ModelEvent::change(Some(name)));
            }
            Changed::Loaded(name) => {
                for other in self.state.watch_names() {
                    self.publish(&other);
                }
                self.hub.dispatch(&ModelEvent::change(Some(name)));
            }
            Changed::All => {
                for name in self.state.watch_names() {
                    self.publish(&name);
                }
                self.hub.dispatch(&ModelEvent::change(None));
            }
        }
    }

    fn publish(&self, name: &str) {
        if let Some(results) = self.state.results(name) {
            self.board.publish(name, results);
        }
    }

    fn spawn_load(&self, key: &WatchKey, request: LoadRequest) {
        let Some(cancel) = self.tokens.get(&key.name).cloned() else {
            return;
        };
        let fetch = match &request.filter {
            Some(query) => self
                .source
                .find(&request.collection, query, request.options),
            None => self.source.find_all(&request.collection, request.options),
        };
        let commands = self.commands.clone();
        let key = key.clone();

        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                result = fetch => result,
            };
            let _ = commands.send(ModelCommand::Loaded { key, result }).await;
        });
    }

    fn spawn_expand(&self, key: &WatchKey, object: Object, depth: u32) {
        let Some(cancel) = self.tokens.get(&key.name).cloned() else {
            return;
        };
        debug!(watch = %key.name, id = ?object.id(), depth, "expanding before merge");
        let fetch = self.source.expand(object, depth);
        let commands = self.commands.clone();
        let key = key.clone();

        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                result = fetch => result,
            };
            let _ = commands
                .send(ModelCommand::Expanded { key, depth, result })
                .await;
        });
    }

    fn open_channels(&self, key: &WatchKey, requests: Vec<ChannelRequest>) {
        if requests.is_empty() {
            return;
        }
        let Some(cancel) = self.tokens.get(&key.name) else {
            return;
        };
        for request in requests {
            match self.channels.open(&request.name, &request.filter) {
                Ok(channel) => {
                    debug!(watch = %key.name, channel = %request.name, role = ?request.role, "channel open");
                    tokio::spawn(forward(
                        channel,
                        key.clone(),
                        request.role,
                        self.commands.clone(),
                        cancel.clone(),
                    ));
                }
                Err(e) => {
                    warn!(watch = %key.name, channel = %request.name, error = %e, "cannot open channel");
                }
            }
        }
    }
}

/// Pump one channel into the actor queue until the watch is cancelled or
/// the channel ends. Dropping the channel on exit unsubscribes it.
async fn forward(
    mut channel: Channel,
    key: WatchKey,
    role: ChannelRole,
    commands: mpsc::Sender<ModelCommand>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = channel.next_event() => event,
        };
        let Some(event) = event else {
            debug!(channel = channel.name(), "channel ended");
            break;
        };
        let command = ModelCommand::Event {
            key: key.clone(),
            role,
            event,
        };
        if commands.send(command).await.is_err() {
            break;
        }
    }
}
