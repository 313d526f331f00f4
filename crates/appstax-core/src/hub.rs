// ── Model event hub ──
//
// Listener registry for model events. Callbacks are invoked synchronously
// on the actor task; async consumers use the broadcast side instead.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::broadcast;

/// Kind of model event a listener subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ModelEventKind {
    /// Some watch's result list changed.
    Change,
}

/// A dispatched model event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelEvent {
    pub kind: ModelEventKind,
    /// The watch whose results changed, or `None` when the change may
    /// touch every watch (shared store update).
    pub watch: Option<String>,
}

impl ModelEvent {
    pub fn change(watch: Option<String>) -> Self {
        Self {
            kind: ModelEventKind::Change,
            watch,
        }
    }
}

/// Handle returned by [`EventHub::on`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Handler = Arc<dyn Fn(&ModelEvent) + Send + Sync>;

struct Listener {
    kind: ModelEventKind,
    handler: Handler,
}

pub struct EventHub {
    listeners: DashMap<ListenerId, Listener>,
    next_id: AtomicU64,
    broadcast: broadcast::Sender<ModelEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (broadcast, _) = broadcast::channel(capacity.max(1));
        Self {
            listeners: DashMap::new(),
            next_id: AtomicU64::new(1),
            broadcast,
        }
    }

    /// Register `handler` for events of `kind`.
    pub fn on<F>(&self, kind: ModelEventKind, handler: F) -> ListenerId
    where
        F: Fn(&ModelEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.insert(
            id,
            Listener {
                kind,
                handler: Arc::new(handler),
            },
        );
        id
    }

    /// Unregister a listener. Returns `false` if it was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ModelEvent> {
        self.broadcast.subscribe()
    }

    /// Invoke every listener registered for the event's kind, once each,
    /// in registration order.
    pub fn dispatch(&self, event: &ModelEvent) {
        // Snapshot first: handlers may call `on`/`off` re-entrantly.
        let mut matching: Vec<(ListenerId, Handler)> = self
            .listeners
            .iter()
            .filter(|entry| entry.kind == event.kind)
            .map(|entry| (*entry.key(), Arc::clone(&entry.handler)))
            .collect();
        matching.sort_by_key(|(id, _)| *id);

        for (_, handler) in matching {
            handler(event);
        }

        // No receivers is not an error.
        let _ = self.broadcast.send(event.clone());
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(64)
    }
}
