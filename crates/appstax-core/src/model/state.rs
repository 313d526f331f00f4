// ── Model state ──
//
// Everything the actor owns: the normalization store and the live
// watches. Methods are synchronous and side-effect free apart from the
// state itself; what the actor must do next (open channels, expand,
// publish) comes back as an `Outcome`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::channel::ChannelEvent;
use crate::object::Object;
use crate::store::NormalizationStore;
use crate::watch::{ChannelRequest, ChannelRole, LoadRequest, Observer, Reaction};

/// Identifies one incarnation of a named watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WatchKey {
    pub name: String,
    pub generation: u64,
}

/// Which published result lists are now stale.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) enum Changed {
    #[default]
    Nothing,
    Watch(String),
    /// A load merged into the shared store: every list is stale, but the
    /// change is attributed to the loaded watch.
    Loaded(String),
    All,
}

/// Follow-up work for the actor.
#[derive(Debug, Default)]
pub(crate) struct Outcome {
    pub changed: Changed,
    pub channels: Vec<ChannelRequest>,
    pub expand: Option<(Object, u32)>,
}

struct WatchSlot {
    generation: u64,
    observer: Box<dyn Observer>,
}

#[derive(Default)]
pub(crate) struct ModelState {
    store: NormalizationStore,
    watches: HashMap<String, WatchSlot>,
}

impl ModelState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn store(&self) -> &NormalizationStore {
        &self.store
    }

    /// Install a watch, replacing any watch of the same name. Returns the
    /// initial query and the channels to open.
    pub(crate) fn insert(
        &mut self,
        generation: u64,
        mut observer: Box<dyn Observer>,
    ) -> (LoadRequest, Vec<ChannelRequest>) {
        let load = observer.load_request();
        let channels = observer.connect();
        self.watches.insert(
            observer.name().to_owned(),
            WatchSlot {
                generation,
                observer,
            },
        );
        (load, channels)
    }

    /// Remove a watch. With a generation, only that incarnation is removed.
    pub(crate) fn remove(&mut self, name: &str, generation: Option<u64>) -> bool {
        let matches = self
            .watches
            .get(name)
            .is_some_and(|slot| generation.is_none_or(|g| g == slot.generation));
        if matches {
            self.watches.remove(name);
        }
        matches
    }

    pub(crate) fn watch_names(&self) -> Vec<String> {
        self.watches.keys().cloned().collect()
    }

    /// Materialized result list for `name`.
    pub(crate) fn results(&self, name: &str) -> Option<Vec<Arc<Object>>> {
        self.watches
            .get(name)
            .map(|slot| slot.observer.get(&self.store))
    }

    // ── Inputs ───────────────────────────────────────────────────────

    /// Initial load completed. `None` when the watch has been superseded.
    pub(crate) fn apply_loaded(&mut self, key: &WatchKey, objects: Vec<Object>) -> Option<Outcome> {
        let slot = current_slot(&mut self.watches, key)?;
        let channels = slot.observer.set(&mut self.store, objects);
        self.sort_all();
        Some(Outcome {
            changed: Changed::Loaded(key.name.clone()),
            channels,
            expand: None,
        })
    }

    pub(crate) fn apply_event(
        &mut self,
        key: &WatchKey,
        role: ChannelRole,
        event: ChannelEvent,
    ) -> Option<Outcome> {
        let slot = current_slot(&mut self.watches, key)?;
        let reaction = slot.observer.handle_event(&mut self.store, role, event);
        Some(self.finish(&key.name, reaction))
    }

    /// Expansion for a deep update completed.
    pub(crate) fn apply_expanded(
        &mut self,
        key: &WatchKey,
        object: Object,
        depth: u32,
    ) -> Option<Outcome> {
        let slot = current_slot(&mut self.watches, key)?;
        let channels = slot.observer.merge_update(&mut self.store, object, depth);
        Some(self.finish(&key.name, Reaction::StoreChanged(channels)))
    }

    /// Externally sourced update: merge and re-sort every watch.
    pub(crate) fn apply_update(&mut self, object: Object, depth: u32) -> Outcome {
        self.store.normalize(object, depth);
        self.sort_all();
        Outcome {
            changed: Changed::All,
            ..Outcome::default()
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn finish(&mut self, name: &str, reaction: Reaction) -> Outcome {
        match reaction {
            Reaction::Ignored => Outcome::default(),
            Reaction::ListChanged(channels) => {
                if let Some(slot) = self.watches.get_mut(name) {
                    slot.observer.sort(&self.store);
                }
                Outcome {
                    changed: Changed::Watch(name.to_owned()),
                    channels,
                    expand: None,
                }
            }
            Reaction::StoreChanged(channels) => {
                self.sort_all();
                Outcome {
                    changed: Changed::All,
                    channels,
                    expand: None,
                }
            }
            Reaction::Expand { object, depth } => Outcome {
                expand: Some((object, depth)),
                ..Outcome::default()
            },
        }
    }

    fn sort_all(&mut self) {
        for slot in self.watches.values_mut() {
            slot.observer.sort(&self.store);
        }
    }
}

fn current_slot<'a>(
    watches: &'a mut HashMap<String, WatchSlot>,
    key: &WatchKey,
) -> Option<&'a mut WatchSlot> {
    watches
        .get_mut(&key.name)
        .filter(|slot| slot.generation == key.generation)
}
