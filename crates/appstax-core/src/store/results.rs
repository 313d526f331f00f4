// ── Published watch results ──
//
// Lock-free read side with push-based change notification via `watch`
// channels. Every publish replaces the snapshot that subscribers receive.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

use crate::object::Object;

/// An immutable, cheaply cloneable view of one watch's result list.
pub type Snapshot = Arc<Vec<Arc<Object>>>;

/// Name → latest snapshot, one `watch` channel per watch name.
#[derive(Default)]
pub(crate) struct ResultBoard {
    slots: DashMap<String, watch::Sender<Snapshot>>,
}

impl ResultBoard {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make sure a slot exists for `name` and reset it to an empty list.
    /// Existing subscribers stay attached and observe the reset.
    pub(crate) fn open(&self, name: &str) {
        match self.slots.get(name) {
            Some(slot) => {
                slot.send_modify(|snap| *snap = Arc::new(Vec::new()));
            }
            None => {
                let (tx, _) = watch::channel(Arc::new(Vec::new()));
                self.slots.insert(name.to_owned(), tx);
            }
        }
    }

    /// Replace the snapshot for `name`. Unknown names are ignored.
    pub(crate) fn publish(&self, name: &str, objects: Vec<Arc<Object>>) {
        if let Some(slot) = self.slots.get(name) {
            // `send_modify` updates unconditionally, even with zero receivers.
            slot.send_modify(|snap| *snap = Arc::new(objects));
        }
    }

    /// Drop the slot; subscribers see the channel close.
    pub(crate) fn close(&self, name: &str) -> bool {
        self.slots.remove(name).is_some()
    }

    pub(crate) fn snapshot(&self, name: &str) -> Option<Snapshot> {
        self.slots.get(name).map(|slot| slot.borrow().clone())
    }

    pub(crate) fn subscribe(&self, name: &str) -> Option<watch::Receiver<Snapshot>> {
        self.slots.get(name).map(|slot| slot.subscribe())
    }

    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.slots.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    pub(crate) fn clear(&self) {
        self.slots.clear();
    }
}
