// ── Watches ──
//
// A watch is one named live view over a collection. The model drives
// every watch through the `Observer` trait: it asks what to load and which
// channels to open, feeds results and channel events back in, and reads
// the materialized list out. Observers never do I/O themselves.

mod array;
mod order;

use std::sync::Arc;

use crate::channel::ChannelEvent;
use crate::object::Object;
use crate::source::FindOptions;
use crate::store::NormalizationStore;

pub(crate) use array::ArrayWatch;
pub use order::{DEFAULT_ORDER, OrderSpec};

// ── Options ──────────────────────────────────────────────────────────

/// How to set up a watch. Every field is optional:
///
/// | field        | default           |
/// |--------------|-------------------|
/// | `collection` | the watch name    |
/// | `filter`     | none (all objects)|
/// | `order`      | `-created`        |
/// | `expand`     | `0`               |
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchOptions {
    collection: Option<String>,
    filter: Option<String>,
    order: Option<String>,
    expand: Option<u32>,
}

impl WatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watch a collection other than the one named like the watch.
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Server-side filter expression, e.g. `done = false`.
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Order spec: a property name, `-` prefix for descending.
    pub fn order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    /// Relation depth to load and keep populated.
    pub fn expand(mut self, depth: u32) -> Self {
        self.expand = Some(depth);
        self
    }

    pub fn collection_for<'a>(&'a self, name: &'a str) -> &'a str {
        self.collection.as_deref().unwrap_or(name)
    }

    pub fn filter_expr(&self) -> &str {
        self.filter.as_deref().unwrap_or_default()
    }

    pub fn order_spec(&self) -> OrderSpec {
        self.order
            .as_deref()
            .map_or_else(OrderSpec::default, OrderSpec::parse)
    }

    pub fn expand_depth(&self) -> u32 {
        self.expand.unwrap_or(0)
    }
}

// ── Observer plumbing ────────────────────────────────────────────────

/// What a channel is for, from the owning watch's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChannelRole {
    /// The watched collection itself: created/updated/deleted.
    Primary,
    /// A collection reachable through relations: updated only.
    Relation,
}

/// A channel the model should open on the watch's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChannelRequest {
    pub name: String,
    pub filter: String,
    pub role: ChannelRole,
}

/// The initial query for a watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LoadRequest {
    pub collection: String,
    /// `None` loads the whole collection.
    pub filter: Option<String>,
    pub options: FindOptions,
}

/// How a watch reacted to a channel event.
#[derive(Debug)]
pub(crate) enum Reaction {
    /// Nothing to do.
    Ignored,
    /// This watch's list changed.
    ListChanged(Vec<ChannelRequest>),
    /// The shared store changed; every watch may be affected.
    StoreChanged(Vec<ChannelRequest>),
    /// The object must be re-fetched at `depth` before it can be merged.
    Expand { object: Object, depth: u32 },
}

/// Uniform interface the model uses for every kind of watch.
pub(crate) trait Observer: Send {
    fn name(&self) -> &str;

    fn load_request(&self) -> LoadRequest;

    /// Channels to open when the watch starts.
    fn connect(&mut self) -> Vec<ChannelRequest>;

    /// Replace the contents with a freshly loaded result set.
    fn set(&mut self, store: &mut NormalizationStore, objects: Vec<Object>) -> Vec<ChannelRequest>;

    fn handle_event(
        &mut self,
        store: &mut NormalizationStore,
        role: ChannelRole,
        event: ChannelEvent,
    ) -> Reaction;

    /// Merge an updated object (already expanded to `depth`) into the store.
    fn merge_update(
        &mut self,
        store: &mut NormalizationStore,
        object: Object,
        depth: u32,
    ) -> Vec<ChannelRequest>;

    fn sort(&mut self, store: &NormalizationStore);

    /// Materialized result list.
    fn get(&self, store: &NormalizationStore) -> Vec<Arc<Object>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_the_watch_name() {
        let options = WatchOptions::new();
        assert_eq!(options.collection_for("todos"), "todos");
        assert_eq!(options.filter_expr(), "");
        assert_eq!(options.order_spec(), OrderSpec::parse("-created"));
        assert_eq!(options.expand_depth(), 0);
    }

    #[test]
    fn builder_overrides() {
        let options = WatchOptions::new()
            .collection("tasks")
            .filter("done = false")
            .order("title")
            .expand(2);
        assert_eq!(options.collection_for("open"), "tasks");
        assert_eq!(options.filter_expr(), "done = false");
        assert_eq!(options.order_spec().property(), "title");
        assert_eq!(options.expand_depth(), 2);
    }
}
