// ── Array watch ──
//
// Ordered list of objects from one collection, kept current from the
// collection's channel plus one channel per related collection.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use super::{ChannelRequest, ChannelRole, LoadRequest, Observer, OrderSpec, Reaction, WatchOptions};
use crate::channel::{ChannelEvent, ChannelEventKind, objects_channel};
use crate::object::{Object, ObjectId, Related};
use crate::source::FindOptions;
use crate::store::{NormalizationStore, Normalized};

pub(crate) struct ArrayWatch {
    name: String,
    collection: String,
    filter: String,
    order: OrderSpec,
    expand: u32,
    entries: Vec<Normalized>,
    /// Related collections whose channel is already open.
    relations: HashSet<String>,
    /// Expand depth each object was last merged at.
    expanded: HashMap<ObjectId, u32>,
}

impl ArrayWatch {
    pub(crate) fn new(name: &str, options: &WatchOptions) -> Self {
        Self {
            name: name.to_owned(),
            collection: options.collection_for(name).to_owned(),
            filter: options.filter_expr().to_owned(),
            order: options.order_spec(),
            expand: options.expand_depth(),
            entries: Vec::new(),
            relations: HashSet::new(),
            expanded: HashMap::new(),
        }
    }

    fn contains(&self, id: &ObjectId) -> bool {
        self.entries.iter().any(|entry| entry.id() == Some(id))
    }

    fn add(&mut self, store: &mut NormalizationStore, object: Object) -> Reaction {
        let known = object.id().is_some_and(|id| store.contains(id));
        let entry = store.normalize(object, 0);
        let listed = entry.id().is_some_and(|id| self.contains(id));
        if !listed {
            self.entries.push(entry);
        }
        if known {
            Reaction::StoreChanged(Vec::new())
        } else {
            Reaction::ListChanged(Vec::new())
        }
    }

    fn update(&mut self, store: &mut NormalizationStore, object: Object) -> Reaction {
        let depth = object
            .id()
            .and_then(|id| self.expanded.get(id))
            .copied()
            .unwrap_or(0);
        if depth > 0 {
            Reaction::Expand { object, depth }
        } else {
            Reaction::StoreChanged(self.merge_update(store, object, 0))
        }
    }

    fn remove(&mut self, object: &Object) -> Reaction {
        let Some(id) = object.id() else {
            debug!(watch = %self.name, "ignoring delete without id");
            return Reaction::Ignored;
        };
        self.entries.retain(|entry| entry.id() != Some(id));
        Reaction::ListChanged(Vec::new())
    }

    /// Record the depth `object` was merged at and, while depth remains,
    /// open a channel for every related collection.
    fn register_relations(
        &mut self,
        store: &NormalizationStore,
        object: &Object,
        depth: u32,
        out: &mut Vec<ChannelRequest>,
    ) {
        if let Some(id) = object.id() {
            self.expanded.insert(id.clone(), depth);
        }
        if depth == 0 {
            return;
        }
        for related in object.related_objects() {
            self.connect_relation(related.collection(), out);
            let target = match related {
                Related::Inline(inline) => Some(inline),
                Related::Reference(r) => store.get(&r.id),
            };
            if let Some(target) = target {
                self.register_relations(store, target, depth - 1, out);
            }
        }
    }

    fn connect_relation(&mut self, collection: &str, out: &mut Vec<ChannelRequest>) {
        if collection.is_empty() || !self.relations.insert(collection.to_owned()) {
            return;
        }
        debug!(watch = %self.name, %collection, "tracking related collection");
        out.push(ChannelRequest {
            name: objects_channel(collection),
            filter: String::new(),
            role: ChannelRole::Relation,
        });
    }
}

impl Observer for ArrayWatch {
    fn name(&self) -> &str {
        &self.name
    }

    fn load_request(&self) -> LoadRequest {
        LoadRequest {
            collection: self.collection.clone(),
            filter: (!self.filter.is_empty()).then(|| self.filter.clone()),
            options: FindOptions::expand(self.expand),
        }
    }

    fn connect(&mut self) -> Vec<ChannelRequest> {
        vec![ChannelRequest {
            name: objects_channel(&self.collection),
            filter: self.filter.clone(),
            role: ChannelRole::Primary,
        }]
    }

    fn set(&mut self, store: &mut NormalizationStore, objects: Vec<Object>) -> Vec<ChannelRequest> {
        let mut channels = Vec::new();
        let mut entries = Vec::with_capacity(objects.len());
        for object in objects {
            self.register_relations(store, &object, self.expand, &mut channels);
            entries.push(store.normalize(object, self.expand));
        }
        self.entries = entries;
        channels
    }

    fn handle_event(
        &mut self,
        store: &mut NormalizationStore,
        role: ChannelRole,
        event: ChannelEvent,
    ) -> Reaction {
        let Some(object) = event.object else {
            return Reaction::Ignored;
        };
        match (role, event.kind) {
            (ChannelRole::Primary, ChannelEventKind::Created) => self.add(store, object),
            (_, ChannelEventKind::Updated) => self.update(store, object),
            (ChannelRole::Primary, ChannelEventKind::Deleted) => self.remove(&object),
            (ChannelRole::Relation, _) => Reaction::Ignored,
        }
    }

    fn merge_update(
        &mut self,
        store: &mut NormalizationStore,
        object: Object,
        depth: u32,
    ) -> Vec<ChannelRequest> {
        let mut channels = Vec::new();
        self.register_relations(store, &object, depth, &mut channels);
        store.normalize(object, depth);
        channels
    }

    fn sort(&mut self, store: &NormalizationStore) {
        let mut keyed: Vec<(String, Normalized)> = self
            .entries
            .drain(..)
            .map(|entry| {
                let key = store
                    .lookup(&entry)
                    .map(|object| self.order.key(object))
                    .unwrap_or_default();
                (key, entry)
            })
            .collect();
        keyed.sort_by(|a, b| self.order.compare_keys(&a.0, &b.0));
        self.entries = keyed.into_iter().map(|(_, entry)| entry).collect();
    }

    fn get(&self, store: &NormalizationStore) -> Vec<Arc<Object>> {
        self.entries
            .iter()
            .filter_map(|entry| store.resolve(entry, self.expand))
            .map(Arc::new)
            .collect()
    }
}
