// ── Normalization store ──
//
// Identity map from object id to the single canonical copy. Every object
// that flows in with an id is merged into its canonical entry; nested
// relations are rewritten to references so that one update is seen by
// every holder. Only the model actor touches this, so no locking.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::object::{Object, ObjectId, ObjectRef, Value};

/// Result of routing an object through the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// The object had an id; its canonical copy lives in the store.
    Canonical(ObjectId),
    /// The object had no id and is held as-is by its owner.
    Detached(Object),
}

impl Normalized {
    pub fn id(&self) -> Option<&ObjectId> {
        match self {
            Self::Canonical(id) => Some(id),
            Self::Detached(object) => object.id(),
        }
    }
}

/// Identity map of canonical objects.
#[derive(Debug, Default)]
pub struct NormalizationStore {
    objects: HashMap<ObjectId, Object>,
}

impl NormalizationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `object` into the store.
    ///
    /// With `depth > 0`, nested related objects are normalized first at
    /// `depth - 1` and replaced by references. With `depth == 0` nested
    /// objects are not merged, but those the store already holds are still
    /// swapped for references so the canonical copy stays the only one.
    pub fn normalize(&mut self, mut object: Object, depth: u32) -> Normalized {
        for value in object.properties_mut().values_mut() {
            let taken = std::mem::replace(value, Value::null());
            *value = if depth > 0 {
                self.normalize_value(taken, depth - 1)
            } else {
                self.relink_value(taken)
            };
        }

        let Some(id) = object.id().cloned() else {
            return Normalized::Detached(object);
        };

        match self.objects.entry(id.clone()) {
            Entry::Occupied(mut canonical) => canonical.get_mut().import_values(&object),
            Entry::Vacant(slot) => {
                slot.insert(object);
            }
        }
        Normalized::Canonical(id)
    }

    fn normalize_value(&mut self, value: Value, depth: u32) -> Value {
        match value {
            Value::Object(nested) => self.link(*nested, depth),
            Value::List(items) => Value::List(
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::Object(nested) => self.link(*nested, depth),
                        other => other,
                    })
                    .collect(),
            ),
            other => other,
        }
    }

    /// Depth-0 pass: replace inline objects already in the store by
    /// references, leaving their contents unmerged.
    fn relink_value(&self, value: Value) -> Value {
        match value {
            Value::Object(nested) => self.relink(*nested),
            Value::List(items) => Value::List(
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::Object(nested) => self.relink(*nested),
                        other => other,
                    })
                    .collect(),
            ),
            other => other,
        }
    }

    fn relink(&self, object: Object) -> Value {
        match object.to_ref() {
            Some(r) if self.objects.contains_key(&r.id) => Value::Reference(r),
            _ => Value::Object(Box::new(object)),
        }
    }

    fn link(&mut self, object: Object, depth: u32) -> Value {
        let collection = object.collection().to_owned();
        match self.normalize(object, depth) {
            Normalized::Canonical(id) => Value::Reference(ObjectRef { collection, id }),
            Normalized::Detached(object) => Value::Object(Box::new(object)),
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn get(&self, id: &ObjectId) -> Option<&Object> {
        self.objects.get(id)
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.objects.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// The object an entry stands for, without resolving references.
    pub fn lookup<'a>(&'a self, entry: &'a Normalized) -> Option<&'a Object> {
        match entry {
            Normalized::Canonical(id) => self.objects.get(id),
            Normalized::Detached(object) => Some(object),
        }
    }

    /// Materialize an entry with references inlined up to `depth` levels.
    pub fn resolve(&self, entry: &Normalized, depth: u32) -> Option<Object> {
        self.lookup(entry).map(|object| self.resolve_object(object, depth))
    }

    /// Copy of `object` with references inlined up to `depth` levels.
    /// Dangling references, and those past the depth, stay references.
    pub fn resolve_object(&self, object: &Object, depth: u32) -> Object {
        let mut resolved = object.clone();
        for value in resolved.properties_mut().values_mut() {
            if let Some(replacement) = self.resolve_value(value, depth) {
                *value = replacement;
            }
        }
        resolved
    }

    /// `None` means the value is unchanged.
    fn resolve_value(&self, value: &Value, depth: u32) -> Option<Value> {
        match value {
            Value::Reference(r) if depth > 0 => self
                .objects
                .get(&r.id)
                .map(|target| Value::Object(Box::new(self.resolve_object(target, depth - 1)))),
            Value::Object(inline) if depth > 0 => Some(Value::Object(Box::new(
                self.resolve_object(inline, depth - 1),
            ))),
            Value::List(items) if depth > 0 => Some(Value::List(
                items
                    .iter()
                    .map(|item| {
                        self.resolve_value(item, depth)
                            .unwrap_or_else(|| item.clone())
                    })
                    .collect(),
            )),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn todo_with_owner(title: &str, owner_name: &str) -> Object {
        Object::with_id("todos", "a1").with("title", title).with(
            "owner",
            Object::with_id("users", "u1").with("name", owner_name),
        )
    }

    #[test]
    fn same_id_is_stored_once() {
        let mut store = NormalizationStore::new();

        let first = store.normalize(Object::with_id("todos", "a1").with("title", "one"), 0);
        let second = store.normalize(Object::with_id("todos", "a1").with("done", true), 0);

        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
        let canonical = store.get(&ObjectId::from("a1")).unwrap();
        assert_eq!(canonical.string("title"), Some("one"));
        assert_eq!(canonical.boolean("done"), Some(true));
    }

    #[test]
    fn id_less_objects_pass_through() {
        let mut store = NormalizationStore::new();
        let draft = Object::new("todos").with("title", "draft");

        let entry = store.normalize(draft.clone(), 3);

        assert_eq!(entry, Normalized::Detached(draft));
        assert!(store.is_empty());
    }

    #[test]
    fn depth_zero_does_not_recurse() {
        let mut store = NormalizationStore::new();

        store.normalize(todo_with_owner("x", "Ada"), 0);

        assert_eq!(store.len(), 1);
        assert!(!store.contains(&ObjectId::from("u1")));
        let todo = store.get(&ObjectId::from("a1")).unwrap();
        assert_eq!(todo.object("owner").unwrap().string("name"), Some("Ada"));
    }

    #[test]
    fn depth_zero_relinks_known_relations_without_merging() {
        let mut store = NormalizationStore::new();
        store.normalize(todo_with_owner("x", "Ada"), 1);

        // shallow payload still carries a stale inline copy of u1
        store.normalize(
            Object::with_id("todos", "a1").with(
                "owner",
                Object::with_id("users", "u1").with("name", "Stale"),
            ),
            0,
        );

        let todo = store.get(&ObjectId::from("a1")).unwrap();
        assert_eq!(todo.reference("owner"), Some(&ObjectRef::new("users", "u1")));
        let user = store.get(&ObjectId::from("u1")).unwrap();
        assert_eq!(user.string("name"), Some("Ada"));

        store.normalize(Object::with_id("users", "u1").with("name", "Grace"), 0);
        let resolved = store
            .resolve(&Normalized::Canonical(ObjectId::from("a1")), 1)
            .unwrap();
        assert_eq!(resolved.object("owner").unwrap().string("name"), Some("Grace"));
    }

    #[test]
    fn depth_zero_relinks_list_elements() {
        let mut store = NormalizationStore::new();
        store.normalize(Object::with_id("tags", "t1").with("label", "home"), 0);

        store.normalize(
            Object::with_id("todos", "a1").with(
                "tags",
                vec![Object::with_id("tags", "t1"), Object::with_id("tags", "t2")],
            ),
            0,
        );

        let todo = store.get(&ObjectId::from("a1")).unwrap();
        let tags = todo.get("tags").unwrap().as_list().unwrap();
        assert_eq!(tags[0].as_reference(), Some(&ObjectRef::new("tags", "t1")));
        assert!(tags[1].as_object().is_some());
        assert!(!store.contains(&ObjectId::from("t2")));
    }

    #[test]
    fn depth_one_normalizes_direct_relations_only() {
        let mut store = NormalizationStore::new();
        let deep = Object::with_id("todos", "a1").with(
            "owner",
            Object::with_id("users", "u1")
                .with("team", Object::with_id("teams", "g1").with("name", "core")),
        );

        store.normalize(deep, 1);

        let todo = store.get(&ObjectId::from("a1")).unwrap();
        assert_eq!(todo.reference("owner"), Some(&ObjectRef::new("users", "u1")));
        let user = store.get(&ObjectId::from("u1")).unwrap();
        assert!(user.object("team").is_some());
        assert!(!store.contains(&ObjectId::from("g1")));
    }

    #[test]
    fn shared_relation_update_is_seen_by_every_holder() {
        let mut store = NormalizationStore::new();
        let a = store.normalize(todo_with_owner("a", "Ada"), 1);
        let b = store.normalize(
            Object::with_id("todos", "b1").with(
                "owner",
                Object::with_id("users", "u1").with("name", "Ada"),
            ),
            1,
        );

        store.normalize(Object::with_id("users", "u1").with("name", "Grace"), 0);

        for entry in [&a, &b] {
            let resolved = store.resolve(entry, 1).unwrap();
            assert_eq!(resolved.object("owner").unwrap().string("name"), Some("Grace"));
        }
    }

    #[test]
    fn lists_of_objects_are_normalized() {
        let mut store = NormalizationStore::new();
        let object = Object::with_id("todos", "a1").with(
            "tags",
            vec![Object::with_id("tags", "t1"), Object::new("tags").with("draft", true)],
        );

        store.normalize(object, 1);

        let todo = store.get(&ObjectId::from("a1")).unwrap();
        let tags = todo.get("tags").unwrap().as_list().unwrap();
        assert_eq!(tags[0].as_reference(), Some(&ObjectRef::new("tags", "t1")));
        assert!(tags[1].as_object().is_some());
        assert!(store.contains(&ObjectId::from("t1")));
    }

    #[test]
    fn resolve_is_bounded_on_cycles() {
        let mut store = NormalizationStore::new();
        store.normalize(
            Object::with_id("todos", "a1").with("owner", ObjectRef::new("users", "u1")),
            0,
        );
        store.normalize(
            Object::with_id("users", "u1").with("favorite", ObjectRef::new("todos", "a1")),
            0,
        );

        let resolved = store
            .resolve(&Normalized::Canonical(ObjectId::from("a1")), 2)
            .unwrap();

        let owner = resolved.object("owner").unwrap();
        let favorite = owner.object("favorite").unwrap();
        assert_eq!(favorite.reference("owner"), Some(&ObjectRef::new("users", "u1")));
    }

    #[test]
    fn dangling_reference_stays_reference() {
        let mut store = NormalizationStore::new();
        store.normalize(
            Object::with_id("todos", "a1").with("owner", ObjectRef::new("users", "missing")),
            0,
        );

        let resolved = store
            .resolve(&Normalized::Canonical(ObjectId::from("a1")), 1)
            .unwrap();
        assert!(resolved.reference("owner").is_some());
    }
}
