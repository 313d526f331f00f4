// ── Object ──
//
// A schema-less record. Identity and collection live beside the property
// map rather than inside it so that normalization never has to parse
// system properties back out.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use super::{ObjectId, ObjectRef, SYS_CREATED, SYS_UPDATED, Value};

/// A data record from (or destined for) an Appstax collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Object {
    id: Option<ObjectId>,
    collection: String,
    properties: IndexMap<String, Value>,
}

/// A related object reachable from one of an object's properties.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Related<'a> {
    /// Materialized in place.
    Inline(&'a Object),
    /// Normalized away into the store.
    Reference(&'a ObjectRef),
}

impl Related<'_> {
    pub fn collection(&self) -> &str {
        match self {
            Self::Inline(o) => o.collection(),
            Self::Reference(r) => &r.collection,
        }
    }

    pub fn id(&self) -> Option<&ObjectId> {
        match self {
            Self::Inline(o) => o.id(),
            Self::Reference(r) => Some(&r.id),
        }
    }
}

impl Object {
    /// New, unsaved object in `collection`.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            id: None,
            collection: collection.into(),
            properties: IndexMap::new(),
        }
    }

    pub fn with_id(collection: impl Into<String>, id: impl Into<ObjectId>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::new(collection)
        }
    }

    /// Builder-style property setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    // ── Identity ─────────────────────────────────────────────────────

    pub fn id(&self) -> Option<&ObjectId> {
        self.id.as_ref()
    }

    pub fn set_id(&mut self, id: impl Into<ObjectId>) {
        self.id = Some(id.into());
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn set_collection(&mut self, collection: impl Into<String>) {
        self.collection = collection.into();
    }

    /// Reference to this object, if it has an identity.
    pub fn to_ref(&self) -> Option<ObjectRef> {
        self.id.as_ref().map(|id| ObjectRef {
            collection: self.collection.clone(),
            id: id.clone(),
        })
    }

    // ── Properties ───────────────────────────────────────────────────

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.properties.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.properties.shift_remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// Names of every property currently present, in insertion order.
    pub fn all_properties(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn properties(&self) -> &IndexMap<String, Value> {
        &self.properties
    }

    pub(crate) fn properties_mut(&mut self) -> &mut IndexMap<String, Value> {
        &mut self.properties
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    // ── Typed accessors ──────────────────────────────────────────────

    pub fn string(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn boolean(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Text form of a property for ordering. Absent or non-scalar
    /// properties have none.
    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key).and_then(Value::to_text)
    }

    /// Single inline related object.
    pub fn object(&self, key: &str) -> Option<&Object> {
        self.get(key).and_then(Value::as_object)
    }

    /// Inline related objects, when every element of the list is one.
    pub fn objects(&self, key: &str) -> Option<Vec<&Object>> {
        self.get(key)?
            .as_list()?
            .iter()
            .map(Value::as_object)
            .collect()
    }

    pub fn reference(&self, key: &str) -> Option<&ObjectRef> {
        self.get(key).and_then(Value::as_reference)
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.timestamp(SYS_CREATED)
    }

    pub fn updated(&self) -> Option<DateTime<Utc>> {
        self.timestamp(SYS_UPDATED)
    }

    fn timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        let raw = self.string(key)?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    // ── Merge & relations ────────────────────────────────────────────

    /// Overwrite-by-presence merge: every property present on `other`
    /// replaces the value here. Properties absent from `other` are kept.
    pub fn import_values(&mut self, other: &Object) {
        for (key, value) in &other.properties {
            self.properties.insert(key.clone(), value.clone());
        }
        if self.collection.is_empty() && !other.collection.is_empty() {
            self.collection.clone_from(&other.collection);
        }
    }

    /// Every related object reachable one level down, inline or by
    /// reference.
    pub fn related_objects(&self) -> Vec<Related<'_>> {
        let mut related = Vec::new();
        for value in self.properties.values() {
            collect_related(value, &mut related);
        }
        related
    }
}

fn collect_related<'a>(value: &'a Value, out: &mut Vec<Related<'a>>) {
    match value {
        Value::Object(o) => out.push(Related::Inline(o)),
        Value::Reference(r) => out.push(Related::Reference(r)),
        Value::List(items) => {
            for item in items {
                match item {
                    Value::Object(o) => out.push(Related::Inline(o)),
                    Value::Reference(r) => out.push(Related::Reference(r)),
                    _ => {}
                }
            }
        }
        Value::Scalar(_) => {}
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn import_values_overwrites_present_keeps_absent() {
        let mut base = Object::with_id("todos", "a1")
            .with("title", "old")
            .with("done", false);
        let incoming = Object::with_id("todos", "a1").with("title", "new");

        base.import_values(&incoming);

        assert_eq!(base.string("title"), Some("new"));
        assert_eq!(base.boolean("done"), Some(false));
    }

    #[test]
    fn import_values_adopts_collection_when_unknown() {
        let mut base = Object::default();
        base.import_values(&Object::new("users"));
        assert_eq!(base.collection(), "users");

        let mut named = Object::new("todos");
        named.import_values(&Object::new("users"));
        assert_eq!(named.collection(), "todos");
    }

    #[test]
    fn related_objects_walks_singles_and_lists() {
        let owner = Object::with_id("users", "u1");
        let tag = Object::with_id("tags", "t1");
        let object = Object::with_id("todos", "a1")
            .with("title", "x")
            .with("owner", owner)
            .with(
                "tags",
                Value::List(vec![
                    Value::from(tag),
                    Value::Reference(ObjectRef::new("tags", "t2")),
                    Value::from("not a relation"),
                ]),
            );

        let related = object.related_objects();
        let collections: Vec<_> = related.iter().map(Related::collection).collect();
        let ids: Vec<_> = related
            .iter()
            .map(|r| r.id().unwrap().as_str().to_owned())
            .collect();

        assert_eq!(collections, vec!["users", "tags", "tags"]);
        assert_eq!(ids, vec!["u1", "t1", "t2"]);
    }

    #[test]
    fn objects_requires_every_element_inline() {
        let mixed = Object::new("todos").with(
            "tags",
            Value::List(vec![
                Value::from(Object::new("tags")),
                Value::Reference(ObjectRef::new("tags", "t2")),
            ]),
        );
        assert!(mixed.objects("tags").is_none());

        let inline = Object::new("todos").with("tags", vec![Object::new("tags")]);
        assert_eq!(inline.objects("tags").unwrap().len(), 1);
    }

    #[test]
    fn created_parses_rfc3339() {
        let object = Object::new("todos").with(SYS_CREATED, "2021-03-04T05:06:07Z");
        let created = object.created().unwrap();
        assert_eq!(created.to_rfc3339(), "2021-03-04T05:06:07+00:00");
        assert!(object.updated().is_none());
    }

    #[test]
    fn all_properties_in_insertion_order() {
        let object = Object::new("todos").with("b", 1_i64).with("a", 2_i64);
        let names: Vec<_> = object.all_properties().collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
