// ── Wire JSON ⇄ domain Object conversion ──
//
// Objects travel as flat JSON maps. System properties carry identity
// (`sysObjectId`) and collection (`sysCollection`); relations arrive as
// descriptors tagged `"sysDatatype": "relation"` whose `sysObjects` hold
// either expanded objects or bare id strings.

use serde::ser::{Serialize, Serializer};
use serde_json::{Map, Value as Json};

use crate::error::CoreError;
use crate::object::{Object, ObjectId, ObjectRef, SYS_COLLECTION, SYS_OBJECT_ID, Value};

const SYS_DATATYPE: &str = "sysDatatype";
const SYS_RELATION_TYPE: &str = "sysRelationType";
const SYS_OBJECTS: &str = "sysObjects";
const RELATION: &str = "relation";
const RELATION_SINGLE: &str = "single";

// ── JSON → Object ───────────────────────────────────────────────────

/// Convert one wire object. `collection` is used when the payload does
/// not name its own.
pub fn object_from_json(collection: &str, json: Json) -> Result<Object, CoreError> {
    match json {
        Json::Object(map) => Ok(object_from_map(collection, map)),
        other => Err(CoreError::InvalidObject {
            reason: format!("expected a JSON object, got {}", json_kind(&other)),
        }),
    }
}

/// Convert a list of wire objects, failing on the first malformed one.
pub fn objects_from_json(collection: &str, items: Vec<Json>) -> Result<Vec<Object>, CoreError> {
    items
        .into_iter()
        .map(|item| object_from_json(collection, item))
        .collect()
}

fn object_from_map(collection: &str, mut map: Map<String, Json>) -> Object {
    let own_collection = match map.remove(SYS_COLLECTION) {
        Some(Json::String(c)) if !c.is_empty() => c,
        _ => collection.to_owned(),
    };

    let mut object = Object::new(own_collection);
    match map.remove(SYS_OBJECT_ID) {
        Some(Json::String(id)) if !id.is_empty() => object.set_id(id),
        Some(Json::Number(n)) => object.set_id(n.to_string()),
        _ => {}
    }

    let properties = object.properties_mut();
    for (key, value) in map {
        properties.insert(key, value_from_json(value));
    }
    object
}

fn value_from_json(json: Json) -> Value {
    match json {
        Json::Array(items) => Value::List(items.into_iter().map(value_from_json).collect()),
        Json::Object(map) if is_relation(&map) => relation_from_json(map),
        Json::Object(map) => {
            let collection = map
                .get(SYS_COLLECTION)
                .and_then(Json::as_str)
                .unwrap_or_default()
                .to_owned();
            Value::Object(Box::new(object_from_map(&collection, map)))
        }
        scalar => Value::Scalar(scalar),
    }
}

fn is_relation(map: &Map<String, Json>) -> bool {
    map.get(SYS_DATATYPE).and_then(Json::as_str) == Some(RELATION)
}

fn relation_from_json(mut map: Map<String, Json>) -> Value {
    let collection = match map.remove(SYS_COLLECTION) {
        Some(Json::String(c)) => c,
        _ => String::new(),
    };
    let single = map.get(SYS_RELATION_TYPE).and_then(Json::as_str) == Some(RELATION_SINGLE);
    let targets: Vec<Value> = match map.remove(SYS_OBJECTS) {
        Some(Json::Array(items)) => items
            .into_iter()
            .filter_map(|item| relation_target(&collection, item))
            .collect(),
        _ => Vec::new(),
    };

    if single {
        targets.into_iter().next().unwrap_or_else(Value::null)
    } else {
        Value::List(targets)
    }
}

fn relation_target(collection: &str, item: Json) -> Option<Value> {
    match item {
        Json::String(id) => Some(Value::Reference(ObjectRef {
            collection: collection.to_owned(),
            id: ObjectId::new(id),
        })),
        Json::Object(map) => Some(Value::Object(Box::new(object_from_map(collection, map)))),
        _ => None,
    }
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}

// ── Object → JSON ───────────────────────────────────────────────────

/// Render an object back to its flat wire form. References become
/// `{sysObjectId, sysCollection}` stubs.
pub fn object_to_json(object: &Object) -> Json {
    let mut map = Map::new();
    if let Some(id) = object.id() {
        map.insert(SYS_OBJECT_ID.into(), Json::String(id.to_string()));
    }
    if !object.collection().is_empty() {
        map.insert(SYS_COLLECTION.into(), Json::String(object.collection().to_owned()));
    }
    for (key, value) in object.properties() {
        map.insert(key.clone(), value_to_json(value));
    }
    Json::Object(map)
}

fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Scalar(v) => v.clone(),
        Value::Object(o) => object_to_json(o),
        Value::Reference(r) => {
            let mut stub = Map::new();
            stub.insert(SYS_OBJECT_ID.into(), Json::String(r.id.to_string()));
            stub.insert(SYS_COLLECTION.into(), Json::String(r.collection.clone()));
            Json::Object(stub)
        }
        Value::List(items) => Json::Array(items.iter().map(value_to_json).collect()),
    }
}

impl Object {
    /// Flat wire form of this object.
    pub fn to_json(&self) -> Json {
        object_to_json(self)
    }
}

impl Serialize for Object {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        object_to_json(self).serialize(serializer)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn identity_and_collection_are_lifted_out() {
        let object = object_from_json(
            "todos",
            json!({ "sysObjectId": "a1", "title": "Buy milk", "sysCreated": "2021" }),
        )
        .unwrap();

        assert_eq!(object.id().unwrap().as_str(), "a1");
        assert_eq!(object.collection(), "todos");
        assert!(!object.contains(SYS_OBJECT_ID));
        assert_eq!(object.string("title"), Some("Buy milk"));
        assert_eq!(object.string("sysCreated"), Some("2021"));
    }

    #[test]
    fn payload_collection_wins_over_context() {
        let object =
            object_from_json("todos", json!({ "sysCollection": "archive", "sysObjectId": "a1" }))
                .unwrap();
        assert_eq!(object.collection(), "archive");
    }

    #[test]
    fn expanded_single_relation_becomes_inline_object() {
        let object = object_from_json(
            "todos",
            json!({
                "sysObjectId": "a1",
                "owner": {
                    "sysDatatype": "relation",
                    "sysRelationType": "single",
                    "sysCollection": "users",
                    "sysObjects": [{ "sysObjectId": "u1", "name": "Ada" }]
                }
            }),
        )
        .unwrap();

        let owner = object.object("owner").unwrap();
        assert_eq!(owner.id().unwrap().as_str(), "u1");
        assert_eq!(owner.collection(), "users");
        assert_eq!(owner.string("name"), Some("Ada"));
    }

    #[test]
    fn unexpanded_array_relation_becomes_references() {
        let object = object_from_json(
            "todos",
            json!({
                "tags": {
                    "sysDatatype": "relation",
                    "sysRelationType": "array",
                    "sysCollection": "tags",
                    "sysObjects": ["t1", "t2"]
                }
            }),
        )
        .unwrap();

        let tags = object.get("tags").unwrap().as_list().unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[1].as_reference().unwrap(), &ObjectRef::new("tags", "t2"));
    }

    #[test]
    fn empty_single_relation_is_null() {
        let object = object_from_json(
            "todos",
            json!({
                "owner": {
                    "sysDatatype": "relation",
                    "sysRelationType": "single",
                    "sysCollection": "users",
                    "sysObjects": []
                }
            }),
        )
        .unwrap();
        assert!(object.get("owner").unwrap().is_null());
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let err = object_from_json("todos", json!([1, 2])).unwrap_err();
        assert!(matches!(err, CoreError::InvalidObject { .. }));
    }

    #[test]
    fn to_json_writes_reference_stubs() {
        let object = Object::with_id("todos", "a1")
            .with("title", "x")
            .with("owner", ObjectRef::new("users", "u1"));

        assert_eq!(
            object_to_json(&object),
            json!({
                "sysObjectId": "a1",
                "sysCollection": "todos",
                "title": "x",
                "owner": { "sysObjectId": "u1", "sysCollection": "users" }
            })
        );
    }

    #[test]
    fn serialize_matches_to_json() {
        let object = Object::with_id("todos", "a1").with("done", true);
        assert_eq!(serde_json::to_value(&object).unwrap(), object_to_json(&object));
    }
}
