use super::{Object, ObjectRef};

/// A single property value.
///
/// Absence of a property is modelled by the property map, never by a
/// variant here: `Scalar(Null)` is an explicit null.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// JSON scalar: null, bool, number or string.
    Scalar(serde_json::Value),
    /// Inline object that has not been routed through the store.
    Object(Box<Object>),
    /// Link to a canonical object held by the store.
    Reference(ObjectRef),
    List(Vec<Value>),
}

impl Value {
    pub fn null() -> Self {
        Self::Scalar(serde_json::Value::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Scalar(serde_json::Value::Null))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(v) => v.as_str(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => v.as_f64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Scalar(v) => v.as_bool(),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&ObjectRef> {
        match self {
            Self::Reference(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Text rendering used for ordering: strings as-is, numbers and
    /// booleans formatted; everything else has no text form.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Scalar(serde_json::Value::String(s)) => Some(s.clone()),
            Self::Scalar(serde_json::Value::Number(n)) => Some(n.to_string()),
            Self::Scalar(serde_json::Value::Bool(b)) => Some(b.to_string()),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Scalar(serde_json::Value::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Scalar(serde_json::Value::from(s))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Scalar(serde_json::Value::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Scalar(serde_json::Value::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Scalar(serde_json::Value::from(b))
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Self::Object(Box::new(o))
    }
}

impl From<ObjectRef> for Value {
    fn from(r: ObjectRef) -> Self {
        Self::Reference(r)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<Vec<Object>> for Value {
    fn from(items: Vec<Object>) -> Self {
        Self::List(items.into_iter().map(Value::from).collect())
    }
}
