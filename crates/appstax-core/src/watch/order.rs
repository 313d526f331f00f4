// ── Result ordering ──
//
// An order spec is a property name with an optional leading `-` for
// descending. `created` and `updated` are shorthands for the system
// timestamps. Comparison is on the text form; absent values sort as "".

use std::cmp::Ordering;
use std::fmt;

use crate::object::{Object, SYS_CREATED, SYS_UPDATED};

/// Default order for new watches: newest first.
pub const DEFAULT_ORDER: &str = "-created";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSpec {
    property: String,
    descending: bool,
}

impl OrderSpec {
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();
        let (descending, name) = match spec.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, spec),
        };
        let property = match name {
            "created" => SYS_CREATED,
            "updated" => SYS_UPDATED,
            other => other,
        };
        Self {
            property: property.to_owned(),
            descending,
        }
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn is_descending(&self) -> bool {
        self.descending
    }

    /// Sort key for `object`.
    pub fn key(&self, object: &Object) -> String {
        object.text(&self.property).unwrap_or_default()
    }

    pub fn compare_keys(&self, a: &str, b: &str) -> Ordering {
        let ordering = a.cmp(b);
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }

    pub fn compare(&self, a: &Object, b: &Object) -> Ordering {
        self.compare_keys(&self.key(a), &self.key(b))
    }
}

impl Default for OrderSpec {
    fn default() -> Self {
        Self::parse(DEFAULT_ORDER)
    }
}

impl fmt::Display for OrderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            f.write_str("-")?;
        }
        f.write_str(&self.property)
    }
}
