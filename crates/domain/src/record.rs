//! Record — a generic persisted object of a catalog class.
//!
//! Every entity the API exposes (hosts, images, tasks, …) is a record: its
//! class name, its id, and a JSON object of whitelisted fields. Typed
//! behaviour lives in the services; records only offer get/set accessors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::id::RecordId;
use crate::value::{as_i64, as_id, is_truthy, loose_eq, scalar_text};

/// Field map of a record, keyed by public field name.
pub type Fields = Map<String, Value>;

/// A persisted object of some catalog class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub class: String,
    pub id: RecordId,
    pub fields: Fields,
}

impl Record {
    #[must_use]
    pub fn new(class: impl Into<String>, id: RecordId, fields: Fields) -> Self {
        Self {
            class: class.into(),
            id,
            fields,
        }
    }

    /// Raw field value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Set a field, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// The `name` field, or `""` when unset.
    #[must_use]
    pub fn name(&self) -> &str {
        self.get("name").and_then(Value::as_str).unwrap_or_default()
    }

    /// Textual form of a field; `""` when unset.
    #[must_use]
    pub fn text(&self, key: &str) -> String {
        self.get(key).and_then(scalar_text).unwrap_or_default()
    }

    /// Integer form of a field.
    #[must_use]
    pub fn int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(as_i64)
    }

    /// A foreign-key field as a [`RecordId`]; `None` when unset or zero.
    #[must_use]
    pub fn reference(&self, key: &str) -> Option<RecordId> {
        self.get(key).and_then(as_id)
    }

    /// Whether a field holds a truthy value.
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(is_truthy)
    }

    /// Render as the JSON object returned by the API: `id` first, then fields.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut out = Map::with_capacity(self.fields.len() + 1);
        out.insert("id".to_string(), Value::from(self.id.get()));
        for (key, value) in &self.fields {
            if key != "id" {
                out.insert(key.clone(), value.clone());
            }
        }
        Value::Object(out)
    }
}

/// Conjunction of `field IN (values)` clauses.
///
/// Values compare loosely (see [`loose_eq`]); the pseudo-field `id` matches
/// the record id. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Vec<Value>)>,
}

impl Filter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to equal `value`.
    #[must_use]
    pub fn equals(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.any_of(field, [value.into()])
    }

    /// Require `field` to equal one of `values`.
    #[must_use]
    pub fn any_of(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = Value>,
    ) -> Self {
        self.clauses
            .push((field.into(), values.into_iter().collect()));
        self
    }

    /// Build a filter from a request body, keeping only `allowed` keys.
    ///
    /// Array values become `IN` clauses.
    #[must_use]
    pub fn from_fields(body: &Fields, allowed: &[&str]) -> Self {
        let mut filter = Self::new();
        for key in allowed {
            let Some(value) = body.get(*key) else {
                continue;
            };
            filter = match value {
                Value::Array(items) => filter.any_of(*key, items.iter().cloned()),
                other => filter.equals(*key, other.clone()),
            };
        }
        filter
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Whether the record satisfies every clause.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        self.clauses.iter().all(|(field, values)| {
            let actual = if field == "id" {
                Value::from(record.id.get())
            } else {
                record.get(field).cloned().unwrap_or(Value::Null)
            };
            values.iter().any(|v| loose_eq(&actual, v))
        })
    }
}
