//! Mutable argument map passed to hook handlers.

use std::collections::BTreeMap;

use serde_json::Value;

use fog_domain::id::RecordId;
use fog_domain::record::Record;

/// Well-known argument keys.
pub mod keys {
    pub const HOST: &str = "Host";
    pub const TASK_TYPE: &str = "TaskType";
    pub const STORAGE_NODE: &str = "StorageNode";
    pub const STORAGE_GROUP: &str = "StorageGroup";
    pub const STORAGE_NODES: &str = "StorageNodes";
    pub const MASTER_IDS: &str = "MasterIDs";
    pub const SERVICE_CLASS: &str = "FOGServiceClass";
    pub const SNAPIN: &str = "snapin";
    pub const MEMDISK: &str = "memdisk";
    pub const MEMTEST: &str = "memtest";
    pub const BZIMAGE: &str = "bzImage";
    pub const INITRD: &str = "initrd";
    pub const IMAGEFILE: &str = "imagefile";
    pub const WEBSERVER: &str = "webserver";
    pub const WEBROOT: &str = "webroot";
    pub const VALID_CLASSES: &str = "validClasses";
    pub const TASKING_CLASSES: &str = "validTaskingClasses";
    pub const ACTIVE_TASK_CLASSES: &str = "validActiveTasks";
    pub const DATA: &str = "data";
    pub const CLASSNAME: &str = "classname";
    pub const RECORD: &str = "class";
}

/// One value in a [`HookArgs`] map.
#[derive(Debug, Clone, PartialEq)]
pub enum HookValue {
    Record(Record),
    Records(Vec<Record>),
    Ids(Vec<RecordId>),
    Names(Vec<String>),
    Text(String),
    Flag(bool),
    Json(Value),
}

impl From<Record> for HookValue {
    fn from(value: Record) -> Self {
        Self::Record(value)
    }
}

impl From<Vec<Record>> for HookValue {
    fn from(value: Vec<Record>) -> Self {
        Self::Records(value)
    }
}

impl From<Vec<RecordId>> for HookValue {
    fn from(value: Vec<RecordId>) -> Self {
        Self::Ids(value)
    }
}

impl From<Vec<String>> for HookValue {
    fn from(value: Vec<String>) -> Self {
        Self::Names(value)
    }
}

impl From<String> for HookValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for HookValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<bool> for HookValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<Value> for HookValue {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// Request-scoped arguments shared between the caller and hook handlers.
///
/// Typed accessors return `None` when the key is absent *or* holds a value
/// of another kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookArgs {
    values: BTreeMap<&'static str, HookValue>,
}

impl HookArgs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: &'static str, value: impl Into<HookValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or overwrite a key.
    pub fn insert(&mut self, key: &'static str, value: impl Into<HookValue>) {
        self.values.insert(key, value.into());
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<HookValue> {
        self.values.remove(key)
    }

    #[must_use]
    pub fn record(&self, key: &str) -> Option<&Record> {
        match self.values.get(key) {
            Some(HookValue::Record(record)) => Some(record),
            _ => None,
        }
    }

    pub fn record_mut(&mut self, key: &str) -> Option<&mut Record> {
        match self.values.get_mut(key) {
            Some(HookValue::Record(record)) => Some(record),
            _ => None,
        }
    }

    /// Remove and return a record value. Values of other kinds are kept.
    pub fn take_record(&mut self, key: &str) -> Option<Record> {
        if self.record(key).is_none() {
            return None;
        }
        match self.values.remove(key) {
            Some(HookValue::Record(record)) => Some(record),
            _ => None,
        }
    }

    #[must_use]
    pub fn records(&self, key: &str) -> Option<&[Record]> {
        match self.values.get(key) {
            Some(HookValue::Records(records)) => Some(records),
            _ => None,
        }
    }

    #[must_use]
    pub fn ids(&self, key: &str) -> &[RecordId] {
        match self.values.get(key) {
            Some(HookValue::Ids(ids)) => ids,
            _ => &[],
        }
    }

    pub fn names_mut(&mut self, key: &str) -> Option<&mut Vec<String>> {
        match self.values.get_mut(key) {
            Some(HookValue::Names(names)) => Some(names),
            _ => None,
        }
    }

    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(HookValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.values.get(key) {
            Some(HookValue::Flag(flag)) => Some(*flag),
            _ => None,
        }
    }

    #[must_use]
    pub fn json(&self, key: &str) -> Option<&Value> {
        match self.values.get(key) {
            Some(HookValue::Json(value)) => Some(value),
            _ => None,
        }
    }

    pub fn json_mut(&mut self, key: &str) -> Option<&mut Value> {
        match self.values.get_mut(key) {
            Some(HookValue::Json(value)) => Some(value),
            _ => None,
        }
    }

    /// Consume the map, returning the value stored under `key`.
    #[must_use]
    pub fn into_value(mut self, key: &str) -> Option<HookValue> {
        self.values.remove(key)
    }
}
