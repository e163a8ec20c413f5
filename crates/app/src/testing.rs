//! In-memory port implementations shared by the unit tests of this crate.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Mutex;

use serde_json::{Value, json};

use fog_domain::error::{FogError, NotFoundError};
use fog_domain::id::RecordId;
use fog_domain::record::{Fields, Filter, Record};
use fog_domain::windows_key::{KeyFilter, NewWindowsKey, WindowsKey};

use crate::ports::{RecordRepository, WindowsKeyStore};

#[derive(Default)]
pub struct InMemoryRecords {
    store: Mutex<BTreeMap<(String, i64), Fields>>,
    /// Last id handed out per class; never goes down.
    sequences: Mutex<BTreeMap<String, i64>>,
}

impl InMemoryRecords {
    /// Insert a record from a JSON object literal and return its id.
    pub fn seed(&self, class: &str, fields: Value) -> RecordId {
        let Value::Object(fields) = fields else {
            panic!("seed expects an object");
        };
        let mut sequences = self.sequences.lock().unwrap();
        let last = sequences.entry(class.to_string()).or_insert(0);
        *last += 1;
        let next = *last;
        self.store.lock().unwrap().insert((class.to_string(), next), fields);
        RecordId::new(next).unwrap()
    }

    pub fn record(&self, class: &str, id: RecordId) -> Option<Record> {
        let store = self.store.lock().unwrap();
        store
            .get(&(class.to_string(), id.get()))
            .map(|fields| Record::new(class, id, fields.clone()))
    }

    pub fn all(&self, class: &str) -> Vec<Record> {
        let store = self.store.lock().unwrap();
        store
            .iter()
            .filter(|((c, _), _)| c == class)
            .map(|((c, id), fields)| Record::new(c.clone(), RecordId::new(*id).unwrap(), fields.clone()))
            .collect()
    }

    /// Mark a plugin as installed and active.
    pub fn install_plugin(&self, name: &str) {
        self.seed("plugin", json!({"name": name, "state": 1, "installed": 1}));
    }
}

impl RecordRepository for InMemoryRecords {
    fn insert(
        &self,
        class: &str,
        fields: Fields,
    ) -> impl Future<Output = Result<Record, FogError>> + Send {
        let id = self.seed(class, Value::Object(fields.clone()));
        let record = Record::new(class, id, fields);
        async { Ok(record) }
    }

    fn get(
        &self,
        class: &str,
        id: RecordId,
    ) -> impl Future<Output = Result<Option<Record>, FogError>> + Send {
        let result = self.record(class, id);
        async { Ok(result) }
    }

    fn find(
        &self,
        class: &str,
        filter: &Filter,
    ) -> impl Future<Output = Result<Vec<Record>, FogError>> + Send {
        let result: Vec<Record> = self
            .all(class)
            .into_iter()
            .filter(|record| filter.matches(record))
            .collect();
        async { Ok(result) }
    }

    fn update(&self, record: Record) -> impl Future<Output = Result<Record, FogError>> + Send {
        let mut store = self.store.lock().unwrap();
        let key = (record.class.clone(), record.id.get());
        let result = match store.get_mut(&key) {
            Some(fields) => {
                fields.clone_from(&record.fields);
                Ok(record)
            }
            None => Err(NotFoundError::new(record.class.clone(), record.id).into()),
        };
        async { result }
    }

    fn delete(
        &self,
        class: &str,
        ids: &[RecordId],
    ) -> impl Future<Output = Result<u64, FogError>> + Send {
        let mut store = self.store.lock().unwrap();
        let mut removed = 0;
        for id in ids {
            if store.remove(&(class.to_string(), id.get())).is_some() {
                removed += 1;
            }
        }
        async move { Ok(removed) }
    }
}

/// Windows key tables kept in memory; `installed` tracks the schema.
#[derive(Default)]
pub struct InMemoryWindowsKeys {
    state: Mutex<KeyTables>,
}

#[derive(Default)]
struct KeyTables {
    installed: bool,
    keys: Vec<WindowsKey>,
    links: Vec<(RecordId, RecordId)>,
}

impl InMemoryWindowsKeys {
    pub fn is_installed(&self) -> bool {
        self.state.lock().unwrap().installed
    }
}

impl WindowsKeyStore for InMemoryWindowsKeys {
    fn install(&self) -> impl Future<Output = Result<(), FogError>> + Send {
        let mut state = self.state.lock().unwrap();
        *state = KeyTables {
            installed: true,
            ..KeyTables::default()
        };
        async { Ok(()) }
    }

    fn uninstall(&self) -> impl Future<Output = Result<(), FogError>> + Send {
        *self.state.lock().unwrap() = KeyTables::default();
        async { Ok(()) }
    }

    fn destroy(&self, filter: KeyFilter) -> impl Future<Output = Result<u64, FogError>> + Send {
        let mut state = self.state.lock().unwrap();
        let doomed: Vec<RecordId> = state
            .keys
            .iter()
            .filter(|key| filter.ids.is_empty() || filter.ids.contains(&key.id))
            .filter(|key| filter.name.as_ref().is_none_or(|name| *name == key.name))
            .map(|key| key.id)
            .collect();
        state.keys.retain(|key| !doomed.contains(&key.id));
        state.links.retain(|(key, _)| !doomed.contains(key));
        let removed = doomed.len() as u64;
        async move { Ok(removed) }
    }

    fn create(
        &self,
        key: NewWindowsKey,
    ) -> impl Future<Output = Result<WindowsKey, FogError>> + Send {
        let mut state = self.state.lock().unwrap();
        let next = state.keys.iter().map(|key| key.id.get()).max().unwrap_or(0) + 1;
        let stored = WindowsKey {
            id: RecordId::new(next).unwrap(),
            name: key.name,
            description: key.description,
            created_by: key.created_by,
            created_time: "2024-01-01 00:00:00".to_string(),
            key: key.key,
        };
        state.keys.push(stored.clone());
        async { Ok(stored) }
    }

    fn list(&self) -> impl Future<Output = Result<Vec<WindowsKey>, FogError>> + Send {
        let keys = self.state.lock().unwrap().keys.clone();
        async { Ok(keys) }
    }

    fn associate(
        &self,
        key_id: RecordId,
        image_id: RecordId,
    ) -> impl Future<Output = Result<(), FogError>> + Send {
        self.state.lock().unwrap().links.push((key_id, image_id));
        async { Ok(()) }
    }

    fn images_for(
        &self,
        key_id: RecordId,
    ) -> impl Future<Output = Result<Vec<RecordId>, FogError>> + Send {
        let images: Vec<RecordId> = self
            .state
            .lock()
            .unwrap()
            .links
            .iter()
            .filter(|(key, _)| *key == key_id)
            .map(|(_, image)| *image)
            .collect();
        async { Ok(images) }
    }
}
