//! Record service — generic CRUD over every catalog class.

use std::sync::Arc;

use serde_json::Value;

use fog_domain::catalog::{Catalog, ClassSpec};
use fog_domain::error::{FogError, NotFoundError, ValidationError};
use fog_domain::id::RecordId;
use fog_domain::record::{Fields, Filter, Record};
use fog_domain::value::{is_numeric, is_truthy, scalar_text};

use super::presenter::Presenter;
use super::relations::{self, Mode, RelationChanges};
use crate::hooks::{HookArgs, HookEvent, HookManager, HookValue, keys};
use crate::ports::RecordRepository;

/// Marker hiding internal records from listings.
const HIDDEN_MARKER: &str = "_api_";

/// Application service behind the generic class routes.
pub struct RecordService<R> {
    repo: Arc<R>,
    hooks: Arc<HookManager>,
    presenter: Presenter<R>,
}

impl<R: RecordRepository + Send + Sync> RecordService<R> {
    pub fn new(repo: Arc<R>, hooks: Arc<HookManager>) -> Self {
        Self {
            presenter: Presenter::new(Arc::clone(&repo), Arc::clone(&hooks)),
            repo,
            hooks,
        }
    }

    #[must_use]
    pub fn presenter(&self) -> &Presenter<R> {
        &self.presenter
    }

    /// The dispatch lists for this request, after plugins extended them.
    pub async fn catalog(&self) -> Catalog {
        let Catalog {
            valid,
            tasking,
            active,
        } = Catalog::default();
        Catalog {
            valid: self.extend(HookEvent::ApiValidClasses, keys::VALID_CLASSES, valid).await,
            tasking: self
                .extend(HookEvent::ApiTaskingClasses, keys::TASKING_CLASSES, tasking)
                .await,
            active: self
                .extend(HookEvent::ApiActiveTaskClasses, keys::ACTIVE_TASK_CLASSES, active)
                .await,
        }
    }

    async fn extend(&self, event: HookEvent, key: &'static str, names: Vec<String>) -> Vec<String> {
        let mut args = HookArgs::new().with(key, names.clone());
        self.hooks.process_event(event, &mut args).await;
        match args.into_value(key) {
            Some(HookValue::Names(extended)) => extended,
            _ => names,
        }
    }

    /// Every record matching the permitted keys of `body`, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list(&self, spec: &ClassSpec, body: &Fields) -> Result<Value, FogError> {
        let filter = Filter::from_fields(body, spec.fields);
        let mut records = self.repo.find(spec.name, &filter).await?;
        records.sort_by_cached_key(|record| record.name().to_lowercase());
        let mut extra = Fields::new();
        if spec.name == "plugin" {
            let count = |pred: fn(&Record) -> bool| Value::from(records.iter().filter(|r| pred(r)).count());
            extra.insert(
                "count_active".to_string(),
                count(|p| p.flag("state") && !p.flag("installed")),
            );
            extra.insert(
                "count_installed".to_string(),
                count(|p| p.flag("state") && p.flag("installed")),
            );
            extra.insert(
                "count_not_active".to_string(),
                count(|p| !p.flag("state") && !p.flag("installed")),
            );
        } else {
            records.retain(|record| !is_hidden(record));
        }
        self.presenter.collection(spec, &records, extra).await
    }

    /// Records with any field value containing `item`, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn search(&self, spec: &ClassSpec, item: &str) -> Result<Value, FogError> {
        let needle = item.to_lowercase();
        let mut records = self.repo.find(spec.name, &Filter::new()).await?;
        records.retain(|record| {
            !is_hidden(record)
                && (record.id.to_string() == needle
                    || record.fields.values().any(|value| {
                        scalar_text(value).is_some_and(|text| text.to_lowercase().contains(&needle))
                    }))
        });
        self.presenter.collection(spec, &records, Fields::new()).await
    }

    /// Fetch one record.
    ///
    /// # Errors
    ///
    /// Returns [`FogError::NotFound`] when absent, or a storage error.
    pub async fn get(&self, spec: &ClassSpec, id: RecordId) -> Result<Value, FogError> {
        let record = self.fetch(spec, id).await?;
        self.presenter.one(&record).await
    }

    /// Create a record from a request body and apply its relations.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::AlreadyCreated`] for a duplicate name,
    /// [`ValidationError::MissingRequiredField`] when a required field is
    /// unset, [`ValidationError::InvalidMac`] for a malformed MAC address,
    /// or a storage error.
    pub async fn create(&self, spec: &ClassSpec, body: &Fields) -> Result<Value, FogError> {
        if let Some(name) = body_name(body)
            && self.name_taken(spec, &name, None).await?
        {
            return Err(ValidationError::AlreadyCreated.into());
        }
        let mut fields = Fields::new();
        for key in spec.fields.iter().filter(|key| **key != "id") {
            if let Some(value) = body.get(*key).filter(|value| is_truthy(value)) {
                fields.insert((*key).to_string(), value.clone());
            }
        }
        check_required(spec, &fields)?;
        let changes = RelationChanges::from_body(spec.name, body)?;

        let record = self.repo.insert(spec.name, fields).await?;
        relations::apply(&*self.repo, &record, &changes, Mode::Add).await?;
        tracing::info!(class = spec.name, id = %record.id, "record created");
        self.get(spec, record.id).await
    }

    /// Overwrite the permitted fields present in `body` and replace relations.
    ///
    /// # Errors
    ///
    /// Returns [`FogError::NotFound`] when absent,
    /// [`ValidationError::AlreadyCreated`] when renaming onto another
    /// record's name, [`ValidationError::InvalidMac`], or a storage error.
    pub async fn edit(&self, spec: &ClassSpec, id: RecordId, body: &Fields) -> Result<Value, FogError> {
        let mut record = self.fetch(spec, id).await?;
        if let Some(name) = body_name(body)
            && !record.name().eq_ignore_ascii_case(&name)
            && self.name_taken(spec, &name, Some(id)).await?
        {
            return Err(ValidationError::AlreadyCreated.into());
        }
        for key in spec.fields.iter().filter(|key| **key != "id") {
            if let Some(value) = body.get(*key) {
                record.set(*key, value.clone());
            }
        }
        let changes = RelationChanges::from_body(spec.name, body)?;

        let record = self.repo.update(record).await?;
        relations::apply(&*self.repo, &record, &changes, Mode::Replace).await?;
        tracing::info!(class = spec.name, %id, "record updated");
        self.get(spec, id).await
    }

    /// Remove a record and every association record pointing at it.
    ///
    /// # Errors
    ///
    /// Returns [`FogError::NotFound`] when absent, or a storage error.
    pub async fn delete(&self, spec: &ClassSpec, id: RecordId) -> Result<(), FogError> {
        self.fetch(spec, id).await?;
        for (assoc, key) in Catalog::dependents(spec.name) {
            let links = self
                .repo
                .find(assoc.name, &Filter::new().equals(key, id.get()))
                .await?;
            if links.is_empty() {
                continue;
            }
            let ids: Vec<RecordId> = links.iter().map(|link| link.id).collect();
            let removed = self.repo.delete(assoc.name, &ids).await?;
            tracing::debug!(assoc = assoc.name, removed, "associations removed");
        }
        self.repo.delete(spec.name, &[id]).await?;
        tracing::info!(class = spec.name, %id, "record deleted");
        Ok(())
    }

    async fn fetch(&self, spec: &ClassSpec, id: RecordId) -> Result<Record, FogError> {
        self.repo
            .get(spec.name, id)
            .await?
            .ok_or_else(|| NotFoundError::new(spec.name, id).into())
    }

    /// Whether another record of the class already uses `name`.
    async fn name_taken(
        &self,
        spec: &ClassSpec,
        name: &str,
        except: Option<RecordId>,
    ) -> Result<bool, FogError> {
        if !spec.permits("name") {
            return Ok(false);
        }
        let records = self.repo.find(spec.name, &Filter::new()).await?;
        Ok(records
            .iter()
            .any(|record| Some(record.id) != except && record.name().eq_ignore_ascii_case(name)))
    }
}

fn body_name(body: &Fields) -> Option<String> {
    body.get("name")
        .and_then(scalar_text)
        .filter(|name| !name.is_empty())
}

fn is_hidden(record: &Record) -> bool {
    record.name().to_lowercase().contains(HIDDEN_MARKER)
}

fn check_required(spec: &ClassSpec, fields: &Fields) -> Result<(), FogError> {
    for key in spec.required {
        let set = fields
            .get(*key)
            .is_some_and(|value| is_numeric(value) || is_truthy(value));
        if !set {
            return Err(ValidationError::MissingRequiredField((*key).to_string()).into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryRecords;
    use fog_domain::catalog::spec;
    use serde_json::json;

    fn service() -> (Arc<InMemoryRecords>, RecordService<InMemoryRecords>) {
        let repo = Arc::new(InMemoryRecords::default());
        let service = RecordService::new(Arc::clone(&repo), Arc::new(HookManager::new()));
        (repo, service)
    }

    fn body(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("object expected"),
        }
    }

    fn host_spec() -> &'static ClassSpec {
        spec("host").unwrap()
    }

    #[tokio::test]
    async fn should_list_sorted_by_name_and_hide_api_records() {
        let (repo, service) = service();
        repo.seed("host", json!({"name": "zeta"}));
        repo.seed("host", json!({"name": "Alpha"}));
        repo.seed("host", json!({"name": "temp_api_host"}));

        let data = service.list(host_spec(), &Fields::new()).await.unwrap();

        assert_eq!(data["count"], 2);
        assert_eq!(data["hosts"][0]["name"], "Alpha");
        assert_eq!(data["hosts"][1]["name"], "zeta");
    }

    #[tokio::test]
    async fn should_filter_list_by_permitted_body_keys() {
        let (repo, service) = service();
        repo.seed("host", json!({"name": "a", "imageID": 1}));
        repo.seed("host", json!({"name": "b", "imageID": 2}));

        let data = service
            .list(host_spec(), &body(json!({"imageID": "2", "bogus": 1})))
            .await
            .unwrap();
        assert_eq!(data["count"], 1);
        assert_eq!(data["hosts"][0]["name"], "b");
    }

    #[tokio::test]
    async fn should_count_plugin_states() {
        let (repo, service) = service();
        repo.seed("plugin", json!({"name": "location", "state": 1, "installed": 1}));
        repo.seed("plugin", json!({"name": "windowskeys", "state": 1, "installed": 0}));
        repo.seed("plugin", json!({"name": "other", "state": 0, "installed": 0}));

        let data = service.list(spec("plugin").unwrap(), &Fields::new()).await.unwrap();
        assert_eq!(data["count"], 3);
        assert_eq!(data["count_installed"], 1);
        assert_eq!(data["count_active"], 1);
        assert_eq!(data["count_not_active"], 1);
    }

    #[tokio::test]
    async fn should_search_any_field_case_insensitively() {
        let (repo, service) = service();
        repo.seed("host", json!({"name": "lab-01", "description": "Room B"}));
        repo.seed("host", json!({"name": "office"}));

        let data = service.search(host_spec(), "room b").await.unwrap();
        assert_eq!(data["count"], 1);
        assert_eq!(data["hosts"][0]["name"], "lab-01");
    }

    #[tokio::test]
    async fn should_reject_duplicate_name_case_insensitively() {
        let (repo, service) = service();
        repo.seed("host", json!({"name": "Lab-01"}));

        let err = service
            .create(host_spec(), &body(json!({"name": "lab-01"})))
            .await
            .unwrap_err();
        assert!(matches!(err, FogError::Validation(ValidationError::AlreadyCreated)));
        assert_eq!(err.to_string(), "Already created");
    }

    #[tokio::test]
    async fn should_require_required_fields() {
        let (_, service) = service();
        let err = service
            .create(spec("image").unwrap(), &body(json!({"name": "win10"})))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FogError::Validation(ValidationError::MissingRequiredField(ref field)) if field == "path"
        ));
    }

    #[tokio::test]
    async fn should_create_host_with_macs_and_skip_unknown_fields() {
        let (repo, service) = service();
        let data = service
            .create(
                host_spec(),
                &body(json!({
                    "id": 99,
                    "name": "pc-1",
                    "description": "",
                    "secret": "x",
                    "macs": ["00:11:22:33:44:55"]
                })),
            )
            .await
            .unwrap();

        assert_eq!(data["id"], 1);
        assert_eq!(data["primac"], "00:11:22:33:44:55");
        let stored = repo.all("host").remove(0);
        assert!(stored.get("secret").is_none());
        assert!(stored.get("description").is_none());
    }

    #[tokio::test]
    async fn should_not_create_host_with_invalid_mac() {
        let (repo, service) = service();
        let err = service
            .create(host_spec(), &body(json!({"name": "pc", "macs": ["bad"]})))
            .await
            .unwrap_err();
        assert!(matches!(err, FogError::Validation(ValidationError::InvalidMac(_))));
        assert!(repo.all("host").is_empty());
    }

    #[tokio::test]
    async fn should_edit_fields_and_keep_id() {
        let (repo, service) = service();
        let id = repo.seed("host", json!({"name": "pc", "description": "old"}));

        let data = service
            .edit(host_spec(), id, &body(json!({"id": 50, "description": "new"})))
            .await
            .unwrap();
        assert_eq!(data["id"], id.get());
        assert_eq!(data["description"], "new");
        assert_eq!(data["name"], "pc");
    }

    #[tokio::test]
    async fn should_reject_rename_onto_existing_name() {
        let (repo, service) = service();
        repo.seed("host", json!({"name": "taken"}));
        let id = repo.seed("host", json!({"name": "mine"}));

        let err = service
            .edit(host_spec(), id, &body(json!({"name": "TAKEN"})))
            .await
            .unwrap_err();
        assert!(matches!(err, FogError::Validation(ValidationError::AlreadyCreated)));
    }

    #[tokio::test]
    async fn should_allow_edit_keeping_own_name() {
        let (repo, service) = service();
        let id = repo.seed("host", json!({"name": "mine"}));
        service
            .edit(host_spec(), id, &body(json!({"name": "Mine"})))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn should_return_not_found_for_missing_record() {
        let (_, service) = service();
        let id = RecordId::new(7).unwrap();
        let err = service.get(host_spec(), id).await.unwrap_err();
        assert!(matches!(err, FogError::NotFound(_)));
        let err = service.delete(host_spec(), id).await.unwrap_err();
        assert!(matches!(err, FogError::NotFound(_)));
    }

    #[tokio::test]
    async fn should_delete_record_and_its_associations() {
        let (repo, service) = service();
        let host = repo.seed("host", json!({"name": "pc"}));
        let other = repo.seed("host", json!({"name": "other"}));
        repo.seed("snapinassociation", json!({"hostID": host.get(), "snapinID": 1}));
        repo.seed("macaddressassociation", json!({"hostID": host.get(), "mac": "00:11:22:33:44:55"}));
        repo.seed("snapinassociation", json!({"hostID": other.get(), "snapinID": 1}));

        service.delete(host_spec(), host).await.unwrap();

        assert!(repo.record("host", host).is_none());
        assert!(repo.all("macaddressassociation").is_empty());
        assert_eq!(repo.all("snapinassociation").len(), 1);
    }

    #[tokio::test]
    async fn should_not_hand_deleted_id_to_new_record() {
        let (repo, service) = service();
        repo.seed("host", json!({"name": "a"}));
        let b = repo.seed("host", json!({"name": "b"}));
        repo.seed("task", json!({"hostID": b.get(), "typeID": 1, "stateID": 1}));

        service.delete(host_spec(), b).await.unwrap();
        service.create(host_spec(), &body(json!({"name": "c"}))).await.unwrap();

        let c = repo
            .all("host")
            .into_iter()
            .find(|host| host.name() == "c")
            .unwrap();
        assert!(c.id > b);
        assert!(crate::lookup::active_task(&*repo, c.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_build_default_catalog_without_hooks() {
        let (_, service) = service();
        let catalog = service.catalog().await;
        assert_eq!(catalog, Catalog::default());
    }
}
