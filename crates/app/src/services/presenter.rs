//! Shapes records into API payloads.
//!
//! Every class renders as its fields plus some computed, related data
//! (a host's MACs and image, a task's host and state, …). Related records
//! are embedded one level deep only.

use std::sync::Arc;

use chrono::DateTime;
use serde_json::{Map, Value};

use fog_domain::catalog::ClassSpec;
use fog_domain::error::FogError;
use fog_domain::id::RecordId;
use fog_domain::record::{Fields, Filter, Record};
use fog_domain::task::TaskTypeId;
use fog_domain::time::FIELD_FORMAT;

use crate::hooks::{HookArgs, HookEvent, HookManager, HookValue, keys};
use crate::lookup;
use crate::ports::RecordRepository;

/// Renders records, firing the payload hooks on the way out.
pub struct Presenter<R> {
    repo: Arc<R>,
    hooks: Arc<HookManager>,
}

impl<R: RecordRepository + Send + Sync> Presenter<R> {
    pub fn new(repo: Arc<R>, hooks: Arc<HookManager>) -> Self {
        Self { repo, hooks }
    }

    /// Payload of a single record, as returned by fetch-one, create and edit.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn one(&self, record: &Record) -> Result<Value, FogError> {
        let data = self.shape(record).await?;
        let args = HookArgs::new()
            .with(keys::DATA, data)
            .with(keys::CLASSNAME, record.class.as_str())
            .with(keys::RECORD, record.clone());
        Ok(self.fire(HookEvent::ApiIndivdataMapping, args).await)
    }

    /// `{"count": n, "<class>s": [...]}` plus any `extra` counters.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn collection(
        &self,
        spec: &ClassSpec,
        records: &[Record],
        extra: Fields,
    ) -> Result<Value, FogError> {
        let mut items = Vec::with_capacity(records.len());
        for record in records {
            items.push(self.shape(record).await?);
        }
        let mut data = Map::new();
        data.insert("count".to_string(), Value::from(items.len()));
        data.insert(spec.plural(), Value::Array(items));
        data.extend(extra);
        let args = HookArgs::new()
            .with(keys::DATA, Value::Object(data))
            .with(keys::CLASSNAME, spec.name);
        Ok(self.fire(HookEvent::ApiMassdataMapping, args).await)
    }

    /// Fields plus per-class computed data, passed through `ApiGetter`.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn shape(&self, record: &Record) -> Result<Value, FogError> {
        let mut data = record_map(record);
        match record.class.as_str() {
            "host" => self.host_data(record, &mut data).await?,
            "inventory" => inventory_data(record, &mut data),
            "group" => self.group_data(record, &mut data).await?,
            "image" => self.image_data(record, &mut data).await?,
            "snapin" => {
                let group = self
                    .primary_link("snapingroupassociation", "snapinID", record.id, "storagegroup")
                    .await?;
                data.insert("storagegroupname".into(), Value::from(name_of(group.as_ref())));
            }
            "storagenode" => {
                let group = self.related("storagegroup", record.reference("storagegroupID")).await?;
                data.insert("storagegroup".into(), json_of(group.as_ref()));
            }
            "storagegroup" => self.storage_group_data(record, &mut data).await?,
            "task" => self.task_data(record, &mut data).await?,
            "imaginglog" | "usertracking" => {
                let host = self.related("host", record.reference("hostID")).await?;
                data.insert("host".into(), self.host_view(host.as_ref()).await?);
            }
            "snapintask" => {
                let snapin = self.related("snapin", record.reference("snapinID")).await?;
                let job = match self.related("snapinjob", record.reference("jobID")).await? {
                    Some(job) => {
                        let mut job_data = record_map(&job);
                        self.snapin_job_data(&job, &mut job_data).await?;
                        Value::Object(job_data)
                    }
                    None => empty(),
                };
                data.insert("snapin".into(), json_of(snapin.as_ref()));
                data.insert("snapinjob".into(), job);
                data.insert("state".into(), self.state(record).await?);
            }
            "snapinjob" => self.snapin_job_data(record, &mut data).await?,
            "multicastsession" => {
                let image = self.related("image", record.reference("imageID")).await?;
                data.insert("image".into(), json_of(image.as_ref()));
                data.insert("state".into(), self.state(record).await?);
            }
            "scheduledtask" => self.scheduled_task_data(record, &mut data).await?,
            "tasktype" => {
                let snapin = TaskTypeId(record.id.get()).is_snapin_tasking();
                data.insert("isSnapinTasking".into(), Value::from(snapin));
            }
            _ => {}
        }
        let args = HookArgs::new()
            .with(keys::DATA, Value::Object(data))
            .with(keys::CLASSNAME, record.class.as_str())
            .with(keys::RECORD, record.clone());
        Ok(self.fire(HookEvent::ApiGetter, args).await)
    }

    async fn fire(&self, event: HookEvent, mut args: HookArgs) -> Value {
        self.hooks.process_event(event, &mut args).await;
        match args.into_value(keys::DATA) {
            Some(HookValue::Json(data)) => data,
            _ => Value::Null,
        }
    }

    async fn related(&self, class: &str, id: Option<RecordId>) -> Result<Option<Record>, FogError> {
        match id {
            Some(id) => self.repo.get(class, id).await,
            None => Ok(None),
        }
    }

    /// The primary record linked through an association class, else the first.
    async fn primary_link(
        &self,
        assoc: &str,
        key: &str,
        id: RecordId,
        target: &str,
    ) -> Result<Option<Record>, FogError> {
        let links = self
            .repo
            .find(assoc, &Filter::new().equals(key, id.get()))
            .await?;
        let link = links
            .iter()
            .find(|link| link.flag("primary"))
            .or_else(|| links.first());
        let target_key = format!("{target}ID");
        self.related(target, link.and_then(|link| link.reference(&target_key)))
            .await
    }

    async fn state(&self, record: &Record) -> Result<Value, FogError> {
        let state = self.related("taskstate", record.reference("stateID")).await?;
        Ok(json_of(state.as_ref()))
    }

    /// A host embedded in another payload.
    async fn host_view(&self, host: Option<&Record>) -> Result<Value, FogError> {
        let Some(host) = host else {
            return Ok(empty());
        };
        let mut data = record_map(host);
        self.host_data(host, &mut data).await?;
        Ok(Value::Object(data))
    }

    async fn host_data(&self, host: &Record, data: &mut Fields) -> Result<(), FogError> {
        let macs = self
            .repo
            .find("macaddressassociation", &Filter::new().equals("hostID", host.id.get()))
            .await?;
        let primac = macs
            .iter()
            .find(|mac| mac.flag("primary"))
            .or_else(|| macs.first())
            .map(|mac| mac.text("mac"))
            .unwrap_or_default();
        let image = self.related("image", host.reference("imageID")).await?;
        let screen = self.first_of("hostscreensetting", host.id).await?;
        let logout = self.first_of("hostautologout", host.id).await?;
        let inventory = match self.first_of("inventory", host.id).await? {
            Some(inventory) => {
                let mut inventory_map = record_map(&inventory);
                inventory_data(&inventory, &mut inventory_map);
                Value::Object(inventory_map)
            }
            None => empty(),
        };
        data.insert("primac".into(), Value::from(primac));
        data.insert(
            "macs".into(),
            macs.iter().map(|mac| Value::from(mac.text("mac"))).collect(),
        );
        data.insert("imagename".into(), Value::from(name_of(image.as_ref())));
        data.insert("image".into(), json_of(image.as_ref()));
        data.insert("hostscreen".into(), json_of(screen.as_ref()));
        data.insert("hostalo".into(), json_of(logout.as_ref()));
        data.insert("inventory".into(), inventory);
        Ok(())
    }

    async fn first_of(&self, class: &str, host: RecordId) -> Result<Option<Record>, FogError> {
        let found = self
            .repo
            .find(class, &Filter::new().equals("hostID", host.get()))
            .await?;
        Ok(found.into_iter().next())
    }

    async fn group_data(&self, group: &Record, data: &mut Fields) -> Result<(), FogError> {
        let members =
            lookup::linked_ids(&*self.repo, "groupassociation", "groupID", group.id, "hostID")
                .await?;
        data.insert("hostcount".into(), Value::from(members.len()));
        Ok(())
    }

    async fn image_data(&self, image: &Record, data: &mut Fields) -> Result<(), FogError> {
        let os = self.related("os", image.reference("osID")).await?;
        let part = self
            .related("imagepartitiontype", image.reference("imagePartitionTypeID"))
            .await?;
        let kind = self.related("imagetype", image.reference("imageTypeID")).await?;
        let group = self
            .primary_link("imageassociation", "imageID", image.id, "storagegroup")
            .await?;
        data.insert("os".into(), json_of(os.as_ref()));
        data.insert("imagepartitiontype".into(), json_of(part.as_ref()));
        data.insert("imagetype".into(), json_of(kind.as_ref()));
        data.insert("imagetypename".into(), Value::from(name_of(kind.as_ref())));
        data.insert("imageparttypename".into(), Value::from(name_of(part.as_ref())));
        data.insert("osname".into(), Value::from(name_of(os.as_ref())));
        data.insert("storagegroupname".into(), Value::from(name_of(group.as_ref())));
        Ok(())
    }

    async fn storage_group_data(&self, group: &Record, data: &mut Fields) -> Result<(), FogError> {
        let nodes = lookup::enabled_nodes(&*self.repo, group.id).await?;
        let clients: i64 = nodes.iter().filter_map(|node| node.int("maxClients")).sum();
        let master = lookup::master_node(&*self.repo, group.id).await?;
        data.insert("totalsupportedclients".into(), Value::from(clients));
        data.insert("masternode".into(), json_of(master.as_ref()));
        data.insert(
            "enablednodes".into(),
            nodes.iter().map(|node| Value::from(node.id.get())).collect(),
        );
        Ok(())
    }

    async fn task_data(&self, task: &Record, data: &mut Fields) -> Result<(), FogError> {
        let image = self.related("image", task.reference("imageID")).await?;
        let host = self.related("host", task.reference("hostID")).await?;
        let kind = self.related("tasktype", task.reference("typeID")).await?;
        let node = self.related("storagenode", task.reference("NFSMemberID")).await?;
        let group = self.related("storagegroup", task.reference("NFSGroupID")).await?;
        data.insert("image".into(), json_of(image.as_ref()));
        data.insert("host".into(), self.host_view(host.as_ref()).await?);
        data.insert("type".into(), json_of(kind.as_ref()));
        data.insert("state".into(), self.state(task).await?);
        data.insert("storagenode".into(), json_of(node.as_ref()));
        data.insert("storagegroup".into(), json_of(group.as_ref()));
        Ok(())
    }

    async fn snapin_job_data(&self, job: &Record, data: &mut Fields) -> Result<(), FogError> {
        let host = self.related("host", job.reference("hostID")).await?;
        data.insert("host".into(), self.host_view(host.as_ref()).await?);
        data.insert("state".into(), self.state(job).await?);
        Ok(())
    }

    async fn scheduled_task_data(&self, task: &Record, data: &mut Fields) -> Result<(), FogError> {
        if task.flag("isGroupTask") {
            let group = self.related("group", task.reference("hostID")).await?;
            let view = match group {
                Some(group) => {
                    let mut group_data = record_map(&group);
                    self.group_data(&group, &mut group_data).await?;
                    Value::Object(group_data)
                }
                None => empty(),
            };
            data.insert("group".into(), view);
        } else {
            let host = self.related("host", task.reference("hostID")).await?;
            data.insert("host".into(), self.host_view(host.as_ref()).await?);
        }
        let kind = self.related("tasktype", task.reference("taskType")).await?;
        data.insert("tasktype".into(), json_of(kind.as_ref()));
        data.insert("runtime".into(), Value::from(runtime(task)));
        Ok(())
    }
}

fn record_map(record: &Record) -> Fields {
    match record.to_json() {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

fn empty() -> Value {
    Value::Object(Map::new())
}

fn json_of(record: Option<&Record>) -> Value {
    record.map_or_else(empty, Record::to_json)
}

fn name_of(record: Option<&Record>) -> &str {
    record.map_or("", Record::name)
}

/// Adds `memory`, the `mem` reading (in kB) rendered human-readable.
fn inventory_data(inventory: &Record, data: &mut Fields) {
    let kib = inventory
        .text("mem")
        .split_whitespace()
        .find_map(|token| token.parse::<u64>().ok())
        .unwrap_or(0);
    data.insert("memory".into(), Value::from(format_bytes(kib.saturating_mul(1024))));
}

#[allow(clippy::cast_precision_loss)]
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.2} {}", UNITS[unit])
}

/// When a scheduled task runs: its cron line, or its single run time.
fn runtime(task: &Record) -> String {
    if task.text("type").eq_ignore_ascii_case("C") {
        return ["minute", "hour", "dayOfMonth", "month", "dayOfWeek"]
            .iter()
            .map(|key| task.text(key))
            .collect::<Vec<_>>()
            .join(" ");
    }
    task.int("scheduleTime")
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|ts| ts.format(FIELD_FORMAT).to_string())
        .unwrap_or_default()
}
