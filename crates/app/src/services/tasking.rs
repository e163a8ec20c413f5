//! Tasking service — create, list and cancel imaging / snapin tasks.

use std::sync::Arc;

use serde_json::Value;

use fog_domain::catalog::{ClassSpec, spec};
use fog_domain::error::{FogError, NotFoundError, TaskingError, ValidationError};
use fog_domain::id::RecordId;
use fog_domain::record::{Fields, Filter, Record};
use fog_domain::task::{TaskState, TaskTypeId};
use fog_domain::time::{now, to_field};
use fog_domain::value::{as_i64, as_id, is_truthy, scalar_text};

use super::presenter::Presenter;
use crate::hooks::{HookArgs, HookEvent, HookManager, keys};
use crate::lookup;
use crate::ports::RecordRepository;

const MULTICAST_PORT_SETTING: &str = "FOG_UDPCAST_STARTINGPORT";
const DEFAULT_MULTICAST_PORT: i64 = 63100;

/// Which snapins a deploy should queue afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapinSelection {
    None,
    All,
    One(RecordId),
}

impl SnapinSelection {
    /// `true` or `-1` select every snapin, a positive id one snapin.
    fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Bool(true)) => Self::All,
            Some(value) => match as_i64(value) {
                Some(-1) => Self::All,
                Some(id) => RecordId::new(id).map_or(Self::None, Self::One),
                None => Self::None,
            },
            None => Self::None,
        }
    }
}

/// Parameters of a task request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRequest {
    pub task_type: RecordId,
    pub name: Option<String>,
    pub shutdown: bool,
    pub debug: bool,
    pub snapins: SnapinSelection,
    pub passreset: Option<String>,
    pub wol: bool,
}

impl TaskRequest {
    /// Read `taskTypeID`, `taskName`, `shutdown`, `debug`, `deploySnapins`,
    /// `passreset` and `wol`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTaskType`] without a task type id.
    pub fn from_body(body: &Fields) -> Result<Self, FogError> {
        let task_type = body
            .get("taskTypeID")
            .and_then(as_id)
            .ok_or(ValidationError::InvalidTaskType)?;
        let flag = |key: &str| body.get(key).is_some_and(is_truthy);
        let text = |key: &str| {
            body.get(key)
                .and_then(scalar_text)
                .filter(|text| !text.is_empty())
        };
        Ok(Self {
            task_type,
            name: text("taskName"),
            shutdown: flag("shutdown"),
            debug: flag("debug"),
            snapins: SnapinSelection::from_value(body.get("deploySnapins")),
            passreset: text("passreset"),
            wol: flag("wol"),
        })
    }
}

/// Application service behind the task, active and cancel routes.
pub struct TaskingService<R> {
    repo: Arc<R>,
    hooks: Arc<HookManager>,
    presenter: Presenter<R>,
}

impl<R: RecordRepository + Send + Sync> TaskingService<R> {
    pub fn new(repo: Arc<R>, hooks: Arc<HookManager>) -> Self {
        Self {
            presenter: Presenter::new(Arc::clone(&repo), Arc::clone(&hooks)),
            repo,
            hooks,
        }
    }

    /// Queue a task for a host, or for every idle member of a group.
    ///
    /// Returns the created tasks as a collection.
    ///
    /// # Errors
    ///
    /// - [`TaskingError::Unsupported`] for classes other than host and group
    /// - [`FogError::NotFound`] when the host or group does not exist
    /// - [`ValidationError::InvalidTaskType`] for an unknown task type
    /// - [`TaskingError::ActiveTaskExists`] when the host is already tasked
    /// - [`TaskingError::NoImage`] when an imaging task lacks an image
    pub async fn task(
        &self,
        target: &ClassSpec,
        id: RecordId,
        body: &Fields,
        created_by: &str,
    ) -> Result<Value, FogError> {
        if target.name != "host" && target.name != "group" {
            return Err(TaskingError::Unsupported(target.name.to_string()).into());
        }
        let record = self
            .repo
            .get(target.name, id)
            .await?
            .ok_or_else(|| NotFoundError::new(target.name, id))?;
        let request = TaskRequest::from_body(body)?;
        let task_type = self
            .repo
            .get("tasktype", request.task_type)
            .await?
            .ok_or(ValidationError::InvalidTaskType)?;
        let type_id = TaskTypeId(task_type.id.get());

        let hosts = if target.name == "group" {
            let members =
                lookup::linked_ids(&*self.repo, "groupassociation", "groupID", id, "hostID").await?;
            let mut idle = Vec::new();
            for host in lookup::by_ids(&*self.repo, "host", &members).await? {
                if lookup::active_task(&*self.repo, host.id).await?.is_some() {
                    tracing::info!(host = %host.id, "skipping host with an active task");
                    continue;
                }
                idle.push(host);
            }
            idle
        } else {
            if lookup::active_task(&*self.repo, record.id).await?.is_some() {
                return Err(TaskingError::ActiveTaskExists {
                    host: record.name().to_string(),
                }
                .into());
            }
            vec![record]
        };

        if type_id.is_imaging() {
            for host in &hosts {
                if self.host_image(host).await?.is_none() {
                    return Err(TaskingError::NoImage {
                        host: host.name().to_string(),
                    }
                    .into());
                }
            }
        }

        let mut tasks = Vec::with_capacity(hosts.len());
        for host in &hosts {
            tasks.push(
                self.create_task(host, &task_type, &request, created_by)
                    .await?,
            );
        }
        if type_id.is_multicast() && !tasks.is_empty() {
            self.create_session(&tasks, &request, &task_type).await?;
        }
        tracing::info!(class = target.name, %id, task_type = type_id.0, count = tasks.len(), "tasks created");

        let task_spec = spec("task").ok_or_else(|| ValidationError::UnknownClass("task".to_string()))?;
        self.presenter.collection(task_spec, &tasks, Fields::new()).await
    }

    async fn host_image(&self, host: &Record) -> Result<Option<Record>, FogError> {
        match host.reference("imageID") {
            Some(image) => self.repo.get("image", image).await,
            None => Ok(None),
        }
    }

    /// Storage group and node for an imaging task, as adjusted by hooks.
    async fn placement(
        &self,
        host: &Record,
        task_type: &Record,
        image: &Record,
    ) -> Result<(Option<Record>, Option<Record>), FogError> {
        let links = self
            .repo
            .find("imageassociation", &Filter::new().equals("imageID", image.id.get()))
            .await?;
        let group_id = links
            .iter()
            .find(|link| link.flag("primary"))
            .or_else(|| links.first())
            .and_then(|link| link.reference("storagegroupID"));
        let group = match group_id {
            Some(group) => self.repo.get("storagegroup", group).await?,
            None => None,
        };
        let node = match &group {
            Some(group) => lookup::master_node(&*self.repo, group.id).await?,
            None => None,
        };

        let mut args = HookArgs::new()
            .with(keys::HOST, host.clone())
            .with(keys::TASK_TYPE, task_type.clone());
        if let Some(group) = group {
            args.insert(keys::STORAGE_GROUP, group);
        }
        if let Some(node) = node {
            args.insert(keys::STORAGE_NODE, node);
        }
        self.hooks
            .process_event(HookEvent::HostNewSettings, &mut args)
            .await;
        Ok((
            args.take_record(keys::STORAGE_GROUP),
            args.take_record(keys::STORAGE_NODE),
        ))
    }

    async fn create_task(
        &self,
        host: &Record,
        task_type: &Record,
        request: &TaskRequest,
        created_by: &str,
    ) -> Result<Record, FogError> {
        let type_id = TaskTypeId(task_type.id.get());
        let created = to_field(now());
        let mut fields = Fields::new();
        let name = request
            .name
            .clone()
            .unwrap_or_else(|| format!("{} Task", task_type.name()));
        fields.insert("name".into(), Value::from(name));
        fields.insert("hostID".into(), Value::from(host.id.get()));
        fields.insert("typeID".into(), Value::from(type_id.0));
        fields.insert("stateID".into(), Value::from(TaskState::Queued.id()));
        fields.insert("createdTime".into(), Value::from(created.clone()));
        fields.insert("createdBy".into(), Value::from(created_by));
        fields.insert("isForced".into(), Value::from(0));
        fields.insert("shutdown".into(), Value::from(i64::from(request.shutdown)));
        fields.insert("isDebug".into(), Value::from(i64::from(request.debug)));
        fields.insert("wol".into(), Value::from(i64::from(request.wol)));
        fields.insert("NFSFailures".into(), Value::from(0));
        if let Some(passreset) = &request.passreset {
            fields.insert("passreset".into(), Value::from(passreset.as_str()));
        }

        if type_id.is_imaging()
            && let Some(image) = self.host_image(host).await?
        {
            fields.insert("imageID".into(), Value::from(image.id.get()));
            let (group, node) = self.placement(host, task_type, &image).await?;
            if let Some(group) = group {
                fields.insert("NFSGroupID".into(), Value::from(group.id.get()));
            }
            if let Some(node) = node {
                fields.insert("NFSMemberID".into(), Value::from(node.id.get()));
            }
        }
        let task = self.repo.insert("task", fields).await?;

        let selection = if type_id == TaskTypeId::ALL_SNAPINS {
            SnapinSelection::All
        } else if [TaskTypeId::SINGLE_SNAPIN, TaskTypeId::DEPLOY, TaskTypeId::DEPLOY_DEBUG]
            .contains(&type_id)
        {
            request.snapins
        } else {
            SnapinSelection::None
        };
        self.queue_snapins(host, selection, &created).await?;
        Ok(task)
    }

    /// Create a snapin job for the host with one snapin task per snapin.
    async fn queue_snapins(
        &self,
        host: &Record,
        selection: SnapinSelection,
        created: &str,
    ) -> Result<(), FogError> {
        let snapins = match selection {
            SnapinSelection::None => return Ok(()),
            SnapinSelection::All => {
                lookup::linked_ids(&*self.repo, "snapinassociation", "hostID", host.id, "snapinID")
                    .await?
            }
            SnapinSelection::One(snapin) => vec![snapin],
        };
        let snapins = lookup::by_ids(&*self.repo, "snapin", &snapins).await?;
        if snapins.is_empty() {
            return Ok(());
        }
        let mut job = Fields::new();
        job.insert("hostID".into(), Value::from(host.id.get()));
        job.insert("stateID".into(), Value::from(TaskState::Queued.id()));
        job.insert("createdTime".into(), Value::from(created));
        let job = self.repo.insert("snapinjob", job).await?;
        for snapin in &snapins {
            let mut task = Fields::new();
            task.insert("jobID".into(), Value::from(job.id.get()));
            task.insert("snapinID".into(), Value::from(snapin.id.get()));
            task.insert("stateID".into(), Value::from(TaskState::Queued.id()));
            self.repo.insert("snapintask", task).await?;
        }
        tracing::debug!(host = %host.id, job = %job.id, count = snapins.len(), "snapins queued");
        Ok(())
    }

    async fn create_session(
        &self,
        tasks: &[Record],
        request: &TaskRequest,
        task_type: &Record,
    ) -> Result<Record, FogError> {
        let port = lookup::setting(&*self.repo, MULTICAST_PORT_SETTING)
            .await?
            .and_then(|port| port.trim().parse::<i64>().ok())
            .unwrap_or(DEFAULT_MULTICAST_PORT);
        let Some(first) = tasks.first() else {
            return Err(TaskingError::Unsupported("empty multicast session".to_string()).into());
        };
        let mut fields = Fields::new();
        let name = request
            .name
            .clone()
            .unwrap_or_else(|| format!("{} Task", task_type.name()));
        fields.insert("name".into(), Value::from(name));
        fields.insert("port".into(), Value::from(port));
        fields.insert("stateID".into(), Value::from(TaskState::Queued.id()));
        fields.insert("clients".into(), Value::from(tasks.len()));
        fields.insert("sessclients".into(), Value::from(tasks.len()));
        fields.insert("starttime".into(), Value::from(to_field(now())));
        for key in ["imageID", "NFSGroupID"] {
            if let Some(value) = first.get(key) {
                let target = if key == "NFSGroupID" { "storagegroupID" } else { key };
                fields.insert(target.into(), value.clone());
            }
        }
        let session = self.repo.insert("multicastsession", fields).await?;
        for task in tasks {
            let mut assoc = Fields::new();
            assoc.insert("msID".into(), Value::from(session.id.get()));
            assoc.insert("taskID".into(), Value::from(task.id.get()));
            self.repo.insert("multicastsessionassociation", assoc).await?;
        }
        tracing::info!(session = %session.id, port, clients = tasks.len(), "multicast session created");
        Ok(session)
    }

    /// Records of an active-task class in an active state, narrowed by `body`.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn active(&self, target: &ClassSpec, body: &Fields) -> Result<Value, FogError> {
        let filter = active_filter(target, Filter::from_fields(body, target.fields));
        let records = self.repo.find(target.name, &filter).await?;
        self.presenter.collection(target, &records, Fields::new()).await
    }

    /// Cancel active work.
    ///
    /// Groups cancel every member's active task, hosts their own. Other
    /// classes cancel the record itself when active or, without a valid
    /// id, every active record matching `body`.
    ///
    /// # Errors
    ///
    /// Returns [`FogError::NotFound`] for a missing host or group, or a
    /// storage error.
    pub async fn cancel(
        &self,
        target: &ClassSpec,
        id: Option<RecordId>,
        body: &Fields,
    ) -> Result<(), FogError> {
        let existing = match id {
            Some(id) => self.repo.get(target.name, id).await?,
            None => None,
        };
        match target.name {
            "group" | "host" => {
                let Some(record) = existing else {
                    let id = id.map_or_else(String::new, |id| id.to_string());
                    return Err(NotFoundError::new(target.name, id).into());
                };
                let hosts = if target.name == "group" {
                    let members =
                        lookup::linked_ids(&*self.repo, "groupassociation", "groupID", record.id, "hostID")
                            .await?;
                    lookup::by_ids(&*self.repo, "host", &members)
                        .await?
                        .into_iter()
                        .map(|host| host.id)
                        .collect()
                } else {
                    vec![record.id]
                };
                for host in hosts {
                    if let Some(task) = lookup::active_task(&*self.repo, host).await? {
                        self.cancel_record(task).await?;
                    }
                }
            }
            _ => match existing {
                Some(record) => {
                    if is_active(&record) {
                        self.cancel_record(record).await?;
                    }
                }
                None => {
                    let filter = active_filter(target, Filter::from_fields(body, target.fields));
                    for record in self.repo.find(target.name, &filter).await? {
                        self.cancel_record(record).await?;
                    }
                }
            },
        }
        Ok(())
    }

    async fn cancel_record(&self, mut record: Record) -> Result<(), FogError> {
        if record.class == "scheduledtask" {
            record.set("isActive", 0);
        } else {
            record.set("stateID", TaskState::Cancelled.id());
        }
        tracing::info!(class = %record.class, id = %record.id, "cancelled");
        self.repo.update(record).await?;
        Ok(())
    }
}

fn active_filter(target: &ClassSpec, filter: Filter) -> Filter {
    if target.name == "scheduledtask" {
        filter.equals("isActive", 1)
    } else {
        filter.any_of("stateID", TaskState::active_values())
    }
}

fn is_active(record: &Record) -> bool {
    if record.class == "scheduledtask" {
        record.flag("isActive")
    } else {
        record.get("stateID").is_some_and(TaskState::is_active_value)
    }
}
