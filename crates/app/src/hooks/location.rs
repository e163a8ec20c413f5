//! Location plugin hook.
//!
//! Hosts can be associated with locations, and each location points at a
//! storage group (and optionally a preferred node). When the `location`
//! plugin is installed this hook steers storage placement towards the
//! host's location for tasking, booting and snapin delivery, and promotes
//! location nodes to masters for multicast.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use fog_domain::error::FogError;
use fog_domain::id::RecordId;
use fog_domain::record::{Filter, Record};
use fog_domain::task::TaskTypeId;

use super::{HookArgs, HookEvent, HookFuture, HookManager, Method, keys};
use crate::lookup;
use crate::ports::RecordRepository;
use crate::services::settings::SNAPIN_LOCATION_SEND_ENABLED;

const PLUGIN: &str = "location";
const DEFAULT_WEBROOT: &str = "/fog/";

/// Location-aware storage selection.
pub struct LocationHook<R> {
    repo: Arc<R>,
}

impl<R> LocationHook<R>
where
    R: RecordRepository + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Register every callback with `hooks`.
    pub fn register(self: Arc<Self>, hooks: &mut HookManager) {
        let bind = |method: for<'a> fn(&'a Self, &'a mut HookArgs) -> HookFuture<'a>| {
            Method::new(Arc::clone(&self), method)
        };
        hooks.register(HookEvent::SnapinNode, "location.storage_node", bind(Self::storage_node_setting));
        hooks.register(HookEvent::SnapinGroup, "location.storage_group", bind(Self::storage_group_setting));
        hooks.register(HookEvent::BootItemNewSettings, "location.boot_item", bind(Self::boot_item_settings));
        hooks.register(HookEvent::BootTaskNewSettings, "location.storage_group", bind(Self::storage_group_setting));
        hooks.register(HookEvent::HostNewSettings, "location.storage_node", bind(Self::storage_node_setting));
        hooks.register(HookEvent::HostNewSettings, "location.storage_group", bind(Self::storage_group_setting));
        hooks.register(HookEvent::BootTaskNewSettings, "location.storage_node", bind(Self::storage_node_setting));
        hooks.register(HookEvent::CheckNodeMasters, "location.alter_masters", bind(Self::alter_masters));
        hooks.register(HookEvent::CheckNodeMaster, "location.make_master", bind(Self::make_master));
        hooks.register(HookEvent::ApiValidClasses, "location.classes", bind(Self::add_classes));
        hooks.register(HookEvent::ApiGetter, "location.getter", bind(Self::attach_location));
    }

    pub fn storage_node_setting<'a>(&'a self, args: &'a mut HookArgs) -> HookFuture<'a> {
        guarded("storage_node", self.storage_node(args))
    }

    pub fn storage_group_setting<'a>(&'a self, args: &'a mut HookArgs) -> HookFuture<'a> {
        guarded("storage_group", self.storage_group(args))
    }

    pub fn boot_item_settings<'a>(&'a self, args: &'a mut HookArgs) -> HookFuture<'a> {
        guarded("boot_item", self.boot_item(args))
    }

    pub fn alter_masters<'a>(&'a self, args: &'a mut HookArgs) -> HookFuture<'a> {
        guarded("alter_masters", self.masters(args))
    }

    pub fn make_master<'a>(&'a self, args: &'a mut HookArgs) -> HookFuture<'a> {
        guarded("make_master", self.master(args))
    }

    pub fn add_classes<'a>(&'a self, args: &'a mut HookArgs) -> HookFuture<'a> {
        guarded("classes", self.classes(args))
    }

    pub fn attach_location<'a>(&'a self, args: &'a mut HookArgs) -> HookFuture<'a> {
        guarded("getter", self.getter(args))
    }

    async fn enabled(&self) -> Result<bool, FogError> {
        lookup::plugin_installed(&*self.repo, PLUGIN).await
    }

    /// The host in `args` and its locations; `None` when there is nothing to do.
    async fn host_locations(&self, args: &HookArgs) -> Result<Option<Vec<Record>>, FogError> {
        if !self.enabled().await? {
            return Ok(None);
        }
        let Some(host) = args.record(keys::HOST) else {
            return Ok(None);
        };
        if self.repo.get("host", host.id).await?.is_none() {
            tracing::debug!(host = %host.id, "host no longer exists");
            return Ok(None);
        }
        Ok(Some(lookup::host_locations(&*self.repo, host.id).await?))
    }

    /// Capture and multicast jobs must go to a group's master node.
    async fn needs_master(&self, args: &HookArgs) -> Result<bool, FogError> {
        if let Some(host) = args.record(keys::HOST) {
            let task = lookup::active_task(&*self.repo, host.id).await?;
            if let Some(type_id) = task.and_then(|task| task.int("typeID"))
                && TaskTypeId(type_id).needs_master()
            {
                return Ok(true);
            }
        }
        Ok(args
            .record(keys::TASK_TYPE)
            .is_some_and(|task_type| TaskTypeId(task_type.id.get()).needs_master()))
    }

    /// Whether location nodes may serve this request.
    async fn sends_from_location(&self, args: &HookArgs) -> Result<bool, FogError> {
        if !args.contains(keys::SNAPIN) {
            return Ok(true);
        }
        if args.flag(keys::SNAPIN) != Some(true) {
            return Ok(false);
        }
        let value = lookup::setting(&*self.repo, SNAPIN_LOCATION_SEND_ENABLED).await?;
        Ok(value
            .and_then(|value| value.trim().parse::<i64>().ok())
            .is_some_and(|value| value > 0))
    }

    async fn storage_node(&self, args: &mut HookArgs) -> Result<(), FogError> {
        let Some(locations) = self.host_locations(args).await? else {
            return Ok(());
        };
        if locations.is_empty() {
            return Ok(());
        }
        let needs_master = self.needs_master(args).await?;
        let from_location = self.sends_from_location(args).await?;
        for location in &locations {
            let Some(group) = self.storage_group_of(location).await? else {
                continue;
            };
            if from_location
                && let Some(node) = lookup::location_node(&*self.repo, location).await?
            {
                tracing::debug!(location = %location.id, node = %node.id, "using location node");
                args.insert(keys::STORAGE_NODE, node);
            }
            if needs_master
                && let Some(master) = lookup::master_node(&*self.repo, group.id).await?
            {
                tracing::debug!(location = %location.id, node = %master.id, "using location master node");
                args.insert(keys::STORAGE_NODE, master);
            }
        }
        Ok(())
    }

    async fn storage_group(&self, args: &mut HookArgs) -> Result<(), FogError> {
        let Some(locations) = self.host_locations(args).await? else {
            return Ok(());
        };
        for location in &locations {
            if let Some(group) = self.storage_group_of(location).await? {
                tracing::debug!(location = %location.id, group = %group.id, "using location storage group");
                args.insert(keys::STORAGE_GROUP, group);
            }
        }
        Ok(())
    }

    async fn storage_group_of(&self, location: &Record) -> Result<Option<Record>, FogError> {
        match location.reference("storagegroupID") {
            Some(group) => self.repo.get("storagegroup", group).await,
            None => Ok(None),
        }
    }

    async fn boot_item(&self, args: &mut HookArgs) -> Result<(), FogError> {
        let Some(locations) = self.host_locations(args).await? else {
            return Ok(());
        };
        for location in locations.iter().filter(|location| location.flag("tftp")) {
            let Some(node) = lookup::location_node(&*self.repo, location).await? else {
                continue;
            };
            let ip = node.text("ip");
            let webroot = normalize_webroot(&node.text("webroot"));
            let url = |file: &str| format!("http://{ip}{webroot}service/ipxe/{file}");
            let file = |key: &str| args.text(key).unwrap_or_default().to_string();
            let (memdisk, memtest, bz_image, initrd) = (
                file(keys::MEMDISK),
                file(keys::MEMTEST),
                file(keys::BZIMAGE),
                file(keys::INITRD),
            );
            args.insert(keys::WEBSERVER, ip.clone());
            args.insert(keys::WEBROOT, webroot.clone());
            args.insert(keys::MEMDISK, url(&memdisk));
            args.insert(keys::MEMTEST, url(&memtest));
            args.insert(keys::BZIMAGE, url(&bz_image));
            args.insert(keys::IMAGEFILE, url(&initrd));
            tracing::debug!(location = %location.id, %ip, "boot files served from location node");
        }
        Ok(())
    }

    async fn masters(&self, args: &mut HookArgs) -> Result<(), FogError> {
        if !self.enabled().await? || args.text(keys::SERVICE_CLASS) != Some("MulticastManager") {
            return Ok(());
        }
        let locations = self
            .repo
            .find("location", &Filter::new())
            .await?;
        let mut ids: Vec<RecordId> = locations
            .iter()
            .filter_map(|location| location.reference("storagenodeID"))
            .collect();
        for id in args.ids(keys::MASTER_IDS) {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        let mut nodes = lookup::by_ids(&*self.repo, "storagenode", &ids).await?;
        for node in &mut nodes {
            if !node.flag("isMaster") {
                node.set("isMaster", 1);
            }
        }
        tracing::debug!(count = nodes.len(), "multicast masters altered");
        args.insert(keys::STORAGE_NODES, nodes);
        Ok(())
    }

    async fn master(&self, args: &mut HookArgs) -> Result<(), FogError> {
        if !self.enabled().await? || args.text(keys::SERVICE_CLASS) != Some("MulticastTask") {
            return Ok(());
        }
        if let Some(node) = args.record_mut(keys::STORAGE_NODE) {
            node.set("isMaster", 1);
        }
        Ok(())
    }

    async fn classes(&self, args: &mut HookArgs) -> Result<(), FogError> {
        if !self.enabled().await? {
            return Ok(());
        }
        if let Some(names) = args.names_mut(keys::VALID_CLASSES) {
            for class in ["location", "locationassociation"] {
                if !names.iter().any(|name| name == class) {
                    names.push(class.to_string());
                }
            }
        }
        Ok(())
    }

    /// Adds the host's first location to a shaped host payload.
    async fn getter(&self, args: &mut HookArgs) -> Result<(), FogError> {
        if args.text(keys::CLASSNAME) != Some("host") || !self.enabled().await? {
            return Ok(());
        }
        let Some(host) = args.record(keys::RECORD).map(|host| host.id) else {
            return Ok(());
        };
        let location = lookup::host_locations(&*self.repo, host)
            .await?
            .into_iter()
            .next();
        if let Some(Value::Object(data)) = args.json_mut(keys::DATA) {
            let value = location.map_or(Value::Null, |location| location.to_json());
            data.insert("location".to_string(), value);
        }
        Ok(())
    }
}

fn normalize_webroot(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return DEFAULT_WEBROOT.to_string();
    }
    format!("/{trimmed}/")
}

fn guarded<'a>(
    callback: &'static str,
    work: impl Future<Output = Result<(), FogError>> + Send + 'a,
) -> HookFuture<'a> {
    Box::pin(async move {
        if let Err(err) = work.await {
            tracing::warn!(hook = "location", callback, error = %err, "hook skipped");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::HookValue;
    use crate::testing::InMemoryRecords;
    use fog_domain::record::Fields;
    use serde_json::json;

    struct Fixture {
        repo: Arc<InMemoryRecords>,
        hooks: HookManager,
        host: Record,
    }

    /// A host at a location whose group has a plain node and a master node.
    fn fixture() -> Fixture {
        let repo = Arc::new(InMemoryRecords::default());
        repo.install_plugin("location");
        let group = repo.seed("storagegroup", json!({"name": "branch"}));
        repo.seed("storagenode", json!({"name": "branch-master", "ip": "10.0.0.1", "storagegroupID": group.get(), "isEnabled": 1, "isMaster": 1}));
        let node = repo.seed("storagenode", json!({"name": "branch-near", "ip": "10.0.0.2", "webroot": "fog", "storagegroupID": group.get(), "isEnabled": 1}));
        let location = repo.seed("location", json!({"name": "branch", "storagegroupID": group.get(), "storagenodeID": node.get(), "tftp": 1}));
        let host = repo.seed("host", json!({"name": "pc-1"}));
        repo.seed("locationassociation", json!({"locationID": location.get(), "hostID": host.get()}));
        let host = repo.record("host", host).unwrap();

        let mut hooks = HookManager::new();
        Arc::new(LocationHook::new(Arc::clone(&repo))).register(&mut hooks);
        Fixture { repo, hooks, host }
    }

    fn task_type(id: TaskTypeId) -> Record {
        Record::new("tasktype", RecordId::new(id.0).unwrap(), Fields::new())
    }

    #[test]
    fn should_register_callbacks_in_order() {
        let f = fixture();
        assert_eq!(
            f.hooks.handlers(HookEvent::HostNewSettings),
            vec!["location.storage_node", "location.storage_group"]
        );
        assert_eq!(
            f.hooks.handlers(HookEvent::BootTaskNewSettings),
            vec!["location.storage_group", "location.storage_node"]
        );
    }

    #[tokio::test]
    async fn should_set_location_node_and_group_for_host() {
        let f = fixture();
        let mut args = HookArgs::new().with(keys::HOST, f.host.clone());
        f.hooks
            .process_event(HookEvent::HostNewSettings, &mut args)
            .await;
        assert_eq!(args.record(keys::STORAGE_NODE).unwrap().name(), "branch-near");
        assert_eq!(args.record(keys::STORAGE_GROUP).unwrap().name(), "branch");
    }

    #[tokio::test]
    async fn should_use_master_for_capture_task_type() {
        let f = fixture();
        let capture = task_type(TaskTypeId::CAPTURE);
        let mut args = HookArgs::new()
            .with(keys::HOST, f.host.clone())
            .with(keys::TASK_TYPE, capture);
        f.hooks
            .process_event(HookEvent::HostNewSettings, &mut args)
            .await;
        assert_eq!(args.record(keys::STORAGE_NODE).unwrap().name(), "branch-master");
    }

    #[tokio::test]
    async fn should_use_master_when_host_has_active_multicast_task() {
        let f = fixture();
        f.repo.seed("task", json!({"hostID": f.host.id.get(), "typeID": 8, "stateID": 1}));
        let mut args = HookArgs::new().with(keys::HOST, f.host.clone());
        f.hooks
            .process_event(HookEvent::BootTaskNewSettings, &mut args)
            .await;
        assert_eq!(args.record(keys::STORAGE_NODE).unwrap().name(), "branch-master");
    }

    #[tokio::test]
    async fn should_not_send_snapins_from_location_unless_enabled() {
        let f = fixture();
        let mut args = HookArgs::new()
            .with(keys::HOST, f.host.clone())
            .with(keys::SNAPIN, true);
        f.hooks.process_event(HookEvent::SnapinNode, &mut args).await;
        assert!(args.record(keys::STORAGE_NODE).is_none());

        f.repo.seed("service", json!({"name": "FOG_SNAPIN_LOCATION_SEND_ENABLED", "value": "1"}));
        f.hooks.process_event(HookEvent::SnapinNode, &mut args).await;
        assert_eq!(args.record(keys::STORAGE_NODE).unwrap().name(), "branch-near");
    }

    #[tokio::test]
    async fn should_do_nothing_when_plugin_not_installed() {
        let repo = Arc::new(InMemoryRecords::default());
        let group = repo.seed("storagegroup", json!({"name": "branch"}));
        let location = repo.seed("location", json!({"name": "branch", "storagegroupID": group.get()}));
        let host = repo.seed("host", json!({"name": "pc"}));
        repo.seed("locationassociation", json!({"locationID": location.get(), "hostID": host.get()}));
        let mut hooks = HookManager::new();
        Arc::new(LocationHook::new(Arc::clone(&repo))).register(&mut hooks);

        let mut args = HookArgs::new().with(keys::HOST, repo.record("host", host).unwrap());
        hooks
            .process_event(HookEvent::HostNewSettings, &mut args)
            .await;
        assert!(!args.contains(keys::STORAGE_GROUP));
        assert!(!args.contains(keys::STORAGE_NODE));
    }

    #[tokio::test]
    async fn should_skip_locations_with_missing_group() {
        let f = fixture();
        let host = f.repo.seed("host", json!({"name": "pc-2"}));
        let location = f.repo.seed("location", json!({"name": "ghost", "storagegroupID": 99}));
        f.repo.seed("locationassociation", json!({"locationID": location.get(), "hostID": host.get()}));

        let mut args = HookArgs::new().with(keys::HOST, f.repo.record("host", host).unwrap());
        f.hooks
            .process_event(HookEvent::HostNewSettings, &mut args)
            .await;
        assert!(!args.contains(keys::STORAGE_GROUP));
    }

    #[tokio::test]
    async fn should_rewrite_boot_files_for_tftp_location() {
        let f = fixture();
        let mut args = HookArgs::new()
            .with(keys::HOST, f.host.clone())
            .with(keys::MEMDISK, "memdisk")
            .with(keys::MEMTEST, "memtest.bin")
            .with(keys::BZIMAGE, "bzImage")
            .with(keys::INITRD, "init.xz");
        f.hooks
            .process_event(HookEvent::BootItemNewSettings, &mut args)
            .await;
        assert_eq!(args.text(keys::WEBSERVER), Some("10.0.0.2"));
        assert_eq!(args.text(keys::WEBROOT), Some("/fog/"));
        assert_eq!(
            args.text(keys::BZIMAGE),
            Some("http://10.0.0.2/fog/service/ipxe/bzImage")
        );
        assert_eq!(
            args.text(keys::IMAGEFILE),
            Some("http://10.0.0.2/fog/service/ipxe/init.xz")
        );
    }

    #[tokio::test]
    async fn should_promote_location_nodes_for_multicast_manager() {
        let f = fixture();
        let other_group = f.repo.seed("storagegroup", json!({"name": "main"}));
        let main = f.repo.seed("storagenode", json!({"name": "main", "storagegroupID": other_group.get(), "isEnabled": 1}));
        let mut args = HookArgs::new()
            .with(keys::SERVICE_CLASS, "MulticastManager")
            .with(keys::MASTER_IDS, vec![main]);
        f.hooks
            .process_event(HookEvent::CheckNodeMasters, &mut args)
            .await;
        let nodes = args.records(keys::STORAGE_NODES).unwrap();
        let names: Vec<&str> = nodes.iter().map(Record::name).collect();
        assert_eq!(names, vec!["branch-near", "main"]);
        assert!(nodes.iter().all(|node| node.flag("isMaster")));
    }

    #[tokio::test]
    async fn should_ignore_other_service_classes() {
        let f = fixture();
        let mut args = HookArgs::new().with(keys::SERVICE_CLASS, "ImageReplicator");
        f.hooks
            .process_event(HookEvent::CheckNodeMasters, &mut args)
            .await;
        assert!(!args.contains(keys::STORAGE_NODES));
    }

    #[tokio::test]
    async fn should_make_multicast_task_node_master() {
        let f = fixture();
        let node = f.repo.all("storagenode").into_iter().nth(1).unwrap();
        let mut args = HookArgs::new()
            .with(keys::SERVICE_CLASS, "MulticastTask")
            .with(keys::STORAGE_NODE, node);
        f.hooks
            .process_event(HookEvent::CheckNodeMaster, &mut args)
            .await;
        assert!(args.record(keys::STORAGE_NODE).unwrap().flag("isMaster"));
    }

    #[tokio::test]
    async fn should_extend_valid_classes() {
        let f = fixture();
        let mut args = HookArgs::new().with(keys::VALID_CLASSES, vec!["host".to_string()]);
        f.hooks
            .process_event(HookEvent::ApiValidClasses, &mut args)
            .await;
        match args.into_value(keys::VALID_CLASSES) {
            Some(HookValue::Names(names)) => {
                assert_eq!(names, vec!["host", "location", "locationassociation"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn should_attach_location_to_host_payload() {
        let f = fixture();
        let mut args = HookArgs::new()
            .with(keys::CLASSNAME, "host")
            .with(keys::RECORD, f.host.clone())
            .with(keys::DATA, json!({"id": f.host.id.get()}));
        f.hooks.process_event(HookEvent::ApiGetter, &mut args).await;
        let data = args.json(keys::DATA).unwrap();
        assert_eq!(data["location"]["name"], "branch");
    }

    #[test]
    fn should_normalize_webroot() {
        assert_eq!(normalize_webroot(""), "/fog/");
        assert_eq!(normalize_webroot("fog"), "/fog/");
        assert_eq!(normalize_webroot("/images/"), "/images/");
    }
}
