//! Storage selection — default placement decisions, handed to hooks for
//! adjustment before they are used.
//!
//! Library-only: the REST API exposes no route for it.

use std::sync::Arc;

use fog_domain::error::FogError;
use fog_domain::record::{Filter, Record};

use super::settings::WEB_HOST;
use crate::hooks::{HookArgs, HookEvent, HookManager, keys};
use crate::lookup;
use crate::ports::RecordRepository;

const DEFAULT_WEBROOT: &str = "/fog/";

/// Kernel, initrd and helper images a host boots from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootFiles {
    pub webserver: String,
    pub webroot: String,
    pub memdisk: String,
    pub memtest: String,
    pub bz_image: String,
    pub initrd: String,
}

impl Default for BootFiles {
    fn default() -> Self {
        Self {
            webserver: String::new(),
            webroot: DEFAULT_WEBROOT.to_string(),
            memdisk: "memdisk".to_string(),
            memtest: "memtest.bin".to_string(),
            bz_image: "bzImage".to_string(),
            initrd: "init.xz".to_string(),
        }
    }
}

/// Storage group and node chosen for some piece of work.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Placement {
    pub group: Option<Record>,
    pub node: Option<Record>,
}

impl Placement {
    fn into_args(self, args: &mut HookArgs) {
        if let Some(group) = self.group {
            args.insert(keys::STORAGE_GROUP, group);
        }
        if let Some(node) = self.node {
            args.insert(keys::STORAGE_NODE, node);
        }
    }

    fn from_args(args: &mut HookArgs) -> Self {
        Self {
            group: args.take_record(keys::STORAGE_GROUP),
            node: args.take_record(keys::STORAGE_NODE),
        }
    }
}

pub struct StorageSelection<R> {
    repo: Arc<R>,
    hooks: Arc<HookManager>,
}

impl<R: RecordRepository + Send + Sync> StorageSelection<R> {
    pub fn new(repo: Arc<R>, hooks: Arc<HookManager>) -> Self {
        Self { repo, hooks }
    }

    /// Boot files for `host`, served from the web host by default.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn boot_files(&self, host: &Record) -> Result<BootFiles, FogError> {
        let defaults = BootFiles {
            webserver: lookup::setting(&*self.repo, WEB_HOST)
                .await?
                .unwrap_or_default(),
            ..BootFiles::default()
        };
        let mut args = HookArgs::new()
            .with(keys::HOST, host.clone())
            .with(keys::WEBSERVER, defaults.webserver.as_str())
            .with(keys::WEBROOT, defaults.webroot.as_str())
            .with(keys::MEMDISK, defaults.memdisk.as_str())
            .with(keys::MEMTEST, defaults.memtest.as_str())
            .with(keys::BZIMAGE, defaults.bz_image.as_str())
            .with(keys::INITRD, defaults.initrd.as_str());
        self.hooks
            .process_event(HookEvent::BootItemNewSettings, &mut args)
            .await;

        let text = |key: &str, fallback: &str| args.text(key).unwrap_or(fallback).to_string();
        Ok(BootFiles {
            webserver: text(keys::WEBSERVER, &defaults.webserver),
            webroot: text(keys::WEBROOT, &defaults.webroot),
            memdisk: text(keys::MEMDISK, &defaults.memdisk),
            memtest: text(keys::MEMTEST, &defaults.memtest),
            bz_image: text(keys::BZIMAGE, &defaults.bz_image),
            initrd: args
                .text(keys::IMAGEFILE)
                .or_else(|| args.text(keys::INITRD))
                .unwrap_or(&defaults.initrd)
                .to_string(),
        })
    }

    /// Placement of the task a host is booting into.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn task_storage(
        &self,
        host: &Record,
        task_type: Option<&Record>,
        defaults: Placement,
    ) -> Result<Placement, FogError> {
        let mut args = HookArgs::new().with(keys::HOST, host.clone());
        if let Some(task_type) = task_type {
            args.insert(keys::TASK_TYPE, task_type.clone());
        }
        defaults.into_args(&mut args);
        self.hooks
            .process_event(HookEvent::BootTaskNewSettings, &mut args)
            .await;
        Ok(Placement::from_args(&mut args))
    }

    /// Where `host` fetches `snapin` from: the snapin's primary storage
    /// group and its master node unless a hook redirects it.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn snapin_storage(&self, host: &Record, snapin: &Record) -> Result<Placement, FogError> {
        let links = self
            .repo
            .find("snapingroupassociation", &Filter::new().equals("snapinID", snapin.id.get()))
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

        let mut args = HookArgs::new()
            .with(keys::HOST, host.clone())
            .with(keys::SNAPIN, true);
        if let Some(group) = group {
            args.insert(keys::STORAGE_GROUP, group);
        }
        self.hooks
            .process_event(HookEvent::SnapinGroup, &mut args)
            .await;

        let node = match args.record(keys::STORAGE_GROUP) {
            Some(group) => lookup::master_node(&*self.repo, group.id).await?,
            None => None,
        };
        if let Some(node) = node {
            args.insert(keys::STORAGE_NODE, node);
        }
        self.hooks
            .process_event(HookEvent::SnapinNode, &mut args)
            .await;
        Ok(Placement::from_args(&mut args))
    }

    /// Nodes the multicast manager treats as masters.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn multicast_masters(&self) -> Result<Vec<Record>, FogError> {
        let filter = Filter::new().equals("isMaster", 1).equals("isEnabled", 1);
        let masters = self.repo.find("storagenode", &filter).await?;
        let ids: Vec<_> = masters.iter().map(|node| node.id).collect();
        let mut args = HookArgs::new()
            .with(keys::SERVICE_CLASS, "MulticastManager")
            .with(keys::MASTER_IDS, ids)
            .with(keys::STORAGE_NODES, masters);
        self.hooks
            .process_event(HookEvent::CheckNodeMasters, &mut args)
            .await;
        Ok(args.records(keys::STORAGE_NODES).map(<[Record]>::to_vec).unwrap_or_default())
    }

    /// The node a multicast task runs on, after hooks had their say.
    pub async fn multicast_task_node(&self, node: Record) -> Record {
        let mut args = HookArgs::new()
            .with(keys::SERVICE_CLASS, "MulticastTask")
            .with(keys::STORAGE_NODE, node.clone());
        self.hooks
            .process_event(HookEvent::CheckNodeMaster, &mut args)
            .await;
        args.take_record(keys::STORAGE_NODE).unwrap_or(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::LocationHook;
    use crate::testing::InMemoryRecords;
    use fog_domain::id::RecordId;
    use serde_json::json;

    struct Fixture {
        repo: Arc<InMemoryRecords>,
        selection: StorageSelection<InMemoryRecords>,
        host: Record,
        main: RecordId,
    }

    /// A main group with a master, and a branch location for the host.
    fn fixture(with_location: bool) -> Fixture {
        let repo = Arc::new(InMemoryRecords::default());
        repo.seed("service", json!({"name": WEB_HOST, "value": "10.0.0.9"}));
        let main = repo.seed("storagegroup", json!({"name": "main"}));
        repo.seed("storagenode", json!({"name": "main-master", "ip": "10.0.0.9", "storagegroupID": main.get(), "isEnabled": 1, "isMaster": 1}));
        let branch = repo.seed("storagegroup", json!({"name": "branch"}));
        let near = repo.seed("storagenode", json!({"name": "branch-near", "ip": "10.0.1.2", "storagegroupID": branch.get(), "isEnabled": 1}));
        let location = repo.seed("location", json!({"name": "branch", "storagegroupID": branch.get(), "storagenodeID": near.get(), "tftp": 1}));
        let host = repo.seed("host", json!({"name": "pc"}));
        repo.seed("locationassociation", json!({"locationID": location.get(), "hostID": host.get()}));
        let host = repo.record("host", host).unwrap();

        let mut hooks = HookManager::new();
        if with_location {
            repo.install_plugin("location");
            Arc::new(LocationHook::new(Arc::clone(&repo))).register(&mut hooks);
        }
        let selection = StorageSelection::new(Arc::clone(&repo), Arc::new(hooks));
        Fixture { repo, selection, host, main }
    }

    #[tokio::test]
    async fn should_serve_default_boot_files_from_web_host() {
        let f = fixture(false);
        let files = f.selection.boot_files(&f.host).await.unwrap();
        assert_eq!(files.webserver, "10.0.0.9");
        assert_eq!(files.webroot, "/fog/");
        assert_eq!(files.bz_image, "bzImage");
        assert_eq!(files.initrd, "init.xz");
    }

    #[tokio::test]
    async fn should_let_location_rewrite_boot_files() {
        let f = fixture(true);
        let files = f.selection.boot_files(&f.host).await.unwrap();
        assert_eq!(files.webserver, "10.0.1.2");
        assert_eq!(files.initrd, "http://10.0.1.2/fog/service/ipxe/init.xz");
    }

    #[tokio::test]
    async fn should_keep_task_defaults_without_hooks() {
        let f = fixture(false);
        let group = f.repo.record("storagegroup", f.main).unwrap();
        let defaults = Placement {
            group: Some(group.clone()),
            node: None,
        };
        let placement = f
            .selection
            .task_storage(&f.host, None, defaults)
            .await
            .unwrap();
        assert_eq!(placement.group, Some(group));
        assert!(placement.node.is_none());
    }

    #[tokio::test]
    async fn should_move_task_to_location_storage() {
        let f = fixture(true);
        let group = f.repo.record("storagegroup", f.main).unwrap();
        let defaults = Placement {
            group: Some(group),
            node: None,
        };
        let placement = f
            .selection
            .task_storage(&f.host, None, defaults)
            .await
            .unwrap();
        assert_eq!(placement.group.unwrap().name(), "branch");
        assert_eq!(placement.node.unwrap().name(), "branch-near");
    }

    #[tokio::test]
    async fn should_place_snapin_on_primary_group_master() {
        let f = fixture(false);
        let snapin = f.repo.seed("snapin", json!({"name": "office", "file": "office.exe"}));
        f.repo.seed("snapingroupassociation", json!({"snapinID": snapin.get(), "storagegroupID": f.main.get(), "primary": 1}));
        let snapin = f.repo.record("snapin", snapin).unwrap();

        let placement = f.selection.snapin_storage(&f.host, &snapin).await.unwrap();
        assert_eq!(placement.group.unwrap().name(), "main");
        assert_eq!(placement.node.unwrap().name(), "main-master");
    }

    #[tokio::test]
    async fn should_report_enabled_masters() {
        let f = fixture(false);
        let masters = f.selection.multicast_masters().await.unwrap();
        let names: Vec<&str> = masters.iter().map(Record::name).collect();
        assert_eq!(names, vec!["main-master"]);
    }

    #[tokio::test]
    async fn should_add_location_nodes_to_masters() {
        let f = fixture(true);
        let masters = f.selection.multicast_masters().await.unwrap();
        assert_eq!(masters.len(), 2);
        assert!(masters.iter().all(|node| node.flag("isMaster")));
    }

    #[tokio::test]
    async fn should_return_task_node_unchanged_without_location() {
        let f = fixture(false);
        let node = f.repo.all("storagenode").remove(1);
        let chosen = f.selection.multicast_task_node(node.clone()).await;
        assert_eq!(chosen, node);
    }
}
