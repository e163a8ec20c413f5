//! Event hooks for extending request handling from plugins.
//!
//! The hook system exposes named extension points ([`HookEvent`]). At each
//! point the caller builds a mutable [`HookArgs`] map and hands it to
//! [`HookManager::process_event`], which runs every handler registered for
//! that event in registration order. Handlers communicate only by reading and
//! writing keys of the map; they never return errors.
//!
//! - `args`: the argument map and its well-known keys
//! - `manager`: registration and dispatch
//! - `location`: the location plugin's storage node / group selection

pub mod args;
pub mod location;
pub mod manager;

pub use args::{HookArgs, HookValue, keys};
pub use location::LocationHook;
pub use manager::{HookFuture, HookHandler, HookManager, Method};

use std::fmt;
use std::sync::Arc;

use crate::ports::RecordRepository;

/// A manager with every bundled plugin hook registered.
///
/// Each hook checks its plugin's `plugin` record on every call, so
/// installing or removing a plugin at runtime takes effect without
/// rebuilding the manager.
pub fn bundled<R>(repo: Arc<R>) -> HookManager
where
    R: RecordRepository + Send + Sync + 'static,
{
    let mut hooks = HookManager::new();
    Arc::new(LocationHook::new(repo)).register(&mut hooks);
    hooks
}

/// Named extension points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    /// Pick the storage node a snapin is served from.
    SnapinNode,
    /// Pick the storage group a snapin is served from.
    SnapinGroup,
    /// Boot files (kernel, init, memdisk, memtest) are about to be served.
    BootItemNewSettings,
    /// A booting host is about to receive its task's storage placement.
    BootTaskNewSettings,
    /// A host is about to be tasked.
    HostNewSettings,
    /// The multicast manager is collecting master nodes.
    CheckNodeMasters,
    /// A multicast task is about to use a node.
    CheckNodeMaster,
    ApiValidClasses,
    ApiTaskingClasses,
    ApiActiveTaskClasses,
    /// A list/search collection was built.
    ApiMassdataMapping,
    /// A single record payload was built.
    ApiIndivdataMapping,
    /// One record was shaped for output.
    ApiGetter,
}

impl HookEvent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SnapinNode => "SNAPIN_NODE",
            Self::SnapinGroup => "SNAPIN_GROUP",
            Self::BootItemNewSettings => "BOOT_ITEM_NEW_SETTINGS",
            Self::BootTaskNewSettings => "BOOT_TASK_NEW_SETTINGS",
            Self::HostNewSettings => "HOST_NEW_SETTINGS",
            Self::CheckNodeMasters => "CHECK_NODE_MASTERS",
            Self::CheckNodeMaster => "CHECK_NODE_MASTER",
            Self::ApiValidClasses => "API_VALID_CLASSES",
            Self::ApiTaskingClasses => "API_TASKING_CLASSES",
            Self::ApiActiveTaskClasses => "API_ACTIVE_TASK_CLASSES",
            Self::ApiMassdataMapping => "API_MASSDATA_MAPPING",
            Self::ApiIndivdataMapping => "API_INDIVDATA_MAPPING",
            Self::ApiGetter => "API_GETTER",
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
