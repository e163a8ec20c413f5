//! Read-side helpers shared by hooks and services.
//!
//! These answer the small relational questions the record store cannot:
//! which node is a group's master, which locations a host belongs to,
//! whether a plugin is active.

use serde_json::Value;

use fog_domain::error::FogError;
use fog_domain::id::RecordId;
use fog_domain::record::{Filter, Record};
use fog_domain::task::TaskState;

use crate::ports::RecordRepository;

/// Value of a `service` setting, when defined.
///
/// # Errors
///
/// Propagates storage failures.
pub async fn setting<R: RecordRepository>(repo: &R, name: &str) -> Result<Option<String>, FogError> {
    let found = repo
        .find("service", &Filter::new().equals("name", name))
        .await?;
    Ok(found.first().map(|record| record.text("value")))
}

/// Whether the named plugin is installed and active.
///
/// # Errors
///
/// Propagates storage failures.
pub async fn plugin_installed<R: RecordRepository>(repo: &R, name: &str) -> Result<bool, FogError> {
    let found = repo
        .find("plugin", &Filter::new().equals("name", name))
        .await?;
    Ok(found
        .iter()
        .any(|plugin| plugin.flag("installed") && plugin.flag("state")))
}

/// Values of `target` on every `class` record whose `key` equals `id`.
///
/// # Errors
///
/// Propagates storage failures.
pub async fn linked_ids<R: RecordRepository>(
    repo: &R,
    class: &str,
    key: &str,
    id: RecordId,
    target: &str,
) -> Result<Vec<RecordId>, FogError> {
    let links = repo
        .find(class, &Filter::new().equals(key, id.get()))
        .await?;
    let mut out = Vec::new();
    for link_id in links.iter().filter_map(|link| link.reference(target)) {
        if !out.contains(&link_id) {
            out.push(link_id);
        }
    }
    Ok(out)
}

/// Records of `class` with the given ids, ordered by id.
///
/// # Errors
///
/// Propagates storage failures.
pub async fn by_ids<R: RecordRepository>(
    repo: &R,
    class: &str,
    ids: &[RecordId],
) -> Result<Vec<Record>, FogError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let filter = Filter::new().any_of("id", ids.iter().map(|id| Value::from(id.get())));
    repo.find(class, &filter).await
}

/// Enabled nodes of a storage group, ordered by id.
///
/// # Errors
///
/// Propagates storage failures.
pub async fn enabled_nodes<R: RecordRepository>(
    repo: &R,
    group: RecordId,
) -> Result<Vec<Record>, FogError> {
    let filter = Filter::new()
        .equals("storagegroupID", group.get())
        .equals("isEnabled", 1);
    repo.find("storagenode", &filter).await
}

/// The master node of a storage group: the first enabled node flagged as
/// master, else the first enabled node.
///
/// # Errors
///
/// Propagates storage failures.
pub async fn master_node<R: RecordRepository>(
    repo: &R,
    group: RecordId,
) -> Result<Option<Record>, FogError> {
    let nodes = enabled_nodes(repo, group).await?;
    let master = nodes.iter().position(|node| node.flag("isMaster"));
    Ok(nodes.into_iter().nth(master.unwrap_or(0)))
}

/// Locations the host is associated with.
///
/// # Errors
///
/// Propagates storage failures.
pub async fn host_locations<R: RecordRepository>(
    repo: &R,
    host: RecordId,
) -> Result<Vec<Record>, FogError> {
    let ids = linked_ids(repo, "locationassociation", "hostID", host, "locationID").await?;
    by_ids(repo, "location", &ids).await
}

/// The node a location serves from: its own node when set and present,
/// else the master of its storage group.
///
/// # Errors
///
/// Propagates storage failures.
pub async fn location_node<R: RecordRepository>(
    repo: &R,
    location: &Record,
) -> Result<Option<Record>, FogError> {
    if let Some(node_id) = location.reference("storagenodeID")
        && let Some(node) = repo.get("storagenode", node_id).await?
    {
        return Ok(Some(node));
    }
    match location.reference("storagegroupID") {
        Some(group) => master_node(repo, group).await,
        None => Ok(None),
    }
}

/// The host's task in an active state, if any.
///
/// # Errors
///
/// Propagates storage failures.
pub async fn active_task<R: RecordRepository>(
    repo: &R,
    host: RecordId,
) -> Result<Option<Record>, FogError> {
    let filter = Filter::new()
        .equals("hostID", host.get())
        .any_of("stateID", TaskState::active_values());
    let tasks = repo.find("task", &filter).await?;
    Ok(tasks.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryRecords;
    use serde_json::json;

    #[tokio::test]
    async fn should_prefer_enabled_master_node() {
        let repo = InMemoryRecords::default();
        let group = repo.seed("storagegroup", json!({"name": "default"}));
        repo.seed("storagenode", json!({"name": "a", "storagegroupID": group.get(), "isEnabled": 1}));
        repo.seed("storagenode", json!({"name": "b", "storagegroupID": group.get(), "isEnabled": 0, "isMaster": 1}));
        repo.seed("storagenode", json!({"name": "c", "storagegroupID": group.get(), "isEnabled": "1", "isMaster": "1"}));

        let master = master_node(&repo, group).await.unwrap().unwrap();
        assert_eq!(master.name(), "c");
    }

    #[tokio::test]
    async fn should_fall_back_to_first_enabled_node() {
        let repo = InMemoryRecords::default();
        let group = repo.seed("storagegroup", json!({"name": "default"}));
        repo.seed("storagenode", json!({"name": "off", "storagegroupID": group.get(), "isEnabled": 0}));
        repo.seed("storagenode", json!({"name": "on", "storagegroupID": group.get(), "isEnabled": 1}));

        let master = master_node(&repo, group).await.unwrap().unwrap();
        assert_eq!(master.name(), "on");
    }

    #[tokio::test]
    async fn should_return_none_for_group_without_enabled_nodes() {
        let repo = InMemoryRecords::default();
        let group = repo.seed("storagegroup", json!({"name": "empty"}));
        assert!(master_node(&repo, group).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_resolve_location_node_from_group_when_unset() {
        let repo = InMemoryRecords::default();
        let group = repo.seed("storagegroup", json!({"name": "branch"}));
        repo.seed("storagenode", json!({"name": "branch-1", "storagegroupID": group.get(), "isEnabled": 1}));
        let location = repo.seed("location", json!({"name": "branch", "storagegroupID": group.get(), "storagenodeID": 0}));
        let location = repo.record("location", location).unwrap();

        let node = location_node(&repo, &location).await.unwrap().unwrap();
        assert_eq!(node.name(), "branch-1");
    }

    #[tokio::test]
    async fn should_find_host_locations_through_associations() {
        let repo = InMemoryRecords::default();
        let host = repo.seed("host", json!({"name": "pc"}));
        let a = repo.seed("location", json!({"name": "a"}));
        repo.seed("location", json!({"name": "b"}));
        repo.seed("locationassociation", json!({"hostID": host.get(), "locationID": a.get()}));

        let locations = host_locations(&repo, host).await.unwrap();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].name(), "a");
    }

    #[tokio::test]
    async fn should_find_only_active_task() {
        let repo = InMemoryRecords::default();
        let host = repo.seed("host", json!({"name": "pc"}));
        repo.seed("task", json!({"hostID": host.get(), "stateID": 4}));
        assert!(active_task(&repo, host).await.unwrap().is_none());
        repo.seed("task", json!({"hostID": host.get(), "stateID": "2"}));
        assert!(active_task(&repo, host).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn should_require_installed_and_active_plugin() {
        let repo = InMemoryRecords::default();
        repo.seed("plugin", json!({"name": "location", "installed": 1, "state": 0}));
        assert!(!plugin_installed(&repo, "location").await.unwrap());
        repo.install_plugin("location");
        assert!(plugin_installed(&repo, "location").await.unwrap());
    }

    #[tokio::test]
    async fn should_read_setting_value() {
        let repo = InMemoryRecords::default();
        repo.seed("service", json!({"name": "FOG_API_ENABLED", "value": "1"}));
        assert_eq!(
            setting(&repo, "FOG_API_ENABLED").await.unwrap().as_deref(),
            Some("1")
        );
        assert!(setting(&repo, "FOG_NOPE").await.unwrap().is_none());
    }
}
