//! Association updates carried in create / edit bodies.
//!
//! A host body may list `macs`, `snapins`, `printers`, `modules` and
//! `groups`; a group body `hosts` (plus snapins, printers and modules that
//! fan out to its members) and an `imageID`; image and snapin bodies
//! `hosts` and `storagegroups`; a printer body `hosts`.

use serde_json::Value;

use fog_domain::error::FogError;
use fog_domain::id::RecordId;
use fog_domain::mac::MacAddress;
use fog_domain::record::{Fields, Filter, Record};
use fog_domain::value::{as_id, ids};

use crate::lookup;
use crate::ports::RecordRepository;

/// How provided lists combine with existing associations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Create: link in addition to what exists.
    Add,
    /// Edit: a provided non-empty list replaces the current set.
    Replace,
}

/// Relationship lists parsed from a request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationChanges {
    pub macs: Vec<MacAddress>,
    pub snapins: Vec<RecordId>,
    pub printers: Vec<RecordId>,
    pub modules: Vec<RecordId>,
    pub groups: Vec<RecordId>,
    pub hosts: Vec<RecordId>,
    pub storagegroups: Vec<RecordId>,
    pub image: Option<RecordId>,
}

impl RelationChanges {
    /// Parse the lists that apply to `class`.
    ///
    /// # Errors
    ///
    /// Returns [`fog_domain::error::ValidationError::InvalidMac`] for a
    /// malformed MAC address.
    pub fn from_body(class: &str, body: &Fields) -> Result<Self, FogError> {
        let list = |key: &str| body.get(key).map(ids).unwrap_or_default();
        let mut changes = Self::default();
        match class {
            "host" => {
                changes.macs = parse_macs(body.get("macs"))?;
                changes.snapins = list("snapins");
                changes.printers = list("printers");
                changes.modules = list("modules");
                changes.groups = list("groups");
            }
            "group" => {
                changes.hosts = list("hosts");
                changes.snapins = list("snapins");
                changes.printers = list("printers");
                changes.modules = list("modules");
                changes.image = body.get("imageID").and_then(as_id);
            }
            "image" | "snapin" => {
                changes.hosts = list("hosts");
                changes.storagegroups = list("storagegroups");
            }
            "printer" => changes.hosts = list("hosts"),
            _ => {}
        }
        Ok(changes)
    }
}

fn parse_macs(value: Option<&Value>) -> Result<Vec<MacAddress>, FogError> {
    let items: Vec<&Value> = match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single @ Value::String(text)) if !text.is_empty() => vec![single],
        _ => Vec::new(),
    };
    let mut macs: Vec<MacAddress> = Vec::with_capacity(items.len());
    for item in items {
        let text = item.as_str().unwrap_or_default();
        let mac: MacAddress = text.parse()?;
        if !macs.contains(&mac) {
            macs.push(mac);
        }
    }
    Ok(macs)
}

/// Apply `changes` to the freshly saved `record`.
///
/// # Errors
///
/// Returns a storage error propagated from the repository.
pub async fn apply<R: RecordRepository>(
    repo: &R,
    record: &Record,
    changes: &RelationChanges,
    mode: Mode,
) -> Result<(), FogError> {
    let id = record.id;
    match record.class.as_str() {
        "host" => {
            if !changes.macs.is_empty() {
                set_macs(repo, id, &changes.macs).await?;
            }
            link(repo, Link::new("snapinassociation", "hostID", "snapinID", "snapin"), id, &changes.snapins, mode).await?;
            link(repo, Link::new("printerassociation", "hostID", "printerID", "printer"), id, &changes.printers, mode).await?;
            link(repo, Link::new("moduleassociation", "hostID", "moduleID", "module"), id, &changes.modules, mode).await?;
            link(repo, Link::new("groupassociation", "hostID", "groupID", "group"), id, &changes.groups, mode).await?;
        }
        "group" => {
            link(repo, Link::new("groupassociation", "groupID", "hostID", "host"), id, &changes.hosts, mode).await?;
            let members = lookup::linked_ids(repo, "groupassociation", "groupID", id, "hostID").await?;
            for host in &members {
                link(repo, Link::new("snapinassociation", "hostID", "snapinID", "snapin"), *host, &changes.snapins, mode).await?;
                link(repo, Link::new("printerassociation", "hostID", "printerID", "printer"), *host, &changes.printers, mode).await?;
                link(repo, Link::new("moduleassociation", "hostID", "moduleID", "module"), *host, &changes.modules, mode).await?;
            }
            let apply_image = match mode {
                Mode::Add => !changes.hosts.is_empty(),
                Mode::Replace => true,
            };
            if let (Some(image), true) = (changes.image, apply_image) {
                for host in lookup::by_ids(repo, "host", &members).await? {
                    set_field(repo, host, "imageID", image.get()).await?;
                }
            }
        }
        "image" => {
            assign_image(repo, id, &changes.hosts, mode).await?;
            link_primary(repo, Link::new("imageassociation", "imageID", "storagegroupID", "storagegroup"), id, &changes.storagegroups, mode).await?;
        }
        "snapin" => {
            link(repo, Link::new("snapinassociation", "snapinID", "hostID", "host"), id, &changes.hosts, mode).await?;
            link_primary(repo, Link::new("snapingroupassociation", "snapinID", "storagegroupID", "storagegroup"), id, &changes.storagegroups, mode).await?;
        }
        "printer" => {
            link(repo, Link::new("printerassociation", "printerID", "hostID", "host"), id, &changes.hosts, mode).await?;
        }
        _ => {}
    }
    Ok(())
}

/// One side of an association class.
#[derive(Debug, Clone, Copy)]
struct Link {
    assoc: &'static str,
    own_key: &'static str,
    other_key: &'static str,
    other_class: &'static str,
}

impl Link {
    fn new(
        assoc: &'static str,
        own_key: &'static str,
        other_key: &'static str,
        other_class: &'static str,
    ) -> Self {
        Self {
            assoc,
            own_key,
            other_key,
            other_class,
        }
    }
}

async fn link<R: RecordRepository>(
    repo: &R,
    link: Link,
    own: RecordId,
    targets: &[RecordId],
    mode: Mode,
) -> Result<(), FogError> {
    link_with(repo, link, own, targets, mode, false).await
}

/// Like [`link`], marking the first target as primary.
async fn link_primary<R: RecordRepository>(
    repo: &R,
    link: Link,
    own: RecordId,
    targets: &[RecordId],
    mode: Mode,
) -> Result<(), FogError> {
    link_with(repo, link, own, targets, mode, true).await
}

async fn link_with<R: RecordRepository>(
    repo: &R,
    link: Link,
    own: RecordId,
    targets: &[RecordId],
    mode: Mode,
    primary: bool,
) -> Result<(), FogError> {
    if targets.is_empty() {
        return Ok(());
    }
    let existing = repo
        .find(link.assoc, &Filter::new().equals(link.own_key, own.get()))
        .await?;
    let mut linked: Vec<RecordId> = Vec::new();
    // The first link actually stored takes primary, unless one already has it.
    let mut needs_primary = primary;
    if mode == Mode::Replace {
        let stale: Vec<RecordId> = existing.iter().map(|assoc| assoc.id).collect();
        repo.delete(link.assoc, &stale).await?;
    } else {
        linked.extend(existing.iter().filter_map(|assoc| assoc.reference(link.other_key)));
        needs_primary &= !existing.iter().any(|assoc| assoc.flag("primary"));
    }

    let valid = lookup::by_ids(repo, link.other_class, targets).await?;
    for target in targets {
        if linked.contains(target) || !valid.iter().any(|record| record.id == *target) {
            continue;
        }
        let mut fields = Fields::new();
        fields.insert(link.own_key.to_string(), Value::from(own.get()));
        fields.insert(link.other_key.to_string(), Value::from(target.get()));
        if primary {
            fields.insert("primary".to_string(), Value::from(i64::from(needs_primary)));
            needs_primary = false;
        }
        repo.insert(link.assoc, fields).await?;
        linked.push(*target);
    }
    tracing::debug!(assoc = link.assoc, own = %own, count = linked.len(), "associations updated");
    Ok(())
}

/// Replace the host's MAC list; the first address becomes primary.
async fn set_macs<R: RecordRepository>(
    repo: &R,
    host: RecordId,
    macs: &[MacAddress],
) -> Result<(), FogError> {
    let existing = repo
        .find("macaddressassociation", &Filter::new().equals("hostID", host.get()))
        .await?;
    let stale: Vec<RecordId> = existing.iter().map(|mac| mac.id).collect();
    repo.delete("macaddressassociation", &stale).await?;
    for (position, mac) in macs.iter().enumerate() {
        let mut fields = Fields::new();
        fields.insert("hostID".to_string(), Value::from(host.get()));
        fields.insert("mac".to_string(), Value::from(mac.to_string()));
        fields.insert("primary".to_string(), Value::from(i64::from(position == 0)));
        fields.insert("pending".to_string(), Value::from(0));
        repo.insert("macaddressassociation", fields).await?;
    }
    Ok(())
}

/// Point the listed hosts at `image`.
async fn assign_image<R: RecordRepository>(
    repo: &R,
    image: RecordId,
    hosts: &[RecordId],
    mode: Mode,
) -> Result<(), FogError> {
    if hosts.is_empty() {
        return Ok(());
    }
    if mode == Mode::Replace {
        let current = repo
            .find("host", &Filter::new().equals("imageID", image.get()))
            .await?;
        for host in current.into_iter().filter(|host| !hosts.contains(&host.id)) {
            set_field(repo, host, "imageID", 0).await?;
        }
    }
    for host in lookup::by_ids(repo, "host", hosts).await? {
        set_field(repo, host, "imageID", image.get()).await?;
    }
    Ok(())
}

async fn set_field<R: RecordRepository>(
    repo: &R,
    mut record: Record,
    key: &str,
    value: i64,
) -> Result<(), FogError> {
    record.set(key, value);
    repo.update(record).await?;
    Ok(())
}
