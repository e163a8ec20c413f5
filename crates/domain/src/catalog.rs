//! Class catalog — every known record class, its permitted fields, and the
//! dispatch lists the API routes over.
//!
//! A [`ClassSpec`] is the whitelist for one class: only its `fields` are
//! copied from request bodies or used as filters, and its `required` fields
//! must be set before a record is created.

/// Static description of a record class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassSpec {
    pub name: &'static str,
    pub fields: &'static [&'static str],
    pub required: &'static [&'static str],
}

impl ClassSpec {
    /// Whether `field` may be read from or written through the API.
    #[must_use]
    pub fn permits(&self, field: &str) -> bool {
        self.fields.contains(&field)
    }

    /// Key used for collections of this class (`hosts`, `images`, …).
    #[must_use]
    pub fn plural(&self) -> String {
        format!("{}s", self.name)
    }

    /// Whether this class links two other classes together.
    #[must_use]
    pub fn is_association(&self) -> bool {
        self.name.ends_with("association")
    }

    /// Name of the foreign-key field other classes use to point at this one.
    #[must_use]
    pub fn foreign_key(&self) -> String {
        format!("{}ID", self.name)
    }
}

macro_rules! class_specs {
    ($($name:literal => [$($field:literal),* $(,)?] required [$($req:literal),* $(,)?];)*) => {
        /// Every class the service knows about.
        pub const CLASSES: &[ClassSpec] = &[
            $(ClassSpec {
                name: $name,
                fields: &[$($field),*],
                required: &[$($req),*],
            }),*
        ];
    };
}

class_specs! {
    "clientupdater" => ["id", "name", "md5", "type", "file"] required ["name", "file"];
    "dircleaner" => ["id", "path"] required ["path"];
    "greenfog" => ["id", "hostID", "hour", "min", "action", "days"] required ["hour", "min", "action"];
    "group" => [
        "id", "name", "description", "createdBy", "createdTime", "building", "kernel",
        "kernelArgs", "kernelDevice",
    ] required ["name"];
    "groupassociation" => ["id", "hostID", "groupID"] required ["hostID", "groupID"];
    "history" => ["id", "info", "createdBy", "createdTime", "ip"] required ["info"];
    "hookevent" => ["id", "name"] required ["name"];
    "host" => [
        "id", "name", "description", "ip", "imageID", "building", "createdTime", "deployed",
        "createdBy", "useAD", "ADDomain", "ADOU", "ADUser", "ADPass", "ADPassLegacy",
        "productKey", "printerLevel", "kernelArgs", "kernel", "kernelDevice", "init", "pending",
        "pub_key", "sec_tok", "sec_time", "pingstatus", "biosexit", "efiexit", "enforce",
    ] required ["name"];
    "hostautologout" => ["id", "hostID", "time"] required ["hostID", "time"];
    "hostscreensetting" => ["id", "hostID", "width", "height", "refresh", "orientation", "other1", "other2"] required ["hostID"];
    "image" => [
        "id", "name", "description", "path", "createdTime", "createdBy", "building", "size",
        "imageTypeID", "imagePartitionTypeID", "osID", "deployed", "format", "magnet",
        "protected", "compress", "isEnabled", "toReplicate", "srvsize",
    ] required ["name", "path"];
    "imageassociation" => ["id", "imageID", "storagegroupID", "primary"] required ["imageID", "storagegroupID"];
    "imagepartitiontype" => ["id", "name", "type"] required ["name", "type"];
    "imagetype" => ["id", "name", "type"] required ["name", "type"];
    "imaginglog" => ["id", "hostID", "start", "finish", "image", "type", "createdBy"] required ["hostID"];
    "inventory" => [
        "id", "hostID", "primaryUser", "other1", "other2", "createdTime", "deleteDate",
        "sysman", "sysproduct", "sysversion", "sysserial", "systype", "biosversion",
        "biosvendor", "biosdate", "mbman", "mbproductname", "mbversion", "mbserial",
        "mbasset", "cpuman", "cpuversion", "cpucurrent", "cpumax", "mem", "hdmodel",
        "hdserial", "hdfirmware", "caseman", "casever", "caseserial", "caseasset", "memory",
    ] required ["hostID"];
    "ipxe" => ["id", "product", "manufacturer", "mac", "success", "failure", "file", "version"] required ["mac"];
    "keysequence" => ["id", "name", "ascii"] required ["name", "ascii"];
    "location" => ["id", "name", "description", "createdBy", "createdTime", "storagegroupID", "storagenodeID", "tftp"] required ["name", "storagegroupID"];
    "locationassociation" => ["id", "locationID", "hostID"] required ["locationID", "hostID"];
    "macaddressassociation" => ["id", "hostID", "mac", "description", "pending", "primary", "clientIgnore", "imageIgnore"] required ["hostID", "mac"];
    "module" => ["id", "name", "shortName", "description", "isDefault"] required ["name", "shortName"];
    "moduleassociation" => ["id", "hostID", "moduleID", "state"] required ["hostID", "moduleID"];
    "multicastsession" => [
        "id", "name", "port", "logpath", "imageID", "clients", "sessclients", "interface",
        "starttime", "percent", "stateID", "completetime", "isDD", "storagegroupID", "maxwait",
    ] required ["name"];
    "multicastsessionassociation" => ["id", "msID", "taskID"] required ["msID", "taskID"];
    "nodefailure" => ["id", "storagenodeID", "taskID", "hostID", "groupID", "failureTime"] required ["storagenodeID", "hostID"];
    "notifyevent" => ["id", "name", "description", "type"] required ["name"];
    "os" => ["id", "name", "description"] required ["name"];
    "oui" => ["id", "prefix", "name"] required ["prefix", "name"];
    "plugin" => ["id", "name", "state", "installed", "version", "pschecksum"] required ["name"];
    "powermanagement" => ["id", "hostID", "min", "hour", "dom", "month", "dow", "action", "onDemand"] required ["hostID", "action"];
    "printer" => [
        "id", "name", "description", "port", "file", "model", "config", "configFile", "ip",
        "pAnon2", "pAnon3", "pAnon4", "pAnon5",
    ] required ["name"];
    "printerassociation" => ["id", "hostID", "printerID", "isDefault"] required ["hostID", "printerID"];
    "pxemenuoptions" => ["id", "name", "description", "params", "default", "regMenu", "args", "hotkey", "keysequence"] required ["name"];
    "scheduledtask" => [
        "id", "name", "description", "type", "taskType", "minute", "hour", "dayOfMonth",
        "month", "dayOfWeek", "isGroupTask", "hostID", "shutdown", "other1", "other2",
        "other3", "other4", "other5", "scheduleTime", "isActive", "imageID",
    ] required ["type", "taskType", "hostID"];
    "service" => ["id", "name", "description", "value", "category"] required ["name"];
    "snapin" => [
        "id", "name", "description", "file", "args", "createdTime", "createdBy", "reboot",
        "shutdown", "runWith", "runWithArgs", "protected", "isEnabled", "toReplicate", "hide",
        "timeout", "packtype", "hash", "size", "anon3",
    ] required ["name", "file"];
    "snapinassociation" => ["id", "hostID", "snapinID"] required ["hostID", "snapinID"];
    "snapingroupassociation" => ["id", "snapinID", "storagegroupID", "primary"] required ["snapinID", "storagegroupID"];
    "snapinjob" => ["id", "hostID", "stateID", "createdTime"] required ["hostID"];
    "snapintask" => ["id", "jobID", "stateID", "checkin", "complete", "snapinID", "return", "details"] required ["jobID", "snapinID"];
    "storagegroup" => ["id", "name", "description"] required ["name"];
    "storagenode" => [
        "id", "name", "description", "isMaster", "storagegroupID", "isEnabled",
        "isGraphEnabled", "path", "ftppath", "bitrate", "snapinpath", "sslpath", "ip",
        "maxClients", "user", "pass", "key", "interface", "bandwidth", "webroot",
    ] required ["name", "storagegroupID", "ip"];
    "task" => [
        "id", "name", "checkInTime", "hostID", "stateID", "createdTime", "createdBy",
        "isForced", "scheduledStartTime", "typeID", "pct", "bpm", "timeElapsed",
        "timeRemaining", "dataCopied", "percent", "dataTotal", "NFSGroupID", "NFSMemberID",
        "NFSFailures", "NFSLastMemberID", "shutdown", "passreset", "isDebug", "imageID", "wol",
    ] required ["hostID", "typeID"];
    "tasklog" => ["id", "taskID", "taskStateID", "ip", "createdTime", "createdBy"] required ["taskID"];
    "taskstate" => ["id", "name", "description", "order", "icon"] required ["name"];
    "tasktype" => ["id", "name", "description", "icon", "kernel", "kernelArgs", "type", "isAdvanced", "access", "initrd"] required ["name"];
    "user" => ["id", "name", "password", "createdTime", "createdBy", "type", "display", "api", "token"] required ["name", "password"];
    "usercleanup" => ["id", "name"] required ["name"];
    "usertracking" => ["id", "hostID", "username", "action", "datetime", "description", "date", "anon3"] required ["hostID"];
    "virus" => ["id", "name", "mac", "file", "date", "mode", "anon4"] required ["name", "mac"];
}

/// Look up the spec of a class by name.
#[must_use]
pub fn spec(name: &str) -> Option<&'static ClassSpec> {
    CLASSES.iter().find(|spec| spec.name == name)
}

/// Classes reachable through the generic CRUD routes.
pub const DEFAULT_VALID: &[&str] = &[
    "clientupdater",
    "dircleaner",
    "greenfog",
    "group",
    "groupassociation",
    "history",
    "hookevent",
    "host",
    "hostautologout",
    "hostscreensetting",
    "image",
    "imageassociation",
    "imagepartitiontype",
    "imagetype",
    "imaginglog",
    "inventory",
    "ipxe",
    "keysequence",
    "macaddressassociation",
    "module",
    "moduleassociation",
    "multicastsession",
    "multicastsessionassociation",
    "nodefailure",
    "notifyevent",
    "os",
    "oui",
    "plugin",
    "powermanagement",
    "printer",
    "printerassociation",
    "pxemenuoptions",
    "scheduledtask",
    "service",
    "snapin",
    "snapinassociation",
    "snapingroupassociation",
    "snapinjob",
    "snapintask",
    "storagegroup",
    "storagenode",
    "task",
    "tasklog",
    "taskstate",
    "tasktype",
    "usercleanup",
    "usertracking",
    "virus",
];

/// Classes that accept task creation and cancellation.
pub const DEFAULT_TASKING: &[&str] = &[
    "group",
    "host",
    "multicastsession",
    "scheduledtask",
    "snapinjob",
    "snapintask",
    "task",
];

/// Classes with a notion of "currently active".
pub const DEFAULT_ACTIVE: &[&str] = &[
    "multicastsession",
    "scheduledtask",
    "snapinjob",
    "snapintask",
    "task",
];

/// Which list a route draws its class from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Valid,
    Tasking,
    Active,
}

/// The per-request dispatch lists, after plugins had a chance to extend them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    pub valid: Vec<String>,
    pub tasking: Vec<String>,
    pub active: Vec<String>,
}

impl Default for Catalog {
    fn default() -> Self {
        let owned = |names: &[&str]| names.iter().map(ToString::to_string).collect();
        Self {
            valid: owned(DEFAULT_VALID),
            tasking: owned(DEFAULT_TASKING),
            active: owned(DEFAULT_ACTIVE),
        }
    }
}

impl Catalog {
    /// Resolve a class token within a scope.
    ///
    /// The lookup is case-insensitive; names that a plugin added without a
    /// matching [`ClassSpec`] never resolve.
    #[must_use]
    pub fn resolve(&self, scope: Scope, token: &str) -> Option<&'static ClassSpec> {
        let token = token.to_ascii_lowercase();
        let list = match scope {
            Scope::Valid => &self.valid,
            Scope::Tasking => &self.tasking,
            Scope::Active => &self.active,
        };
        if list.iter().any(|name| *name == token) {
            spec(&token)
        } else {
            None
        }
    }

    /// Association classes holding a foreign key to `class`, with that key.
    #[must_use]
    pub fn dependents(class: &str) -> Vec<(&'static ClassSpec, String)> {
        let Some(target) = spec(class) else {
            return Vec::new();
        };
        let key = target.foreign_key();
        CLASSES
            .iter()
            .filter(|spec| spec.is_association() && spec.permits(&key))
            .map(|spec| (spec, key.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_have_spec_for_every_default_class() {
        for name in DEFAULT_VALID.iter().chain(DEFAULT_TASKING).chain(DEFAULT_ACTIVE) {
            assert!(spec(name).is_some(), "missing spec for {name}");
        }
    }

    #[test]
    fn should_list_id_and_required_fields_as_permitted() {
        for spec in CLASSES {
            assert!(spec.permits("id"), "{} lacks id", spec.name);
            for req in spec.required {
                assert!(spec.permits(req), "{} requires unknown {req}", spec.name);
            }
        }
    }

    #[test]
    fn should_not_expose_users_by_default() {
        let catalog = Catalog::default();
        assert!(catalog.resolve(Scope::Valid, "user").is_none());
        assert!(spec("user").is_some());
    }

    #[test]
    fn should_resolve_case_insensitively_within_scope() {
        let catalog = Catalog::default();
        assert_eq!(catalog.resolve(Scope::Valid, "Host").map(|s| s.name), Some("host"));
        assert!(catalog.resolve(Scope::Active, "host").is_none());
        assert!(catalog.resolve(Scope::Tasking, "group").is_some());
    }

    #[test]
    fn should_ignore_plugin_names_without_spec() {
        let mut catalog = Catalog::default();
        catalog.valid.push("nosuchclass".to_string());
        assert!(catalog.resolve(Scope::Valid, "nosuchclass").is_none());
    }

    #[test]
    fn should_find_host_dependents() {
        let names: Vec<&str> = Catalog::dependents("host")
            .iter()
            .map(|(spec, _)| spec.name)
            .collect();
        assert!(names.contains(&"snapinassociation"));
        assert!(names.contains(&"macaddressassociation"));
        assert!(names.contains(&"locationassociation"));
        assert!(!names.contains(&"task"));
    }

    #[test]
    fn should_pluralize_collection_key() {
        assert_eq!(spec("image").unwrap().plural(), "images");
    }
}
