//! Task vocabulary — states and task type traits.

use serde_json::Value;

use crate::value::as_i64;

/// Lifecycle state of a task, snapin job, snapin task or multicast session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Queued = 1,
    CheckedIn = 2,
    InProgress = 3,
    Complete = 4,
    Cancelled = 5,
}

impl TaskState {
    /// States that count as "active": queued, checked in or in progress.
    pub const ACTIVE: [Self; 3] = [Self::Queued, Self::CheckedIn, Self::InProgress];

    #[must_use]
    pub fn id(self) -> i64 {
        self as i64
    }

    /// Active state ids as JSON values, ready for a filter clause.
    #[must_use]
    pub fn active_values() -> Vec<Value> {
        Self::ACTIVE.iter().map(|s| Value::from(s.id())).collect()
    }

    /// Whether a `stateID` value denotes an active state.
    #[must_use]
    pub fn is_active_value(value: &Value) -> bool {
        as_i64(value).is_some_and(|id| Self::ACTIVE.iter().any(|s| s.id() == id))
    }
}

/// Identifier of a task type with the traits the scheduler cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskTypeId(pub i64);

impl TaskTypeId {
    pub const DEPLOY: Self = Self(1);
    pub const CAPTURE: Self = Self(2);
    pub const DEBUG: Self = Self(3);
    pub const MULTICAST: Self = Self(8);
    pub const ALL_SNAPINS: Self = Self(12);
    pub const SINGLE_SNAPIN: Self = Self(13);
    pub const DEPLOY_DEBUG: Self = Self(15);
    pub const CAPTURE_DEBUG: Self = Self(16);
    pub const DEPLOY_NO_SNAPINS: Self = Self(17);

    /// Uploads an image from the host.
    #[must_use]
    pub fn is_capture(self) -> bool {
        self == Self::CAPTURE || self == Self::CAPTURE_DEBUG
    }

    #[must_use]
    pub fn is_multicast(self) -> bool {
        self == Self::MULTICAST
    }

    /// Runs snapins only, without imaging.
    #[must_use]
    pub fn is_snapin_tasking(self) -> bool {
        self == Self::ALL_SNAPINS || self == Self::SINGLE_SNAPIN
    }

    /// Moves an image in either direction and therefore needs one assigned.
    #[must_use]
    pub fn is_imaging(self) -> bool {
        [
            Self::DEPLOY,
            Self::CAPTURE,
            Self::MULTICAST,
            Self::DEPLOY_DEBUG,
            Self::CAPTURE_DEBUG,
            Self::DEPLOY_NO_SNAPINS,
        ]
        .contains(&self)
    }

    /// Needs the master node of a storage group rather than any node.
    #[must_use]
    pub fn needs_master(self) -> bool {
        self.is_capture() || self.is_multicast()
    }
}
