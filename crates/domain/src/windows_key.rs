//! Windows product keys managed by the `windowskeys` plugin.

use serde::{Deserialize, Serialize};

use crate::error::{FogError, ValidationError};
use crate::id::RecordId;

/// A named product key that images can be associated with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowsKey {
    pub id: RecordId,
    pub name: String,
    pub description: String,
    pub created_by: String,
    pub created_time: String,
    pub key: String,
}

/// A key that has not been stored yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewWindowsKey {
    pub name: String,
    pub description: String,
    pub created_by: String,
    pub key: String,
}

impl NewWindowsKey {
    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`FogError::Validation`] when `name` or `key` is empty.
    pub fn validate(&self) -> Result<(), FogError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.key.trim().is_empty() {
            return Err(ValidationError::MissingRequiredField("key".to_string()).into());
        }
        Ok(())
    }
}

/// Which keys a destroy call removes; empty criteria match every key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyFilter {
    pub ids: Vec<RecordId>,
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_reject_key_without_name() {
        let key = NewWindowsKey {
            key: "ABCDE-12345".to_string(),
            ..NewWindowsKey::default()
        };
        assert!(matches!(
            key.validate(),
            Err(FogError::Validation(ValidationError::EmptyName))
        ));
    }

    #[test]
    fn should_reject_key_without_value() {
        let key = NewWindowsKey {
            name: "Win10 Pro".to_string(),
            ..NewWindowsKey::default()
        };
        assert!(key.validate().is_err());
    }

    #[test]
    fn should_accept_complete_key() {
        let key = NewWindowsKey {
            name: "Win10 Pro".to_string(),
            key: "W269N-WFGWX-YVC9B-4J6C9-T83GX".to_string(),
            ..NewWindowsKey::default()
        };
        assert!(key.validate().is_ok());
    }
}
