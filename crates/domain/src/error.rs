//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`FogError`]
//! via `#[from]`; adapters map the variants onto transport status codes.

/// Top-level error shared by the application and its adapters.
#[derive(Debug, thiserror::Error)]
pub enum FogError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("{0}")]
    Tasking(#[from] TaskingError),

    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Input that violates a domain rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Already created")]
    AlreadyCreated,

    #[error("Required database field is empty: {0}")]
    MissingRequiredField(String),

    #[error("Invalid MAC address: {0}")]
    InvalidMac(String),

    #[error("Invalid tasking type passed")]
    InvalidTaskType,

    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    #[error("Unknown class: {0}")]
    UnknownClass(String),

    #[error("Unknown plugin: {0}")]
    UnknownPlugin(String),

    #[error("name cannot be empty")]
    EmptyName,
}

/// A referenced record does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{class} {id} not found")]
pub struct NotFoundError {
    pub class: String,
    pub id: String,
}

impl NotFoundError {
    #[must_use]
    pub fn new(class: impl Into<String>, id: impl ToString) -> Self {
        Self {
            class: class.into(),
            id: id.to_string(),
        }
    }
}

/// The caller could not be authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid API token")]
    InvalidApiToken,

    #[error("Invalid credentials")]
    InvalidCredentials,
}

/// A tasking request could not be fulfilled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskingError {
    #[error("Host {host} is already a member of an active task")]
    ActiveTaskExists { host: String },

    #[error("Host {host} has no image assigned")]
    NoImage { host: String },

    #[error("Tasking is not supported for {0}")]
    Unsupported(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_render_already_created_message() {
        let err: FogError = ValidationError::AlreadyCreated.into();
        assert_eq!(err.to_string(), "Already created");
    }

    #[test]
    fn should_render_not_found_with_class_and_id() {
        let err = NotFoundError::new("host", 7);
        assert_eq!(err.to_string(), "host 7 not found");
    }

    #[test]
    fn should_wrap_auth_error_transparently() {
        let err: FogError = AuthError::InvalidApiToken.into();
        assert!(matches!(err, FogError::Auth(AuthError::InvalidApiToken)));
        assert_eq!(err.to_string(), "Invalid API token");
    }
}
