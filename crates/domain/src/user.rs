//! User credentials — salted password hashes and API access.

use sha2::{Digest, Sha256};

use crate::record::Record;

const SCHEME: &str = "sha256";

/// Hash a password with a fresh random salt.
///
/// The result has the form `sha256$<salt>$<hex digest>` and is what the
/// `password` field of a `user` record stores.
#[must_use]
pub fn hash_password(password: &str) -> String {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    hash_with_salt(password, &salt)
}

fn hash_with_salt(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("{SCHEME}${salt}${digest}")
}

/// Check a password against a stored hash.
#[must_use]
pub fn verify_password(stored: &str, password: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(SCHEME), Some(salt), Some(_)) => hash_with_salt(password, salt) == stored,
        _ => false,
    }
}

/// Read-only view of a `user` record.
#[derive(Debug, Clone, Copy)]
pub struct UserView<'a>(pub &'a Record);

impl UserView<'_> {
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.name()
    }

    /// Whether the user may authenticate with a personal API token.
    #[must_use]
    pub fn api_enabled(&self) -> bool {
        self.0.flag("api")
    }

    #[must_use]
    pub fn check_password(&self, password: &str) -> bool {
        verify_password(&self.0.text("password"), password)
    }

    #[must_use]
    pub fn check_token(&self, token: &str) -> bool {
        let stored = self.0.text("token");
        !stored.is_empty() && stored == token
    }
}
