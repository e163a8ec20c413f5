//! Auth service — API token and user credential checks.

use std::sync::Arc;

use serde_json::Value;

use fog_domain::error::{AuthError, FogError};
use fog_domain::record::{Fields, Filter, Record};
use fog_domain::time::{now, to_field};
use fog_domain::user::{UserView, hash_password};

use super::settings::{API_ENABLED, API_TOKEN, SettingsService};
use crate::ports::RecordRepository;

/// What a caller presented, already decoded from transport encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// System-wide API token.
    pub api_token: Option<String>,
    /// User name and password.
    pub basic: Option<(String, String)>,
    /// Personal API token of a user.
    pub user_token: Option<String>,
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user: String,
}

/// Authenticates API callers against settings and `user` records.
pub struct AuthService<R> {
    repo: Arc<R>,
    settings: SettingsService<R>,
}

impl<R: RecordRepository> AuthService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self {
            settings: SettingsService::new(Arc::clone(&repo)),
            repo,
        }
    }

    /// Whether the API accepts requests at all.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn api_enabled(&self) -> Result<bool, FogError> {
        self.settings.is_enabled(API_ENABLED).await
    }

    /// Check the system token, then the user's password or personal token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidApiToken`] when the system token does not
    /// match, [`AuthError::InvalidCredentials`] when no user matches, or a
    /// storage error.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<Principal, FogError> {
        let expected = self.settings.get(API_TOKEN).await?.unwrap_or_default();
        match &credentials.api_token {
            Some(token) if !expected.is_empty() && *token == expected => {}
            _ => return Err(AuthError::InvalidApiToken.into()),
        }

        if let Some((name, password)) = &credentials.basic
            && let Some(user) = self.find_user(name).await?
            && UserView(&user).check_password(password)
        {
            tracing::debug!(user = %name, "authenticated with password");
            return Ok(Principal { user: user.name().to_string() });
        }

        if let Some(token) = &credentials.user_token {
            let users = self.repo.find("user", &Filter::new()).await?;
            let matched = users.iter().find(|user| {
                let view = UserView(user);
                view.api_enabled() && view.check_token(token)
            });
            if let Some(user) = matched {
                tracing::debug!(user = %user.name(), "authenticated with user token");
                return Ok(Principal { user: user.name().to_string() });
            }
        }

        Err(AuthError::InvalidCredentials.into())
    }

    /// Create the user if missing. An existing user is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn ensure_user(
        &self,
        name: &str,
        password: &str,
        token: Option<&str>,
    ) -> Result<Record, FogError> {
        if let Some(user) = self.find_user(name).await? {
            return Ok(user);
        }
        let mut fields = Fields::new();
        fields.insert("name".to_string(), Value::from(name));
        fields.insert("password".to_string(), Value::from(hash_password(password)));
        fields.insert("createdTime".to_string(), Value::from(to_field(now())));
        fields.insert("createdBy".to_string(), Value::from("fogd"));
        if let Some(token) = token {
            fields.insert("token".to_string(), Value::from(token));
            fields.insert("api".to_string(), Value::from(1));
        }
        tracing::info!(user = %name, "creating user");
        self.repo.insert("user", fields).await
    }

    async fn find_user(&self, name: &str) -> Result<Option<Record>, FogError> {
        let users = self.repo.find("user", &Filter::new()).await?;
        Ok(users
            .into_iter()
            .find(|user| user.name().eq_ignore_ascii_case(name)))
    }
}
