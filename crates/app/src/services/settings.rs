//! Settings service — global configuration stored as `service` records.

use std::sync::Arc;

use serde_json::Value;

use fog_domain::error::FogError;
use fog_domain::record::{Fields, Filter, Record};
use fog_domain::value::is_truthy;

use crate::lookup;
use crate::ports::RecordRepository;

pub const API_ENABLED: &str = "FOG_API_ENABLED";
pub const API_TOKEN: &str = "FOG_API_TOKEN";
pub const SNAPIN_LOCATION_SEND_ENABLED: &str = "FOG_SNAPIN_LOCATION_SEND_ENABLED";
pub const WEB_HOST: &str = "FOG_WEB_HOST";

/// Reads and seeds named settings.
pub struct SettingsService<R> {
    repo: Arc<R>,
}

impl<R: RecordRepository> SettingsService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Current value of a setting.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn get(&self, name: &str) -> Result<Option<String>, FogError> {
        lookup::setting(&*self.repo, name).await
    }

    /// Whether a setting holds a truthy value; unset settings are off.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn is_enabled(&self, name: &str) -> Result<bool, FogError> {
        Ok(self
            .get(name)
            .await?
            .is_some_and(|value| is_truthy(&Value::from(value))))
    }

    /// Create or overwrite a setting.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn set(&self, name: &str, value: &str) -> Result<Record, FogError> {
        match self.find(name).await? {
            Some(mut record) => {
                record.set("value", value);
                self.repo.update(record).await
            }
            None => self.repo.insert("service", Self::fields(name, value)).await,
        }
    }

    /// Insert every setting that does not exist yet; existing values are kept.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn ensure_defaults(&self, defaults: &[(&str, &str)]) -> Result<(), FogError> {
        for (name, value) in defaults {
            if self.find(name).await?.is_none() {
                tracing::info!(setting = %name, "seeding setting");
                self.repo.insert("service", Self::fields(name, value)).await?;
            }
        }
        Ok(())
    }

    async fn find(&self, name: &str) -> Result<Option<Record>, FogError> {
        let found = self
            .repo
            .find("service", &Filter::new().equals("name", name))
            .await?;
        Ok(found.into_iter().next())
    }

    fn fields(name: &str, value: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert("name".to_string(), Value::from(name));
        fields.insert("value".to_string(), Value::from(value));
        fields.insert("category".to_string(), Value::from("API System"));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryRecords;

    fn service() -> (Arc<InMemoryRecords>, SettingsService<InMemoryRecords>) {
        let repo = Arc::new(InMemoryRecords::default());
        (Arc::clone(&repo), SettingsService::new(repo))
    }

    #[tokio::test]
    async fn should_treat_unset_setting_as_disabled() {
        let (_, settings) = service();
        assert!(!settings.is_enabled(API_ENABLED).await.unwrap());
        assert!(settings.get(API_TOKEN).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_seed_defaults_only_once() {
        let (repo, settings) = service();
        settings
            .ensure_defaults(&[(API_ENABLED, "1"), (API_TOKEN, "abc")])
            .await
            .unwrap();
        settings.set(API_TOKEN, "changed").await.unwrap();
        settings
            .ensure_defaults(&[(API_ENABLED, "1"), (API_TOKEN, "abc")])
            .await
            .unwrap();

        assert_eq!(repo.all("service").len(), 2);
        assert_eq!(settings.get(API_TOKEN).await.unwrap().as_deref(), Some("changed"));
        assert!(settings.is_enabled(API_ENABLED).await.unwrap());
    }

    #[tokio::test]
    async fn should_treat_zero_as_disabled() {
        let (_, settings) = service();
        settings.set(API_ENABLED, "0").await.unwrap();
        assert!(!settings.is_enabled(API_ENABLED).await.unwrap());
    }
}
