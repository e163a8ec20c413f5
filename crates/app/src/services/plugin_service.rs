//! Plugin service — install and uninstall the bundled plugins.

use std::sync::Arc;

use serde_json::Value;

use fog_domain::error::{FogError, ValidationError};
use fog_domain::record::{Fields, Filter, Record};

use crate::ports::{RecordRepository, WindowsKeyStore};

/// Plugins this build ships with.
pub const KNOWN_PLUGINS: &[&str] = &["location", "windowskeys"];

/// Keeps `plugin` records and plugin schemas in step.
pub struct PluginService<R, W> {
    repo: Arc<R>,
    windows_keys: Arc<W>,
}

impl<R, W> PluginService<R, W>
where
    R: RecordRepository + Send + Sync,
    W: WindowsKeyStore + Send + Sync,
{
    pub fn new(repo: Arc<R>, windows_keys: Arc<W>) -> Self {
        Self { repo, windows_keys }
    }

    /// Create the plugin's schema and mark it installed and active.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownPlugin`] for names outside
    /// [`KNOWN_PLUGINS`], or a storage error.
    pub async fn install(&self, name: &str) -> Result<Record, FogError> {
        let name = known(name)?;
        if name == "windowskeys" {
            self.windows_keys.install().await?;
        }
        tracing::info!(plugin = name, "plugin installed");
        self.mark(name, true).await
    }

    /// Drop the plugin's schema and mark it inactive.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownPlugin`] for names outside
    /// [`KNOWN_PLUGINS`], or a storage error.
    pub async fn uninstall(&self, name: &str) -> Result<Record, FogError> {
        let name = known(name)?;
        if name == "windowskeys" {
            self.windows_keys.uninstall().await?;
        }
        tracing::info!(plugin = name, "plugin uninstalled");
        self.mark(name, false).await
    }

    async fn mark(&self, name: &str, on: bool) -> Result<Record, FogError> {
        let flag = i64::from(on);
        let existing = self
            .repo
            .find("plugin", &Filter::new().equals("name", name))
            .await?
            .into_iter()
            .next();
        match existing {
            Some(mut plugin) => {
                plugin.set("installed", flag).set("state", flag);
                self.repo.update(plugin).await
            }
            None => {
                let mut fields = Fields::new();
                fields.insert("name".to_string(), Value::from(name));
                fields.insert("installed".to_string(), Value::from(flag));
                fields.insert("state".to_string(), Value::from(flag));
                self.repo.insert("plugin", fields).await
            }
        }
    }
}

fn known(name: &str) -> Result<&'static str, FogError> {
    let lowered = name.trim().to_ascii_lowercase();
    KNOWN_PLUGINS
        .iter()
        .copied()
        .find(|plugin| *plugin == lowered)
        .ok_or_else(|| ValidationError::UnknownPlugin(name.to_string()).into())
}
