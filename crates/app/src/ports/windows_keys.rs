//! Windows keys port — the plugin's own tables.

use std::future::Future;

use fog_domain::error::FogError;
use fog_domain::id::RecordId;
use fog_domain::windows_key::{KeyFilter, NewWindowsKey, WindowsKey};

/// Schema management and storage for the `windowskeys` plugin.
pub trait WindowsKeyStore {
    /// Drop and recreate the key and association tables.
    fn install(&self) -> impl Future<Output = Result<(), FogError>> + Send;

    /// Drop the association table, then the key table.
    fn uninstall(&self) -> impl Future<Output = Result<(), FogError>> + Send;

    /// Remove matching keys together with their image associations.
    fn destroy(&self, filter: KeyFilter) -> impl Future<Output = Result<u64, FogError>> + Send;

    fn create(
        &self,
        key: NewWindowsKey,
    ) -> impl Future<Output = Result<WindowsKey, FogError>> + Send;

    fn list(&self) -> impl Future<Output = Result<Vec<WindowsKey>, FogError>> + Send;

    /// Link a key to an image.
    fn associate(
        &self,
        key_id: RecordId,
        image_id: RecordId,
    ) -> impl Future<Output = Result<(), FogError>> + Send;

    /// Images a key is linked to.
    fn images_for(
        &self,
        key_id: RecordId,
    ) -> impl Future<Output = Result<Vec<RecordId>, FogError>> + Send;
}
