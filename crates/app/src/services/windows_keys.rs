//! Windows keys service — product keys and the images they apply to.
//!
//! Library-only: the REST API exposes no route for it.

use std::sync::Arc;

use fog_domain::error::FogError;
use fog_domain::id::RecordId;
use fog_domain::windows_key::{KeyFilter, NewWindowsKey, WindowsKey};

use crate::ports::WindowsKeyStore;

pub struct WindowsKeyService<W> {
    store: Arc<W>,
}

impl<W: WindowsKeyStore + Send + Sync> WindowsKeyService<W> {
    pub fn new(store: Arc<W>) -> Self {
        Self { store }
    }

    /// Store a new key.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the name or key is empty, or a
    /// storage error.
    pub async fn create(&self, key: NewWindowsKey) -> Result<WindowsKey, FogError> {
        key.validate()?;
        let stored = self.store.create(key).await?;
        tracing::info!(id = %stored.id, name = %stored.name, "windows key created");
        Ok(stored)
    }

    /// # Errors
    ///
    /// Returns a storage error propagated from the store.
    pub async fn list(&self) -> Result<Vec<WindowsKey>, FogError> {
        self.store.list().await
    }

    /// Apply a key to each image in `images`.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the store.
    pub async fn assign(&self, key: RecordId, images: &[RecordId]) -> Result<(), FogError> {
        let current = self.store.images_for(key).await?;
        for image in images.iter().filter(|image| !current.contains(image)) {
            self.store.associate(key, *image).await?;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns a storage error propagated from the store.
    pub async fn images_for(&self, key: RecordId) -> Result<Vec<RecordId>, FogError> {
        self.store.images_for(key).await
    }

    /// Remove matching keys and their image links.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the store.
    pub async fn destroy(&self, filter: KeyFilter) -> Result<u64, FogError> {
        let removed = self.store.destroy(filter).await?;
        tracing::info!(removed, "windows keys destroyed");
        Ok(removed)
    }
}
