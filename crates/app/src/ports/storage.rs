//! Storage port — repository trait for generic records.

use std::future::Future;

use fog_domain::error::FogError;
use fog_domain::id::RecordId;
use fog_domain::record::{Fields, Filter, Record};

/// Persistence for records of every catalog class.
///
/// Ids are allocated per class by the repository on insert.
pub trait RecordRepository {
    /// Store a new record and return it with its assigned id.
    fn insert(
        &self,
        class: &str,
        fields: Fields,
    ) -> impl Future<Output = Result<Record, FogError>> + Send;

    /// Get a record by class and id.
    fn get(
        &self,
        class: &str,
        id: RecordId,
    ) -> impl Future<Output = Result<Option<Record>, FogError>> + Send;

    /// All records of `class` matching `filter`, ordered by id.
    fn find(
        &self,
        class: &str,
        filter: &Filter,
    ) -> impl Future<Output = Result<Vec<Record>, FogError>> + Send;

    /// Replace the fields of an existing record.
    ///
    /// Returns [`FogError::NotFound`] when the record does not exist.
    fn update(&self, record: Record) -> impl Future<Output = Result<Record, FogError>> + Send;

    /// Remove records by id, returning how many were removed.
    fn delete(
        &self,
        class: &str,
        ids: &[RecordId],
    ) -> impl Future<Output = Result<u64, FogError>> + Send;
}
