//! # fog-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the port traits defined in `fog-app::ports`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between records and database rows
//!
//! ## Dependency rule
//! Depends on `fog-app` (for port traits) and `fog-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod error;
pub mod pool;
pub mod record_repo;
pub mod windows_keys;

pub use pool::{Config, Database};
pub use record_repo::SqliteRecordRepository;
pub use windows_keys::SqliteWindowsKeyStore;
