//! Application services — use-case implementations.
//!
//! Each service struct accepts port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.

pub mod auth_service;
pub mod plugin_service;
pub mod presenter;
pub mod record_service;
pub mod relations;
pub mod settings;
pub mod storage_selection;
pub mod tasking;
pub mod windows_keys;
