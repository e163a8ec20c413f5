//! # fog-app
//!
//! Application layer — use-cases, hook dispatch and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `RecordRepository` — CRUD for records of every catalog class
//!   - `WindowsKeyStore` — schema and rows of the Windows keys plugin
//! - Define **driving/inbound ports** as use-case structs:
//!   - `RecordService` — list, search, get, create, edit, delete
//!   - `TaskingService` — task, active, cancel
//!   - `AuthService` — API token and user credential checks
//!   - `PluginService`, `SettingsService`, `StorageSelection`, `WindowsKeyService`
//!
//! `StorageSelection` and `WindowsKeyService` are library-only entry points:
//! no REST route reaches them. Imaging and key-management front ends embed
//! this crate and call them directly.
//! - Provide the in-process **hook manager** and the location plugin hook
//! - Orchestrate domain objects without knowing *how* persistence or IO works
//!
//! ## Dependency rule
//! Depends on `fog-domain` only.
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod hooks;
pub mod lookup;
pub mod ports;
pub mod services;

#[cfg(test)]
mod testing;
