//! # fog-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve the **JSON API** under a configurable base path
//!   (`/fog/host`, `/fog/host/12/task`, `/fog/system/status`, …)
//! - Authenticate callers with the system API token plus HTTP Basic
//!   credentials or a personal user token
//! - Map HTTP requests into application service calls (driving adapter)
//! - Map application results and errors into HTTP responses
//!
//! ## Dependency rule
//! Depends on `fog-app` (for port traits and services) and `fog-domain`
//! (for domain types used in request/response mapping). Never leaks axum types
//! into the domain.

pub mod api;
pub mod auth;
pub mod error;
pub mod route;
pub mod router;
pub mod state;
