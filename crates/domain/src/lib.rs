//! # fog-domain
//!
//! Pure domain model for the FOG imaging API.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Records** (class name + id + whitelisted JSON fields) and the
//!   loose comparison rules used to filter them
//! - Define the **Catalog** of known classes, their permitted and required
//!   fields, and the valid / tasking / active dispatch lists
//! - Define the **task vocabulary** (states, task type traits)
//! - Define **MAC addresses**, **user credentials** and **Windows keys**
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;
pub mod value;

pub mod catalog;
pub mod mac;
pub mod record;
pub mod task;
pub mod user;
pub mod windows_key;
