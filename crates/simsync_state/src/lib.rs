//! # simsync state
//!
//! Synchronization status of remote entities.
//!
//! This crate provides:
//! - `ResourceKey` (collection + id) identifying one synchronized entity
//! - `AsyncState<Brief, Value>`, the tagged union describing where an entity
//!   is in its load/create/save/delete lifecycle
//! - `mutate`, the copy-on-write draft mutator that turns a loaded value into
//!   a pending `Saveable` edit
//! - `SyncError`, the error taxonomy stored inside the `*Failed` states
//!
//! This is a pure data crate with no I/O operations.
//!
//! ## Key Invariants
//!
//! - Exactly one state tag is active at any instant
//! - `original` in `Saveable`/`Saving`/`SaveFailed` is the last persisted value
//! - `Saveable` is only reachable through a draft mutation or save reconciliation
//! - Failed states always retain the local value

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod key;
mod mutate;
mod state;

pub use error::{SyncError, SyncResult};
pub use key::{ParseKeyError, ResourceKey};
pub use mutate::mutate;
pub use state::{AsyncState, StateTag};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
