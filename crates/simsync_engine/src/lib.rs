//! # simsync engine
//!
//! Optimistic synchronization of remote entities.
//!
//! This crate provides:
//! - `Entity`, the trait a synchronized value implements
//! - `ResourceStore`, the keyed dictionary of entity states with revisions
//!   and change subscriptions
//! - `Synchronizer`, the `load`/`create`/`save`/`delete` verbs for one
//!   collection plus local `mutate`, `discard` and `clear_error`
//! - `LoadPlan`, which batches the loads a view needs
//!
//! ## Architecture
//!
//! Each verb runs in two halves:
//! 1. A synchronous optimistic transition in the store (e.g. `Saveable` to
//!    `Saving`), after which the request is issued
//! 2. A spawned reconciliation that applies the outcome to whatever the
//!    entry holds when the response arrives
//!
//! ## Key Invariants
//!
//! - Every store transition gets a fresh, monotonically increasing revision
//! - A completion whose entry moved on never overwrites the newer state
//! - No local edit is lost to a stale or failed response
//! - A save completion beats a concurrent load
//! - Failures are stored in the entry, never raised past the synchronizer

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entity;
mod plan;
mod store;
mod synchronizer;

pub use entity::{Entity, EntityState, BRIEF_FIELDS};
pub use plan::LoadPlan;
pub use store::{Entry, EventKind, ResourceStore, StoreEvent, Transition};
pub use synchronizer::Synchronizer;

pub use simsync_state::{AsyncState, ResourceKey, StateTag, SyncError, SyncResult};
