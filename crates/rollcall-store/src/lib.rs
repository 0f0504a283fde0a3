//! rollcall-store — SQLite-backed registry of enrolled identities.
//!
//! Identity records are created first and carry no descriptor; enrollment
//! attaches one later, and removal clears it while keeping the record.
//! The store implements [`rollcall_core::RegistryLoader`] so the matching
//! engine can take point-in-time snapshots of it.

pub mod codec;
pub mod store;

pub use store::{RegistryStore, StoreError};
