//! State store contract and backends for doorman.
//!
//! All cross-invocation coordination happens through a key-value store with
//! get / put / delete and optional per-key expiry. There are no
//! transactions and no compare-and-swap; callers are written to tolerate
//! lost read-modify-write races.

pub mod error;
pub mod keys;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use {
    error::{Error, Result},
    memory::MemoryStore,
    sqlite::SqliteStore,
    store::StateStore,
};
