//! Storage layer for Portal Shell
//!
//! This crate provides the in-memory result cache used by the query client
//! and snapshot persistence used by the authentication store.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod persistence;

pub use cache::{CacheConfig, CacheError, MemoryCache, Weighted};
pub use persistence::{PersistenceConfig, PersistenceError, SnapshotFile};
