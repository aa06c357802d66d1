//! Persistence for API keys, usage counters and rate windows
//!
//! The SQLite file is the source of truth. Everything above this module talks
//! to it through the [`UsageStore`] trait.

pub mod api_keys;
pub mod models;
pub mod pool;
pub mod store;
pub mod usage;

pub use models::{key_prefix, ApiKeyRecord, RateLimitStatus};
pub use pool::{DbPool, StorageError};
pub use store::{MemoryUsageStore, SqliteUsageStore, StoreError, UsageStore};

#[cfg(test)]
pub use store::FailingUsageStore;
