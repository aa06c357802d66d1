//! The `UsageStore` seam between the metering core and persistence
//!
//! Two implementations:
//! - [`SqliteUsageStore`]: durable, everything in the SQLite file.
//! - [`MemoryUsageStore`]: process memory only, for development and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::Duration;
use thiserror::Error;

use super::api_keys::ApiKeyRepository;
use super::models::{Admission, ApiKeyRecord, RateWindow};
use super::pool::{DbPool, StorageError};
use super::usage::UsageRepository;

/// Usage store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key was never provisioned
    #[error("API key not found")]
    NotFound,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Durable per-key records, usage counters and rate windows
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Short backend name for health output and logs
    fn backend(&self) -> &'static str;

    /// Create or refresh a key. Startup provisioning only.
    async fn provision(
        &self,
        key: &str,
        owner: &str,
        rate_limit_per_minute: u32,
    ) -> Result<ApiKeyRecord, StoreError>;

    /// Resolve a key to its record. Unknown keys are never created here.
    async fn get_key(&self, key: &str) -> Result<ApiKeyRecord, StoreError>;

    /// Atomically increment the key's counter and return the new total
    async fn increment_and_get_total(&self, key: &str) -> Result<u64, StoreError>;

    /// Current counter value, read-only
    async fn get_total(&self, key: &str) -> Result<u64, StoreError>;

    /// Check-and-record against the key's own rate limit, incrementing the
    /// usage counter only when the request is admitted. Atomic per key.
    async fn admit(
        &self,
        key: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<Admission, StoreError>;
}

/// `UsageStore` backed by the SQLite file
#[derive(Clone)]
pub struct SqliteUsageStore {
    keys: ApiKeyRepository,
    usage: UsageRepository,
}

impl SqliteUsageStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            keys: ApiKeyRepository::new(pool.clone()),
            usage: UsageRepository::new(pool),
        }
    }
}

#[async_trait]
impl UsageStore for SqliteUsageStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn provision(
        &self,
        key: &str,
        owner: &str,
        rate_limit_per_minute: u32,
    ) -> Result<ApiKeyRecord, StoreError> {
        Ok(self.keys.provision(key, owner, rate_limit_per_minute).await?)
    }

    async fn get_key(&self, key: &str) -> Result<ApiKeyRecord, StoreError> {
        self.keys.find(key).await?.ok_or(StoreError::NotFound)
    }

    async fn increment_and_get_total(&self, key: &str) -> Result<u64, StoreError> {
        self.usage
            .increment_and_get_total(key)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn get_total(&self, key: &str) -> Result<u64, StoreError> {
        self.usage.get_total(key).await?.ok_or(StoreError::NotFound)
    }

    async fn admit(
        &self,
        key: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<Admission, StoreError> {
        self.usage
            .admit(key, window, now)
            .await?
            .ok_or(StoreError::NotFound)
    }
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    record: ApiKeyRecord,
    total_requests: u64,
    window: Option<RateWindow>,
}

/// `UsageStore` kept in process memory. Each key's entry lock makes the
/// check-and-record step atomic.
#[derive(Default)]
pub struct MemoryUsageStore {
    entries: DashMap<String, MemoryEntry>,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageStore for MemoryUsageStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn provision(
        &self,
        key: &str,
        owner: &str,
        rate_limit_per_minute: u32,
    ) -> Result<ApiKeyRecord, StoreError> {
        let entry = self
            .entries
            .entry(key.to_string())
            .and_modify(|entry| {
                entry.record.owner = owner.to_string();
                entry.record.rate_limit_per_minute = rate_limit_per_minute;
            })
            .or_insert_with(|| MemoryEntry {
                record: ApiKeyRecord {
                    key: key.to_string(),
                    owner: owner.to_string(),
                    rate_limit_per_minute,
                    created_at: Utc::now(),
                },
                total_requests: 0,
                window: None,
            });
        Ok(entry.record.clone())
    }

    async fn get_key(&self, key: &str) -> Result<ApiKeyRecord, StoreError> {
        self.entries
            .get(key)
            .map(|entry| entry.record.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn increment_and_get_total(&self, key: &str) -> Result<u64, StoreError> {
        let mut entry = self.entries.get_mut(key).ok_or(StoreError::NotFound)?;
        entry.total_requests += 1;
        Ok(entry.total_requests)
    }

    async fn get_total(&self, key: &str) -> Result<u64, StoreError> {
        self.entries
            .get(key)
            .map(|entry| entry.total_requests)
            .ok_or(StoreError::NotFound)
    }

    async fn admit(
        &self,
        key: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<Admission, StoreError> {
        let mut entry = self.entries.get_mut(key).ok_or(StoreError::NotFound)?;

        let limit = entry.record.rate_limit_per_minute;
        let (next, status) = RateWindow::admit(entry.window, now, limit, window);
        if status.allowed {
            entry.window = Some(next);
            entry.total_requests += 1;
        }

        Ok(Admission {
            record: entry.record.clone(),
            status,
            total_requests: entry.total_requests,
        })
    }
}

/// Store whose backend is broken, for exercising storage-failure paths
#[cfg(test)]
pub struct FailingUsageStore {
    /// Also fail key lookups, not only counter reads and writes
    pub fail_lookups: bool,
}

#[cfg(test)]
impl FailingUsageStore {
    fn failure() -> StoreError {
        StoreError::Storage(StorageError::Sqlite(rusqlite::Error::InvalidQuery))
    }
}

#[cfg(test)]
#[async_trait]
impl UsageStore for FailingUsageStore {
    fn backend(&self) -> &'static str {
        "failing"
    }

    async fn provision(&self, _key: &str, _owner: &str, _limit: u32) -> Result<ApiKeyRecord, StoreError> {
        Err(Self::failure())
    }

    async fn get_key(&self, key: &str) -> Result<ApiKeyRecord, StoreError> {
        if self.fail_lookups {
            return Err(Self::failure());
        }
        Ok(ApiKeyRecord {
            key: key.to_string(),
            owner: "Broken backend".to_string(),
            rate_limit_per_minute: 60,
            created_at: Utc::now(),
        })
    }

    async fn increment_and_get_total(&self, _key: &str) -> Result<u64, StoreError> {
        Err(Self::failure())
    }

    async fn get_total(&self, _key: &str) -> Result<u64, StoreError> {
        Err(Self::failure())
    }

    async fn admit(&self, _key: &str, _window: Duration, _now: DateTime<Utc>) -> Result<Admission, StoreError> {
        Err(Self::failure())
    }
}
