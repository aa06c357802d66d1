//! API key authentication, rate limiting and usage metering

use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::RateLimitConfig;
use crate::db::{key_prefix, ApiKeyRecord, RateLimitStatus, StorageError, StoreError, UsageStore};

/// Why a request was not authorized
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing API key")]
    MissingKey,
    #[error("Invalid API key")]
    InvalidKey,
    #[error("Rate limit exceeded")]
    RateLimited(RateLimitStatus),
    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AuthError::InvalidKey,
            StoreError::Storage(e) => AuthError::Storage(e),
        }
    }
}

/// A request that passed authentication and the rate limit, and was billed
#[derive(Debug, Clone)]
pub struct Authorization {
    pub key: String,
    pub owner: String,
    /// Usage counter including this request
    pub total_requests: u64,
    pub rate_limit: RateLimitStatus,
}

/// Resolves API keys and meters requests against a [`UsageStore`]
#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn UsageStore>,
    config: RateLimitConfig,
}

impl Authenticator {
    pub fn new(store: Arc<dyn UsageStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    #[cfg(test)]
    pub fn store(&self) -> &Arc<dyn UsageStore> {
        &self.store
    }

    #[cfg(test)]
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Authorize a billable request
    pub async fn authorize(&self, key: &str) -> Result<Authorization, AuthError> {
        self.authorize_at(key, Utc::now()).await
    }

    /// Authorize a billable request at a given instant.
    ///
    /// Admission against the key's rate window and the usage increment are a
    /// single store operation. A rejected request is not counted.
    pub async fn authorize_at(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Authorization, AuthError> {
        if key.is_empty() {
            return Err(AuthError::MissingKey);
        }

        let admission = self
            .store
            .admit(key, self.config.window, now)
            .await
            .map_err(|e| self.log_store_error(key, e))?;

        if !admission.status.allowed {
            warn!(
                key_prefix = %key_prefix(key),
                limit = admission.status.limit,
                reset_at = %admission.status.reset_at,
                "Rate limit exceeded"
            );
            return Err(AuthError::RateLimited(admission.status));
        }

        debug!(
            key_prefix = %key_prefix(key),
            owner = %admission.record.owner,
            total_requests = admission.total_requests,
            "Request authorized"
        );

        Ok(Authorization {
            key: admission.record.key,
            owner: admission.record.owner,
            total_requests: admission.total_requests,
            rate_limit: admission.status,
        })
    }

    /// Resolve a key without metering: no rate window entry, no usage count.
    pub async fn authenticate(&self, key: &str) -> Result<ApiKeyRecord, AuthError> {
        if key.is_empty() {
            return Err(AuthError::MissingKey);
        }

        self.store
            .get_key(key)
            .await
            .map_err(|e| self.log_store_error(key, e))
    }

    fn log_store_error(&self, key: &str, err: StoreError) -> AuthError {
        match &err {
            StoreError::NotFound => {
                warn!(key_prefix = %key_prefix(key), "API key not found");
            }
            StoreError::Storage(e) => {
                error!(error = %e, backend = self.store.backend(), "Usage store failure");
            }
        }
        AuthError::from(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DbPool, FailingUsageStore, MemoryUsageStore, SqliteUsageStore};
    use chrono::TimeZone;
    use std::time::Duration;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    async fn authenticators(limit: u32) -> Vec<Authenticator> {
        let stores: Vec<Arc<dyn UsageStore>> = vec![
            Arc::new(SqliteUsageStore::new(DbPool::open_in_memory().unwrap())),
            Arc::new(MemoryUsageStore::new()),
        ];

        let mut result = Vec::new();
        for store in stores {
            store.provision("test-key", "Test User", limit).await.unwrap();
            result.push(Authenticator::new(store, RateLimitConfig::per_minute(limit)));
        }
        result
    }

    #[tokio::test]
    async fn test_missing_key() {
        for auth in authenticators(60).await {
            assert!(matches!(auth.authorize("").await, Err(AuthError::MissingKey)));
            assert!(matches!(auth.authenticate("").await, Err(AuthError::MissingKey)));
        }
    }

    #[tokio::test]
    async fn test_invalid_key() {
        for auth in authenticators(60).await {
            for _ in 0..3 {
                assert!(matches!(auth.authorize("nonexistent").await, Err(AuthError::InvalidKey)));
            }
            assert!(matches!(auth.authenticate("nonexistent").await, Err(AuthError::InvalidKey)));
            assert_eq!(auth.store().get_total("test-key").await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn test_authorize_returns_owner_and_counts() {
        for auth in authenticators(60).await {
            let first = auth.authorize("test-key").await.unwrap();
            assert_eq!(first.owner, "Test User");
            assert_eq!(first.key, "test-key");
            assert_eq!(first.total_requests, 1);
            assert_eq!(first.rate_limit.remaining(), 59);

            let second = auth.authorize("test-key").await.unwrap();
            assert_eq!(second.total_requests, 2);
        }
    }

    #[tokio::test]
    async fn test_61st_request_is_rate_limited_and_not_billed() {
        for auth in authenticators(60).await {
            for i in 0..60 {
                tokio_test::assert_ok!(auth.authorize_at("test-key", at(i % 30)).await);
            }

            match auth.authorize_at("test-key", at(45)).await {
                Err(AuthError::RateLimited(status)) => {
                    assert_eq!(status.limit, 60);
                    assert_eq!(status.remaining(), 0);
                    assert_eq!(status.reset_at, at(60));
                }
                other => panic!("expected RateLimited, got {other:?}"),
            }

            assert_eq!(auth.store().get_total("test-key").await.unwrap(), 60);
        }
    }

    #[tokio::test]
    async fn test_window_expiry_readmits() {
        for auth in authenticators(2).await {
            tokio_test::assert_ok!(auth.authorize_at("test-key", at(0)).await);
            tokio_test::assert_ok!(auth.authorize_at("test-key", at(1)).await);
            tokio_test::assert_err!(auth.authorize_at("test-key", at(59)).await);

            let next = auth.authorize_at("test-key", at(60)).await.unwrap();
            assert_eq!(next.total_requests, 3);
            assert_eq!(auth.config().window, Duration::from_secs(60));
        }
    }

    #[tokio::test]
    async fn test_authenticate_does_not_meter() {
        for auth in authenticators(1).await {
            for _ in 0..5 {
                let record = auth.authenticate("test-key").await.unwrap();
                assert_eq!(record.owner, "Test User");
            }
            assert_eq!(auth.store().get_total("test-key").await.unwrap(), 0);

            // the single slot in the window is still free
            tokio_test::assert_ok!(auth.authorize("test-key").await);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_are_counted_exactly() {
        for auth in authenticators(100).await {
            let handles: Vec<_> = (0..100)
                .map(|_| {
                    let auth = auth.clone();
                    tokio::spawn(async move { auth.authorize("test-key").await })
                })
                .collect();

            for result in futures::future::join_all(handles).await {
                tokio_test::assert_ok!(result.unwrap());
            }

            assert_eq!(auth.store().get_total("test-key").await.unwrap(), 100);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_never_exceed_limit() {
        for auth in authenticators(25).await {
            let handles: Vec<_> = (0..80)
                .map(|_| {
                    let auth = auth.clone();
                    tokio::spawn(async move { auth.authorize("test-key").await })
                })
                .collect();

            let mut admitted = 0;
            let mut limited = 0;
            for result in futures::future::join_all(handles).await {
                match result.unwrap() {
                    Ok(_) => admitted += 1,
                    Err(AuthError::RateLimited(_)) => limited += 1,
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }

            assert_eq!(admitted, 25);
            assert_eq!(limited, 55);
            assert_eq!(auth.store().get_total("test-key").await.unwrap(), 25);
        }
    }

    #[tokio::test]
    async fn test_storage_failure_is_propagated() {
        let broken = Authenticator::new(
            Arc::new(FailingUsageStore { fail_lookups: true }),
            RateLimitConfig::default(),
        );
        assert!(matches!(broken.authorize("test-key").await, Err(AuthError::Storage(_))));
        assert!(matches!(broken.authenticate("test-key").await, Err(AuthError::Storage(_))));

        // A failed admission is never treated as an unknown key or a free pass
        let counters_down = Authenticator::new(
            Arc::new(FailingUsageStore { fail_lookups: false }),
            RateLimitConfig::default(),
        );
        assert!(matches!(counters_down.authorize("test-key").await, Err(AuthError::Storage(_))));
        tokio_test::assert_ok!(counters_down.authenticate("test-key").await);
    }
}
