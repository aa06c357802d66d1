//! API key database operations

use super::models::ApiKeyRecord;
use super::pool::{DbPool, StorageError};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::info;

/// Repository for API key records
#[derive(Clone)]
pub struct ApiKeyRepository {
    pool: DbPool,
}

impl ApiKeyRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a key, or refresh owner and rate limit of an existing one.
    ///
    /// `created_at` and the usage counter of an existing key are preserved.
    pub async fn provision(
        &self,
        key: &str,
        owner: &str,
        rate_limit_per_minute: u32,
    ) -> Result<ApiKeyRecord, StorageError> {
        let key = key.to_string();
        let owner = owner.to_string();

        let record = self
            .pool
            .run(move |conn| {
                let now = Utc::now();
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                tx.execute(
                    r#"
                    INSERT INTO api_keys (key, owner, rate_limit_per_minute, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?4)
                    ON CONFLICT(key) DO UPDATE SET
                        owner = excluded.owner,
                        rate_limit_per_minute = excluded.rate_limit_per_minute,
                        updated_at = excluded.updated_at
                    "#,
                    params![key, owner, rate_limit_per_minute, now],
                )?;

                tx.execute(
                    r#"
                    INSERT INTO usage_counters (key, total_requests, updated_at)
                    VALUES (?1, 0, ?2)
                    ON CONFLICT(key) DO NOTHING
                    "#,
                    params![key, now],
                )?;

                let record = read_record(&tx, &key)?
                    .ok_or(StorageError::Sqlite(rusqlite::Error::QueryReturnedNoRows))?;
                tx.commit()?;
                Ok(record)
            })
            .await?;

        info!(
            key_prefix = %record.key_prefix(),
            owner = %record.owner,
            rate_limit = record.rate_limit_per_minute,
            "Provisioned API key"
        );

        Ok(record)
    }

    /// Look up a key
    pub async fn find(&self, key: &str) -> Result<Option<ApiKeyRecord>, StorageError> {
        let key = key.to_string();
        self.pool
            .run(move |conn| Ok(read_record(conn, &key)?))
            .await
    }
}

pub(super) fn read_record(
    conn: &Connection,
    key: &str,
) -> Result<Option<ApiKeyRecord>, rusqlite::Error> {
    conn.query_row(
        r#"
        SELECT key, owner, rate_limit_per_minute, created_at
        FROM api_keys
        WHERE key = ?1
        "#,
        params![key],
        |row| {
            Ok(ApiKeyRecord {
                key: row.get("key")?,
                owner: row.get("owner")?,
                rate_limit_per_minute: row.get("rate_limit_per_minute")?,
                created_at: row.get::<_, DateTime<Utc>>("created_at")?,
            })
        },
    )
    .optional()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> ApiKeyRepository {
        ApiKeyRepository::new(DbPool::open_in_memory().unwrap())
    }

    #[tokio::test]
    async fn test_provision_and_find() {
        let repo = repo();
        let created = repo.provision("test-key", "Test User", 60).await.unwrap();
        assert_eq!(created.key, "test-key");
        assert_eq!(created.owner, "Test User");
        assert_eq!(created.rate_limit_per_minute, 60);

        let found = repo.find("test-key").await.unwrap();
        assert_eq!(found, Some(created));
    }

    #[tokio::test]
    async fn test_find_unknown_key() {
        let repo = repo();
        assert_eq!(repo.find("nonexistent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reprovision_updates_owner_and_limit() {
        let repo = repo();
        let first = repo.provision("k", "Old Owner", 10).await.unwrap();
        let second = repo.provision("k", "New Owner", 20).await.unwrap();

        assert_eq!(second.owner, "New Owner");
        assert_eq!(second.rate_limit_per_minute, 20);
        assert_eq!(second.created_at, first.created_at);
    }
}
