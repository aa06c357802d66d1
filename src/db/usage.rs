//! Usage counters and rate limit windows

use super::api_keys::read_record;
use super::models::{Admission, RateWindow};
use super::pool::{DbPool, StorageError};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::time::Duration;

/// Repository for usage tracking operations
#[derive(Clone)]
pub struct UsageRepository {
    pool: DbPool,
}

impl UsageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Check the key's rate window and, if there is room, record the request
    /// and bump its usage counter. All three happen in one IMMEDIATE
    /// transaction, so concurrent callers can never overshoot the limit.
    ///
    /// Returns `None` for an unknown key.
    pub async fn admit(
        &self,
        key: &str,
        window_length: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<Admission>, StorageError> {
        let key = key.to_string();

        self.pool
            .run(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                let Some(record) = read_record(&tx, &key)? else {
                    return Ok(None);
                };

                let current = read_window(&tx, &key)?;
                let (window, status) =
                    RateWindow::admit(current, now, record.rate_limit_per_minute, window_length);

                let total_requests = if status.allowed {
                    tx.execute(
                        r#"
                        INSERT INTO rate_limit_windows (key, window_start_ms, request_count)
                        VALUES (?1, ?2, ?3)
                        ON CONFLICT(key) DO UPDATE SET
                            window_start_ms = excluded.window_start_ms,
                            request_count = excluded.request_count
                        "#,
                        params![key, window.started_at.timestamp_millis(), window.count],
                    )?;
                    bump_counter(&tx, &key, now)?
                } else {
                    read_total(&tx, &key)?
                };

                tx.commit()?;

                Ok(Some(Admission {
                    record,
                    status,
                    total_requests,
                }))
            })
            .await
    }

    /// Atomically increment the counter and return the new total.
    ///
    /// Returns `None` for an unknown key.
    pub async fn increment_and_get_total(&self, key: &str) -> Result<Option<u64>, StorageError> {
        let key = key.to_string();

        self.pool
            .run(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                if read_record(&tx, &key)?.is_none() {
                    return Ok(None);
                }
                let total = bump_counter(&tx, &key, Utc::now())?;
                tx.commit()?;
                Ok(Some(total))
            })
            .await
    }

    /// Read the counter without touching it. Returns `None` for an unknown key.
    pub async fn get_total(&self, key: &str) -> Result<Option<u64>, StorageError> {
        let key = key.to_string();

        self.pool
            .run(move |conn| {
                let total: Option<i64> = conn
                    .query_row(
                        r#"
                        SELECT COALESCE(u.total_requests, 0)
                        FROM api_keys k
                        LEFT JOIN usage_counters u ON u.key = k.key
                        WHERE k.key = ?1
                        "#,
                        params![key],
                        |row| row.get(0),
                    )
                    .optional()?;
                total.map(to_u64).transpose()
            })
            .await
    }
}

fn read_window(conn: &Connection, key: &str) -> Result<Option<RateWindow>, StorageError> {
    let row: Option<(i64, u32)> = conn
        .query_row(
            "SELECT window_start_ms, request_count FROM rate_limit_windows WHERE key = ?1",
            params![key],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((start_ms, count)) = row else {
        return Ok(None);
    };

    let started_at = DateTime::<Utc>::from_timestamp_millis(start_ms).ok_or_else(|| {
        StorageError::Corrupt {
            table: "rate_limit_windows",
            detail: format!("window_start_ms {start_ms} is out of range"),
        }
    })?;

    Ok(Some(RateWindow { started_at, count }))
}

fn bump_counter(conn: &Connection, key: &str, now: DateTime<Utc>) -> Result<u64, StorageError> {
    conn.execute(
        r#"
        INSERT INTO usage_counters (key, total_requests, updated_at)
        VALUES (?1, 1, ?2)
        ON CONFLICT(key) DO UPDATE SET
            total_requests = usage_counters.total_requests + 1,
            updated_at = excluded.updated_at
        "#,
        params![key, now],
    )?;
    read_total(conn, key)
}

fn read_total(conn: &Connection, key: &str) -> Result<u64, StorageError> {
    let total: Option<i64> = conn
        .query_row(
            "SELECT total_requests FROM usage_counters WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    total.map(to_u64).transpose().map(Option::unwrap_or_default)
}

fn to_u64(value: i64) -> Result<u64, StorageError> {
    u64::try_from(value).map_err(|_| StorageError::Corrupt {
        table: "usage_counters",
        detail: format!("total_requests {value} is negative"),
    })
}
