//! Request metering: who is calling, are they within their limit, and how
//! many billable requests have they made.

pub mod authenticator;

pub use authenticator::{AuthError, Authenticator, Authorization};

use tracing::info;

use crate::config::{RateLimitConfig, SeedKey};
use crate::db::{ApiKeyRecord, StoreError, UsageStore};

/// Provision the configured seed keys with the configured rate limit.
///
/// Existing keys keep their usage counters.
pub async fn provision_seed_keys(
    store: &dyn UsageStore,
    seeds: &[SeedKey],
    config: &RateLimitConfig,
) -> Result<Vec<ApiKeyRecord>, StoreError> {
    let mut records = Vec::with_capacity(seeds.len());
    for seed in seeds {
        let record = store
            .provision(&seed.key, &seed.owner, config.requests_per_minute)
            .await?;
        records.push(record);
    }

    info!(
        count = records.len(),
        rate_limit = config.requests_per_minute,
        backend = store.backend(),
        "Seed API keys provisioned"
    );

    Ok(records)
}
