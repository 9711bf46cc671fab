//! Backing store interface and an in-memory implementation
//!
//! The backing store is an external collaborator: it stores raw bytes under a
//! string key with an optional TTL and owns eviction. Payloads arriving here
//! are already compressed and must be stored verbatim.

use async_trait::async_trait;
use bytes::Bytes;
use moka::Expiry;
use std::time::{Duration, Instant};

use super::error::CacheError;

/// Key-value store the cache writes compressed artifacts to
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Read a payload. `None` on miss or expiry.
    async fn read(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    /// Write a payload, replacing any previous one. `ttl: None` never expires.
    async fn write(&self, key: &str, payload: Bytes, ttl: Option<Duration>)
        -> Result<(), CacheError>;
}

#[derive(Debug, Clone)]
struct StoredPayload {
    bytes: Bytes,
    ttl: Option<Duration>,
}

/// Per-entry expiry taken from the TTL each write carries
struct PayloadExpiry;

impl Expiry<String, StoredPayload> for PayloadExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredPayload,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredPayload,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// In-process backing store backed by moka
///
/// Bounded by total payload bytes; eviction is moka's.
pub struct MemoryStore {
    cache: moka::future::Cache<String, StoredPayload>,
}

impl MemoryStore {
    pub fn new(max_capacity_bytes: u64) -> Self {
        let cache = moka::future::Cache::builder()
            .max_capacity(max_capacity_bytes)
            .weigher(|key: &String, value: &StoredPayload| {
                let size = key.len() + value.bytes.len();
                u32::try_from(size).unwrap_or(u32::MAX)
            })
            .expire_after(PayloadExpiry)
            .build();

        Self { cache }
    }

    /// Approximate number of stored payloads
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Forces moka to process pending evictions and expirations
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}

#[async_trait]
impl BackingStore for MemoryStore {
    async fn read(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        Ok(self.cache.get(key).await.map(|stored| stored.bytes))
    }

    async fn write(
        &self,
        key: &str,
        payload: Bytes,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        self.cache
            .insert(
                key.to_string(),
                StoredPayload {
                    bytes: payload,
                    ttl,
                },
            )
            .await;
        Ok(())
    }
}
