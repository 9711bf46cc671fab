//! The cache context
//!
//! [`ResponseBank`] carries everything a cache call needs: configuration, the
//! backing store and the lock collaborator. Nothing here is process-global, so
//! tests build a bank per case with fakes swapped in.

use bytes::Bytes;
use futures::Stream;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::key::{storage_key, KeyDescriptor};
use crate::cache::lock::{LocalLockProvider, LockGuard, LockOutcome, LockProvider};
use crate::cache::store::{BackingStore, MemoryStore};
use crate::cache::CacheError;
use crate::compression::{
    compress_artifact, decompress_limited, negotiate, run_stream, CompressedArtifact,
    CompressionError, Encoding, StreamingError,
};
use crate::config::ResponseBankConfig;

/// A response body as stored in, or read from, the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    /// Storage key, including the encoding suffix
    pub key: String,
    /// Client-visible validator; identical across encodings
    pub entity_tag: String,
    pub artifact: CompressedArtifact,
}

impl CachedResponse {
    pub fn encoding(&self) -> &Encoding {
        self.artifact.encoding()
    }

    /// Decompressed body for clients that cannot take the stored encoding
    pub fn decoded(&self, max_size: usize) -> Result<Vec<u8>, CompressionError> {
        decompress_limited(self.artifact.bytes(), self.artifact.encoding(), max_size)
    }
}

/// What a fill attempt did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillOutcome {
    /// The artifact was written to the backing store
    Stored(CachedResponse),
    /// Another request holds the fill lock for this key
    Skipped,
    /// The body was served but could not be cached (streaming fills only)
    NotStored(String),
}

impl FillOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, FillOutcome::Stored(_))
    }
}

pub struct ResponseBank {
    config: ResponseBankConfig,
    store: Arc<dyn BackingStore>,
    locks: Arc<dyn LockProvider>,
}

impl ResponseBank {
    /// Build a bank around external collaborators
    pub fn new(
        config: ResponseBankConfig,
        store: Arc<dyn BackingStore>,
        locks: Arc<dyn LockProvider>,
    ) -> Result<Self, CacheError> {
        config.validate().map_err(CacheError::Configuration)?;
        Ok(Self {
            config,
            store,
            locks,
        })
    }

    /// Single-process bank: moka store plus process-local fill locks
    pub fn in_memory(config: ResponseBankConfig) -> Result<Self, CacheError> {
        let store = Arc::new(MemoryStore::new(config.memory_store.max_capacity_bytes));
        Self::new(config, store, Arc::new(LocalLockProvider::new()))
    }

    pub fn config(&self) -> &ResponseBankConfig {
        &self.config
    }

    pub fn log(&self, message: &str) {
        tracing::info!(target: "response_bank", "[ResponseBank] {}", message);
    }

    /// Canonical storage key for a descriptor
    pub fn cache_key_for(&self, descriptor: &KeyDescriptor) -> String {
        descriptor.canonicalize()
    }

    pub fn entity_tag(&self, descriptor: &KeyDescriptor) -> String {
        descriptor.entity_tag()
    }

    /// Negotiate against the configured default encoding
    pub fn check_encoding(&self, accept_encoding: Option<&str>) -> Encoding {
        negotiate(accept_encoding, &self.config.default_encoding)
    }

    /// Decompress a cached body within the configured size bound
    pub fn decode(&self, cached: &CachedResponse) -> Result<Vec<u8>, CompressionError> {
        cached.decoded(self.config.max_decompressed_size_bytes)
    }

    pub async fn acquire_lock(&self, key: &str) -> Result<LockOutcome, CacheError> {
        self.locks.acquire(key).await
    }

    pub async fn write_to_backing_cache_store(
        &self,
        key: &str,
        payload: Bytes,
        expires_in: Option<Duration>,
    ) -> Result<(), CacheError> {
        self.store.write(key, payload, expires_in).await
    }

    pub async fn read_from_backing_cache_store(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        self.store.read(key).await
    }

    /// Look up the cached body in the encoding this client negotiates
    pub async fn fetch(
        &self,
        descriptor: &KeyDescriptor,
        accept_encoding: Option<&str>,
    ) -> Result<Option<CachedResponse>, CacheError> {
        let encoding = self.check_encoding(accept_encoding);
        let key = storage_key(descriptor, &encoding);

        let Some(payload) = self.read_from_backing_cache_store(&key).await? else {
            tracing::debug!(key = %key, "cache miss");
            return Ok(None);
        };

        tracing::debug!(key = %key, bytes = payload.len(), "cache hit");
        Ok(Some(CachedResponse {
            key,
            entity_tag: descriptor.entity_tag(),
            artifact: CompressedArtifact::new(payload, encoding),
        }))
    }

    /// Render, compress and store a body, unless another request is already
    /// filling the same key
    ///
    /// `render` only runs once the fill lock is held.
    pub async fn fill<F, Fut>(
        &self,
        descriptor: &KeyDescriptor,
        accept_encoding: Option<&str>,
        render: F,
    ) -> Result<FillOutcome, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Vec<u8>>>,
    {
        let encoding = self.check_encoding(accept_encoding);
        let key = storage_key(descriptor, &encoding);

        let _guard = match self.acquire_lock(&key).await? {
            LockOutcome::Acquired(guard) => guard,
            LockOutcome::Busy => {
                self.log(&format!("Couldn't acquire cache lock for {}, skipping fill", key));
                return Ok(FillOutcome::Skipped);
            }
        };

        let body = render().await.map_err(CacheError::Render)?;
        let artifact = compress_artifact(&body, &encoding)?;
        self.store_artifact(key, descriptor, artifact).await
    }

    /// Stream a chunked body to the client as gzip and cache the single-shot
    /// artifact
    ///
    /// The body is served whatever the lock says; only the store write depends
    /// on holding it. Producer failures propagate after the live stream is
    /// finalized and nothing is stored.
    pub async fn stream_and_fill<P, B, E, S>(
        &self,
        descriptor: &KeyDescriptor,
        producer: P,
        sink: S,
    ) -> Result<FillOutcome, StreamingError<E>>
    where
        P: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        S: FnMut(Bytes) -> io::Result<()>,
    {
        let key = storage_key(descriptor, &Encoding::Gzip);
        let lock = self.acquire_lock(&key).await;

        let mut artifact = None;
        run_stream(producer, sink, |a| artifact = Some(a)).await?;

        let _guard: LockGuard = match lock {
            Ok(LockOutcome::Acquired(guard)) => guard,
            Ok(LockOutcome::Busy) => {
                self.log(&format!("Couldn't acquire cache lock for {}, streamed uncached", key));
                return Ok(FillOutcome::Skipped);
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "fill lock unavailable, streamed uncached");
                return Ok(FillOutcome::NotStored(e.to_string()));
            }
        };

        let Some(artifact) = artifact else {
            return Ok(FillOutcome::NotStored("stream produced no artifact".to_string()));
        };

        match self.store_artifact(key.clone(), descriptor, artifact).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to cache streamed response");
                Ok(FillOutcome::NotStored(e.to_string()))
            }
        }
    }

    async fn store_artifact(
        &self,
        key: String,
        descriptor: &KeyDescriptor,
        artifact: CompressedArtifact,
    ) -> Result<FillOutcome, CacheError> {
        self.write_to_backing_cache_store(&key, artifact.bytes().clone(), self.config.expires_in())
            .await?;

        tracing::info!(
            key = %key,
            encoding = %artifact.encoding(),
            bytes = artifact.len(),
            "cached response"
        );

        Ok(FillOutcome::Stored(CachedResponse {
            key,
            entity_tag: descriptor.entity_tag(),
            artifact,
        }))
    }
}
