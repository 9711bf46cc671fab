//! Per-key fill locks
//!
//! Avoiding duplicate concurrent computation of the same cached value is the
//! lock collaborator's job. The cache only hands it a canonical key and skips
//! the fill when the answer is `Busy`; there is no retry loop here.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::error::CacheError;

/// Result of asking for a fill lock
#[derive(Debug)]
pub enum LockOutcome {
    /// Caller owns the key until the guard is dropped
    Acquired(LockGuard),
    /// Someone else is filling this key
    Busy,
}

impl LockOutcome {
    pub fn is_acquired(&self) -> bool {
        matches!(self, LockOutcome::Acquired(_))
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, LockOutcome::Busy)
    }
}

type ReleaseFn = Box<dyn FnOnce() + Send + Sync>;

/// Held lock; releases on drop
pub struct LockGuard {
    key: String,
    release: Option<ReleaseFn>,
}

impl LockGuard {
    /// A guard with nothing to release (e.g. the lock expires on its own)
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            release: None,
        }
    }

    /// A guard that runs `release` when dropped
    pub fn with_release(key: impl Into<String>, release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            key: key.into(),
            release: Some(Box::new(release)),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard").field("key", &self.key).finish()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Distributed (or local) mutual exclusion per cache key
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LockProvider: Send + Sync {
    /// Try to take the fill lock for `key` without waiting
    async fn acquire(&self, key: &str) -> Result<LockOutcome, CacheError>;
}

/// Always grants the lock. For deployments that tolerate duplicate fills.
#[derive(Debug, Default, Clone)]
pub struct NoopLockProvider;

#[async_trait]
impl LockProvider for NoopLockProvider {
    async fn acquire(&self, key: &str) -> Result<LockOutcome, CacheError> {
        Ok(LockOutcome::Acquired(LockGuard::new(key)))
    }
}

/// Process-local try-lock keyed by canonical cache key
#[derive(Debug, Default, Clone)]
pub struct LocalLockProvider {
    held: Arc<Mutex<HashSet<String>>>,
}

impl LocalLockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently locked
    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }
}

#[async_trait]
impl LockProvider for LocalLockProvider {
    async fn acquire(&self, key: &str) -> Result<LockOutcome, CacheError> {
        if !self.held.lock().insert(key.to_string()) {
            return Ok(LockOutcome::Busy);
        }

        let held = Arc::clone(&self.held);
        let owned_key = key.to_string();
        Ok(LockOutcome::Acquired(LockGuard::with_release(key, move || {
            held.lock().remove(&owned_key);
        })))
    }
}
