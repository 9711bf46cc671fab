//! Cache keys and the external collaborators behind the cache
//!
//! - [`key`] - Key descriptors, canonical keys and entity tags
//! - [`store`] - Backing store interface and an in-memory store
//! - [`lock`] - Per-key fill lock interface
//! - [`error`] - Error types

pub mod error;
pub mod key;
pub mod lock;
pub mod store;

pub use error::CacheError;
pub use key::{canonicalize, storage_key, KeyDescriptor, KeyValue, Scalar, StructuredKey};
pub use lock::{LocalLockProvider, LockGuard, LockOutcome, LockProvider, NoopLockProvider};
pub use store::{BackingStore, MemoryStore};
