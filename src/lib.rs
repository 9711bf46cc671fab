//! ResponseBank HTTP response caching core

pub mod bank;
pub mod cache;
pub mod compression;
pub mod config;
pub mod logging;

pub use bank::{CachedResponse, FillOutcome, ResponseBank};
pub use cache::{CacheError, KeyDescriptor, KeyValue, Scalar, StructuredKey};
pub use compression::{CompressedArtifact, CompressionError, Encoding, StreamingError};
pub use config::ResponseBankConfig;
