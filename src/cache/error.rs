//! Cache error types
//!
//! Store and lock failures originate in the external collaborators; this core
//! only carries them back to the caller.

use thiserror::Error;

use crate::compression::CompressionError;

#[derive(Error, Debug)]
pub enum CacheError {
    /// Backing store read/write failed
    #[error("Backing store error: {0}")]
    Store(String),

    /// Lock collaborator failed (not the same as the lock being busy)
    #[error("Lock error: {0}")]
    Lock(String),

    #[error(transparent)]
    Compression(#[from] CompressionError),

    /// The caller's body renderer failed; nothing was cached
    #[error("Render failed: {0}")]
    Render(#[source] anyhow::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_error_display() {
        assert_eq!(
            CacheError::Store("connection refused".to_string()).to_string(),
            "Backing store error: connection refused"
        );
        assert_eq!(
            CacheError::Lock("timeout".to_string()).to_string(),
            "Lock error: timeout"
        );
    }

    #[test]
    fn test_cache_error_converts_from_compression_error() {
        let err: CacheError = CompressionError::UnsupportedEncoding("zstd".to_string()).into();
        assert!(matches!(
            err,
            CacheError::Compression(CompressionError::UnsupportedEncoding(_))
        ));
        assert_eq!(err.to_string(), "Unsupported encoding: zstd");
    }

    #[test]
    fn test_render_error_keeps_source() {
        use std::error::Error;

        let err = CacheError::Render(anyhow::anyhow!("template missing"));
        assert_eq!(err.to_string(), "Render failed: template missing");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_cache_error_implements_error_trait() {
        fn assert_error<T: std::error::Error + Send + Sync + 'static>() {}
        assert_error::<CacheError>();
    }
}
