//! Compression error types

use thiserror::Error;

/// Errors that can occur during compression/decompression operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompressionError {
    /// Encoding outside of gzip/br was requested
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Compression failed: {0}")]
    CompressionFailed(String),

    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),

    /// The downstream chunk sink refused a compressed chunk
    #[error("Chunk sink failed: {0}")]
    SinkFailed(String),
}

impl CompressionError {
    /// Maps compression errors to HTTP status codes
    ///
    /// - UnsupportedEncoding → 500 (a server-side programming error, not a client mistake)
    /// - CompressionFailed → 500
    /// - DecompressionFailed → 502 (stored payload is unreadable)
    /// - SinkFailed → 499 (client went away mid-stream)
    pub fn to_http_status(&self) -> u16 {
        match self {
            CompressionError::UnsupportedEncoding(_) => 500,
            CompressionError::CompressionFailed(_) => 500,
            CompressionError::DecompressionFailed(_) => 502,
            CompressionError::SinkFailed(_) => 499,
        }
    }
}

/// Failure of a streaming compression run
///
/// The live stream has already been finalized by the time this is returned.
#[derive(Error, Debug)]
pub enum StreamingError<E> {
    /// The body producer failed mid-stream
    #[error("body producer failed: {0}")]
    Producer(E),

    #[error(transparent)]
    Compression(#[from] CompressionError),
}
