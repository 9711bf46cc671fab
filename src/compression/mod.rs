//! Response body compression
//!
//! - [`encoding`] - Content encodings (gzip, br, caller-supplied others)
//! - [`negotiation`] - Accept-Encoding negotiation
//! - [`compress`] - Whole-buffer codec and compressed artifacts
//! - [`stream`] - Live gzip streaming with a cacheable side artifact
//! - [`error`] - Error types

pub mod compress;
pub mod encoding;
pub mod error;
pub mod negotiation;
pub mod stream;

pub use compress::{
    compress, compress_artifact, decompress, decompress_limited, scrub_gzip_timestamp,
    CompressedArtifact,
};
pub use encoding::Encoding;
pub use error::{CompressionError, StreamingError};
pub use negotiation::negotiate;
pub use stream::{compress_stream, run, run_stream, StreamSession};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_module_exports() {
        let _: Encoding = Encoding::Gzip;
        let _: CompressionError = CompressionError::UnsupportedEncoding("test".to_string());
        let _ = negotiate(None, &Encoding::Brotli);
    }
}
