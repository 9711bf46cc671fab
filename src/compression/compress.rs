//! Core compression and decompression functions
use std::io::{Read, Write};

use bytes::Bytes;

use super::encoding::Encoding;
use super::error::CompressionError;

/// Gzip level used for every artifact (flate2's maximum)
pub const GZIP_LEVEL: u32 = 9;

/// Brotli quality for request-path compression; trades ratio for latency
pub const BROTLI_QUALITY: i32 = 7;

/// Brotli sliding window (log2), brotli's own default
const BROTLI_LGWIN: i32 = 22;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const GZIP_MTIME: std::ops::Range<usize> = 4..8;

/// A complete compressed body ready for the backing store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedArtifact {
    bytes: Bytes,
    encoding: Encoding,
}

impl CompressedArtifact {
    pub fn new(bytes: impl Into<Bytes>, encoding: Encoding) -> Self {
        Self {
            bytes: bytes.into(),
            encoding,
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn encoding(&self) -> &Encoding {
        &self.encoding
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decompress back to the raw body
    pub fn decompress(&self) -> Result<Vec<u8>, CompressionError> {
        decompress(&self.bytes, &self.encoding)
    }
}

/// Compress data using the specified encoding
///
/// # Returns
/// * `Ok(Vec<u8>)` - Compressed data
/// * `Err(CompressionError::UnsupportedEncoding)` - encoding is neither gzip nor br
pub fn compress(data: &[u8], encoding: &Encoding) -> Result<Vec<u8>, CompressionError> {
    match encoding {
        Encoding::Gzip => compress_gzip(data),
        Encoding::Brotli => compress_brotli(data),
        Encoding::Other(name) => Err(CompressionError::UnsupportedEncoding(name.clone())),
    }
}

/// Compress data and pair the result with its encoding
pub fn compress_artifact(
    data: &[u8],
    encoding: &Encoding,
) -> Result<CompressedArtifact, CompressionError> {
    let compressed = compress(data, encoding)?;
    Ok(CompressedArtifact::new(compressed, encoding.clone()))
}

/// Decompress data using the specified encoding
///
/// No auto-detection: the caller names the encoding the payload was stored with.
pub fn decompress(data: &[u8], encoding: &Encoding) -> Result<Vec<u8>, CompressionError> {
    decode(data, encoding, None)
}

/// Decompress data, failing once the output would exceed `max_size` bytes
pub fn decompress_limited(
    data: &[u8],
    encoding: &Encoding,
    max_size: usize,
) -> Result<Vec<u8>, CompressionError> {
    decode(data, encoding, Some(max_size))
}

/// Zero the MTIME field of a gzip container in place
///
/// Only bytes 4..8 change. Buffers without the gzip magic, or too short to
/// hold a header, are left alone.
pub fn scrub_gzip_timestamp(data: &mut [u8]) {
    if data.len() < 10 || data[..2] != GZIP_MAGIC {
        return;
    }
    data[GZIP_MTIME].fill(0);
}

fn decode(
    data: &[u8],
    encoding: &Encoding,
    max_size: Option<usize>,
) -> Result<Vec<u8>, CompressionError> {
    match encoding {
        Encoding::Gzip => read_limited(flate2::read::GzDecoder::new(data), max_size),
        Encoding::Brotli => read_limited(brotli::Decompressor::new(data, 4096), max_size),
        Encoding::Other(name) => Err(CompressionError::UnsupportedEncoding(name.clone())),
    }
}

fn read_limited<R: Read>(reader: R, max_size: Option<usize>) -> Result<Vec<u8>, CompressionError> {
    let mut result = Vec::new();
    match max_size {
        None => {
            let mut reader = reader;
            reader
                .read_to_end(&mut result)
                .map_err(|e| CompressionError::DecompressionFailed(e.to_string()))?;
        }
        Some(max_size) => {
            let mut reader = reader.take((max_size as u64).saturating_add(1));
            reader
                .read_to_end(&mut result)
                .map_err(|e| CompressionError::DecompressionFailed(e.to_string()))?;

            if result.len() > max_size {
                return Err(CompressionError::DecompressionFailed(format!(
                    "decompressed size exceeds maximum allowed size {}",
                    max_size
                )));
            }
        }
    }
    Ok(result)
}

/// Compress data using gzip at the maximum level
pub(crate) fn compress_gzip(data: &[u8]) -> Result<Vec<u8>, CompressionError> {
    let mut encoder =
        flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::new(GZIP_LEVEL));
    encoder
        .write_all(data)
        .map_err(|e| CompressionError::CompressionFailed(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| CompressionError::CompressionFailed(e.to_string()))
}

/// Compress data using brotli in text mode
fn compress_brotli(data: &[u8]) -> Result<Vec<u8>, CompressionError> {
    let mut result = Vec::new();
    let mut input = std::io::Cursor::new(data);
    brotli::BrotliCompress(
        &mut input,
        &mut result,
        &brotli::enc::BrotliEncoderParams {
            quality: BROTLI_QUALITY,
            lgwin: BROTLI_LGWIN,
            mode: brotli::enc::backward_references::BrotliEncoderMode::BROTLI_MODE_TEXT,
            ..Default::default()
        },
    )
    .map_err(|e| CompressionError::CompressionFailed(format!("brotli: {}", e)))?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_data() -> Vec<u8> {
        // Repetitive data that compresses well
        let mut data = Vec::new();
        for _ in 0..100 {
            data.extend_from_slice(b"<li class=\"product\">Hello, World! Cached fragment.</li>");
        }
        data
    }

    fn create_large_data() -> Vec<u8> {
        // Just over 1MB, with enough variation to defeat trivial run-length matching
        (0..1_100_000u32)
            .map(|i| b"abcdefghijklmnopqrstuvwxyz <>/\n"[(i * 7 % 31) as usize])
            .collect()
    }

    #[test]
    fn test_gzip_compress_decompress() {
        let data = create_test_data();
        let compressed = compress(&data, &Encoding::Gzip).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(decompress(&compressed, &Encoding::Gzip).unwrap(), data);
    }

    #[test]
    fn test_brotli_compress_decompress() {
        let data = create_test_data();
        let compressed = compress(&data, &Encoding::Brotli).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(decompress(&compressed, &Encoding::Brotli).unwrap(), data);
    }

    #[test]
    fn test_round_trip_empty_input() {
        for encoding in [Encoding::Gzip, Encoding::Brotli] {
            let compressed = compress(b"", &encoding).unwrap();
            assert!(!compressed.is_empty());
            assert!(decompress(&compressed, &encoding).unwrap().is_empty());
        }
    }

    #[test]
    fn test_round_trip_large_input() {
        let data = create_large_data();
        for encoding in [Encoding::Gzip, Encoding::Brotli] {
            let compressed = compress(&data, &encoding).unwrap();
            assert_eq!(decompress(&compressed, &encoding).unwrap(), data);
        }
    }

    #[test]
    fn test_compress_unsupported_encoding() {
        let encoding = Encoding::Other("unsupported".to_string());
        assert_eq!(
            compress(b"data", &encoding),
            Err(CompressionError::UnsupportedEncoding(
                "unsupported".to_string()
            ))
        );
        assert!(matches!(
            decompress(b"data", &encoding),
            Err(CompressionError::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn test_gzip_header_has_zero_mtime() {
        let compressed = compress(b"hello", &Encoding::Gzip).unwrap();
        assert_eq!(&compressed[..2], &GZIP_MAGIC);
        assert_eq!(&compressed[4..8], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_gzip_is_deterministic() {
        let data = create_test_data();
        let mut a = compress(&data, &Encoding::Gzip).unwrap();
        let mut b = compress(&data, &Encoding::Gzip).unwrap();
        scrub_gzip_timestamp(&mut a);
        scrub_gzip_timestamp(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_scrub_gzip_timestamp_only_touches_mtime() {
        let mut stamped = flate2::GzBuilder::new()
            .mtime(0x5f5e_1000)
            .write(Vec::new(), flate2::Compression::best());
        stamped.write_all(b"hello").unwrap();
        let mut stamped = stamped.finish().unwrap();
        let original = stamped.clone();

        scrub_gzip_timestamp(&mut stamped);

        assert_eq!(&stamped[4..8], &[0, 0, 0, 0]);
        assert_eq!(&stamped[..4], &original[..4]);
        assert_eq!(&stamped[8..], &original[8..]);
        assert_eq!(decompress(&stamped, &Encoding::Gzip).unwrap(), b"hello");
    }

    #[test]
    fn test_scrub_gzip_timestamp_ignores_non_gzip() {
        let mut data = b"not a gzip stream at all".to_vec();
        let original = data.clone();
        scrub_gzip_timestamp(&mut data);
        assert_eq!(data, original);

        let mut short = vec![0x1f, 0x8b, 8, 0, 1];
        scrub_gzip_timestamp(&mut short);
        assert_eq!(short, vec![0x1f, 0x8b, 8, 0, 1]);
    }

    #[test]
    fn test_decompress_limited_rejects_oversized_output() {
        let data = create_test_data();
        let compressed = compress(&data, &Encoding::Gzip).unwrap();
        assert!(decompress_limited(&compressed, &Encoding::Gzip, data.len()).is_ok());

        let err = decompress_limited(&compressed, &Encoding::Gzip, 16).unwrap_err();
        assert!(matches!(err, CompressionError::DecompressionFailed(_)));
    }

    #[test]
    fn test_decompress_garbage_fails() {
        let err = decompress(b"definitely not gzip", &Encoding::Gzip).unwrap_err();
        assert!(matches!(err, CompressionError::DecompressionFailed(_)));
    }

    #[test]
    fn test_compress_artifact_carries_encoding() {
        let artifact = compress_artifact(b"<html></html>", &Encoding::Brotli).unwrap();
        assert_eq!(artifact.encoding(), &Encoding::Brotli);
        assert!(!artifact.is_empty());
        assert_eq!(artifact.len(), artifact.bytes().len());
        assert_eq!(artifact.decompress().unwrap(), b"<html></html>");

        // even an empty body compresses to a non-empty container
        assert!(!compress_artifact(b"", &Encoding::Gzip).unwrap().is_empty());
    }
}
