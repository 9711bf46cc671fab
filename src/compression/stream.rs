//! Streaming gzip with a cacheable side artifact
//!
//! A chunked response body is gzipped live, one flush per chunk, so the client
//! sees output as soon as the producer yields it. Flushing after every chunk
//! inflates the stream and ties its layout to the chunk boundaries, so the
//! artifact handed to the cache is instead a single-shot recompression of the
//! concatenated raw body.

use std::io::{self, Write};

use bytes::{Bytes, BytesMut};
use flate2::write::GzEncoder;
use futures::{Stream, StreamExt};

use super::compress::{compress_gzip, CompressedArtifact, GZIP_LEVEL};
use super::encoding::Encoding;
use super::error::{CompressionError, StreamingError};

/// Live state for one streaming call
///
/// Holds the live encoder, the raw bytes seen so far and the downstream sink.
/// The live stream is finalized exactly once: explicitly by the run loop, or on
/// drop if the session is abandoned (cancelled future, unwinding panic).
pub struct StreamSession<S>
where
    S: FnMut(Bytes) -> io::Result<()>,
{
    encoder: Option<GzEncoder<Vec<u8>>>,
    raw: BytesMut,
    sink: S,
    streamed_bytes: usize,
}

impl<S> StreamSession<S>
where
    S: FnMut(Bytes) -> io::Result<()>,
{
    pub fn new(sink: S) -> Self {
        Self {
            encoder: Some(GzEncoder::new(
                Vec::new(),
                flate2::Compression::new(GZIP_LEVEL),
            )),
            raw: BytesMut::new(),
            sink,
            streamed_bytes: 0,
        }
    }

    /// Compress one raw chunk, flush, and forward the output to the sink
    ///
    /// Empty chunks are skipped: a sync flush with no pending input is not
    /// something the sink should ever observe.
    pub fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), CompressionError> {
        if chunk.is_empty() {
            return Ok(());
        }

        let encoder = self.encoder.as_mut().ok_or_else(|| {
            CompressionError::CompressionFailed("stream already finalized".to_string())
        })?;
        encoder
            .write_all(chunk)
            .and_then(|_| encoder.flush())
            .map_err(|e| CompressionError::CompressionFailed(e.to_string()))?;
        self.raw.extend_from_slice(chunk);

        let compressed = std::mem::take(encoder.get_mut());
        self.emit(compressed)
    }

    /// Write the gzip trailer to the sink. Idempotent.
    pub fn finish(&mut self) -> Result<(), CompressionError> {
        let Some(encoder) = self.encoder.take() else {
            return Ok(());
        };
        let trailer = encoder
            .finish()
            .map_err(|e| CompressionError::CompressionFailed(e.to_string()))?;
        self.emit(trailer)
    }

    /// Raw bytes accumulated so far
    pub fn raw_len(&self) -> usize {
        self.raw.len()
    }

    /// Finalize the live stream and build the cacheable artifact
    pub fn into_artifact(mut self) -> Result<CompressedArtifact, CompressionError> {
        self.finish()?;
        let raw = std::mem::take(&mut self.raw).freeze();
        let artifact = CompressedArtifact::new(compress_gzip(&raw)?, Encoding::Gzip);

        tracing::debug!(
            raw_bytes = raw.len(),
            streamed_bytes = self.streamed_bytes,
            artifact_bytes = artifact.len(),
            "gzip stream complete"
        );
        Ok(artifact)
    }

    /// Best-effort finalization on a failure path; the original error wins
    fn abort(&mut self) {
        if let Err(e) = self.finish() {
            tracing::warn!(error = %e, "failed to finalize gzip stream after error");
        }
    }

    fn emit(&mut self, compressed: Vec<u8>) -> Result<(), CompressionError> {
        if compressed.is_empty() {
            return Ok(());
        }
        self.streamed_bytes += compressed.len();
        (self.sink)(Bytes::from(compressed))
            .map_err(|e| CompressionError::SinkFailed(e.to_string()))
    }
}

impl<S> Drop for StreamSession<S>
where
    S: FnMut(Bytes) -> io::Result<()>,
{
    fn drop(&mut self) {
        if self.encoder.is_some() {
            self.abort();
        }
    }
}

/// Gzip a chunked body for the client while building the cacheable artifact
///
/// * `producer` - raw body chunks, in order; an `Err` aborts the stream
/// * `sink` - receives one compressed event per non-empty chunk, then the trailer
/// * `on_complete` - receives the single-shot artifact once the producer is exhausted
///
/// On producer or sink failure the live stream is still finalized, `on_complete`
/// is not called, and the error is returned.
pub fn run<I, B, E, S, C>(producer: I, sink: S, on_complete: C) -> Result<(), StreamingError<E>>
where
    I: IntoIterator<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    S: FnMut(Bytes) -> io::Result<()>,
    C: FnOnce(CompressedArtifact),
{
    let mut session = StreamSession::new(sink);

    for chunk in producer {
        let step = match chunk {
            Ok(chunk) => session.write_chunk(chunk.as_ref()).map_err(StreamingError::from),
            Err(e) => Err(StreamingError::Producer(e)),
        };
        if let Err(e) = step {
            session.abort();
            return Err(e);
        }
    }

    on_complete(session.into_artifact()?);
    Ok(())
}

/// Async counterpart of [`run`] for a `futures::Stream` producer
///
/// Dropping the returned future mid-stream finalizes the live stream and skips
/// `on_complete`.
pub async fn run_stream<P, B, E, S, C>(
    producer: P,
    sink: S,
    on_complete: C,
) -> Result<(), StreamingError<E>>
where
    P: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    S: FnMut(Bytes) -> io::Result<()>,
    C: FnOnce(CompressedArtifact),
{
    futures::pin_mut!(producer);
    let mut session = StreamSession::new(sink);

    while let Some(chunk) = producer.next().await {
        let step = match chunk {
            Ok(chunk) => session.write_chunk(chunk.as_ref()).map_err(StreamingError::from),
            Err(e) => Err(StreamingError::Producer(e)),
        };
        if let Err(e) = step {
            session.abort();
            return Err(e);
        }
    }

    on_complete(session.into_artifact()?);
    Ok(())
}

/// Stream-compress a body in the given encoding
///
/// Only gzip supports streaming; anything else fails before the producer is
/// touched.
pub fn compress_stream<I, B, E, S, C>(
    encoding: &Encoding,
    producer: I,
    sink: S,
    on_complete: C,
) -> Result<(), StreamingError<E>>
where
    I: IntoIterator<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    S: FnMut(Bytes) -> io::Result<()>,
    C: FnOnce(CompressedArtifact),
{
    match encoding {
        Encoding::Gzip => run(producer, sink, on_complete),
        other => Err(CompressionError::UnsupportedEncoding(other.to_string()).into()),
    }
}
