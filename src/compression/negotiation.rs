/// Accept-Encoding negotiation
use super::encoding::Encoding;

/// Pick the encoding to cache and serve a response in
///
/// # Arguments
/// * `accept_encoding` - Value of the Accept-Encoding header (or None if not present)
/// * `default_encoding` - Encoding to fall back to when the client names none we support
///
/// # Algorithm
/// Literal substring checks, brotli first:
/// 1. header contains `br` → `Encoding::Brotli`
/// 2. header contains `gzip` → `Encoding::Gzip`
/// 3. otherwise the default
///
/// Never fails: a response must still be cached server-side when the
/// requester declared no preference.
pub fn negotiate(accept_encoding: Option<&str>, default_encoding: &Encoding) -> Encoding {
    let accept_encoding = accept_encoding.unwrap_or_default();

    if accept_encoding.contains("br") {
        Encoding::Brotli
    } else if accept_encoding.contains("gzip") {
        Encoding::Gzip
    } else {
        default_encoding.clone()
    }
}
