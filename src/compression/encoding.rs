/// Content encoding definitions
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// A response content encoding
///
/// `Gzip` and `Brotli` are the encodings this crate can produce. Anything else a
/// caller configures as a default survives negotiation as `Other` and is rejected
/// by the codec with `UnsupportedEncoding`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Encoding {
    /// GZIP compression (RFC 1952)
    Gzip,
    /// Brotli compression (RFC 7932)
    Brotli,
    /// Any other token, carried verbatim
    Other(String),
}

impl Encoding {
    /// HTTP Content-Encoding header value
    pub fn to_header_value(&self) -> &str {
        match self {
            Encoding::Gzip => "gzip",
            Encoding::Brotli => "br",
            Encoding::Other(name) => name,
        }
    }

    /// Whether the codec can compress and decompress this encoding
    pub fn is_supported(&self) -> bool {
        !matches!(self, Encoding::Other(_))
    }

    /// Parse an encoding token. Only exact (case-insensitive) `gzip` and `br`
    /// map to the supported variants.
    pub fn parse_encoding(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "gzip" => Encoding::Gzip,
            "br" => Encoding::Brotli,
            _ => Encoding::Other(s.trim().to_string()),
        }
    }
}

impl FromStr for Encoding {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse_encoding(s))
    }
}

impl From<String> for Encoding {
    fn from(s: String) -> Self {
        Self::parse_encoding(&s)
    }
}

impl From<&str> for Encoding {
    fn from(s: &str) -> Self {
        Self::parse_encoding(s)
    }
}

impl From<Encoding> for String {
    fn from(encoding: Encoding) -> Self {
        encoding.to_header_value().to_string()
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_header_value())
    }
}
