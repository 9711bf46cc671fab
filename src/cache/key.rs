//! Cache key descriptors and canonicalization
//!
//! A request describes what it depends on with a [`KeyDescriptor`]. The
//! descriptor is reduced to a deterministic string used as the backing-store
//! key, and hashed into the client-visible entity tag.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate};
use sha2::{Digest, Sha256};

use crate::compression::Encoding;

/// Leaf values of a key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    /// Interned identifier, kept distinct from a string with the same text
    Symbol(String),
    Str(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Symbol(s) | Scalar::Str(s) => f.write_str(s),
        }
    }
}

/// A value inside a key descriptor
///
/// Maps keep insertion order, and equality is order-sensitive: two maps with
/// the same pairs in a different order are different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyValue {
    Nil,
    Scalar(Scalar),
    List(Vec<KeyValue>),
    Map(Vec<(String, KeyValue)>),
}

impl KeyValue {
    pub fn symbol(name: impl Into<String>) -> Self {
        KeyValue::Scalar(Scalar::Symbol(name.into()))
    }

    /// Build an ordered map from `(name, value)` pairs
    pub fn map<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<KeyValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        KeyValue::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Nil and `false` count as "not set" for the optional descriptor fields
    fn is_set(&self) -> bool {
        !matches!(self, KeyValue::Nil | KeyValue::Scalar(Scalar::Bool(false)))
    }
}

/// Natural string form: nil is empty, scalars render bare, and compound values
/// fall back to their inspected form so `["a", "b"]` never collides with `"a,b"`.
impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Nil => Ok(()),
            KeyValue::Scalar(s) => write!(f, "{}", s),
            KeyValue::List(_) | KeyValue::Map(_) => write!(f, "{}", Inspect(self)),
        }
    }
}

/// Literal form of a value: strings quoted, symbols prefixed with `:`, nil
/// spelled out, compound values bracketed.
struct Inspect<'a>(&'a KeyValue);

impl fmt::Display for Inspect<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            KeyValue::Nil => f.write_str("nil"),
            KeyValue::Scalar(Scalar::Str(s)) => write!(f, "{:?}", s),
            KeyValue::Scalar(Scalar::Symbol(s)) => write!(f, ":{}", s),
            KeyValue::Scalar(s) => write!(f, "{}", s),
            KeyValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", Inspect(item))?;
                }
                f.write_str("]")
            }
            KeyValue::Map(pairs) => {
                f.write_str("{")?;
                for (i, (name, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", name, Inspect(value))?;
                }
                f.write_str("}")
            }
        }
    }
}

/// String form of a `key` or `version` field: a top-level map joins its
/// values with `,`, anything else renders naturally.
fn stringify(value: &KeyValue) -> String {
    match value {
        KeyValue::Map(pairs) => pairs
            .iter()
            .map(|(_, v)| v.to_string())
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

impl From<Scalar> for KeyValue {
    fn from(s: Scalar) -> Self {
        KeyValue::Scalar(s)
    }
}

impl From<&str> for KeyValue {
    fn from(s: &str) -> Self {
        KeyValue::Scalar(Scalar::Str(s.to_string()))
    }
}

impl From<String> for KeyValue {
    fn from(s: String) -> Self {
        KeyValue::Scalar(Scalar::Str(s))
    }
}

impl From<i64> for KeyValue {
    fn from(i: i64) -> Self {
        KeyValue::Scalar(Scalar::Int(i))
    }
}

impl From<bool> for KeyValue {
    fn from(b: bool) -> Self {
        KeyValue::Scalar(Scalar::Bool(b))
    }
}

impl<T: Into<KeyValue>> From<Vec<T>> for KeyValue {
    fn from(items: Vec<T>) -> Self {
        KeyValue::List(items.into_iter().map(Into::into).collect())
    }
}

/// A keyed descriptor: `key` plus optional schema version, version and encoding
///
/// `extra` holds any other named fields the caller attached. They only show up
/// in the canonical form when `key` is missing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct StructuredKey {
    pub key: Option<KeyValue>,
    pub key_schema_version: Option<KeyValue>,
    pub version: Option<KeyValue>,
    pub encoding: Option<String>,
    pub extra: Vec<(String, KeyValue)>,
}

impl StructuredKey {
    pub fn new(key: impl Into<KeyValue>) -> Self {
        Self {
            key: Some(key.into()),
            ..Default::default()
        }
    }

    pub fn with_schema_version(mut self, schema_version: impl Into<KeyValue>) -> Self {
        self.key_schema_version = Some(schema_version.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<KeyValue>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<KeyValue>) -> Self {
        self.extra.push((name.into(), value.into()));
        self
    }

    fn canonicalize(&self) -> String {
        let Some(key) = &self.key else {
            return format!("{:?}", self);
        };

        let mut canonical = stringify(key);

        if let Some(schema_version) = self.key_schema_version.as_ref().filter(|v| v.is_set()) {
            canonical = format!("{}:{}", schema_version, canonical);
        }
        if let Some(version) = self.version.as_ref().filter(|v| v.is_set()) {
            canonical = format!("{}:{}", canonical, stringify(version));
        }
        // storage key only; entity tags are computed without it
        if let Some(encoding) = &self.encoding {
            canonical = format!("{}:{}", canonical, encoding);
        }

        canonical
    }
}

/// Everything a response's cache key can be derived from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyDescriptor {
    Structured(StructuredKey),
    Sequence(Vec<KeyValue>),
    /// A timezone-aware point in time
    Instant(DateTime<FixedOffset>),
    /// A date with no timezone
    CalendarDate(NaiveDate),
    Scalar(Scalar),
    /// Anything else, by its textual form
    Opaque(String),
}

impl KeyDescriptor {
    /// Reduce the descriptor to its canonical cache key
    ///
    /// Pure and total. Instants collapse to epoch seconds so the same moment
    /// in any timezone yields one key. Dates render as ISO-8601 because a date
    /// has no epoch value without picking a timezone.
    pub fn canonicalize(&self) -> String {
        match self {
            KeyDescriptor::Structured(structured) => structured.canonicalize(),
            KeyDescriptor::Sequence(values) => Inspect(&KeyValue::List(values.clone())).to_string(),
            KeyDescriptor::Instant(instant) => instant.timestamp().to_string(),
            KeyDescriptor::CalendarDate(date) => date.format("%Y-%m-%d").to_string(),
            KeyDescriptor::Scalar(scalar) => Inspect(&KeyValue::Scalar(scalar.clone())).to_string(),
            KeyDescriptor::Opaque(text) => format!("{:?}", text),
        }
    }

    /// The same descriptor with any storage encoding removed
    pub fn without_encoding(&self) -> KeyDescriptor {
        match self {
            KeyDescriptor::Structured(structured) => KeyDescriptor::Structured(StructuredKey {
                encoding: None,
                ..structured.clone()
            }),
            other => other.clone(),
        }
    }

    /// Client-visible validator, a quoted SHA-256 of the encoding-free canonical key
    ///
    /// Responses stored under different encodings share an entity tag.
    pub fn entity_tag(&self) -> String {
        let digest = Sha256::digest(self.without_encoding().canonicalize().as_bytes());
        format!("\"{}\"", hex::encode(digest))
    }
}

impl From<StructuredKey> for KeyDescriptor {
    fn from(structured: StructuredKey) -> Self {
        KeyDescriptor::Structured(structured)
    }
}

impl From<Scalar> for KeyDescriptor {
    fn from(scalar: Scalar) -> Self {
        KeyDescriptor::Scalar(scalar)
    }
}

impl From<DateTime<FixedOffset>> for KeyDescriptor {
    fn from(instant: DateTime<FixedOffset>) -> Self {
        KeyDescriptor::Instant(instant)
    }
}

impl From<NaiveDate> for KeyDescriptor {
    fn from(date: NaiveDate) -> Self {
        KeyDescriptor::CalendarDate(date)
    }
}

/// Canonical cache key for a descriptor
pub fn canonicalize(descriptor: &KeyDescriptor) -> String {
    descriptor.canonicalize()
}

/// Canonical key for storing a response body in `encoding`
///
/// Structured descriptors carry the encoding as a field; every other variant
/// gets it appended, so each encoding always has its own key.
pub fn storage_key(descriptor: &KeyDescriptor, encoding: &Encoding) -> String {
    match descriptor {
        KeyDescriptor::Structured(structured) => structured
            .clone()
            .with_encoding(encoding.to_string())
            .canonicalize(),
        other => format!("{}:{}", other.canonicalize(), encoding),
    }
}
