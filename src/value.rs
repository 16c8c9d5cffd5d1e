//! The opaque application value carried by an instance.
//!
//! Moving an application value through the transport without the engine
//! knowing its type could be done via reflective encoding, but a
//! length-prefixed typed byte blob is simpler and language-neutral, so
//! that is the route this crate takes: a `Value` is an owned, already
//! serialized byte blob the engine moves by value and never inspects.

use serde::{Deserialize, Serialize};

/// An opaque, serialized application value.
///
/// Hosts produce a `Value` via [`Value::from_json`] (or any encoding that
/// round-trips through bytes) and read it back via [`Value::to_json`]; the
/// engine itself only ever clones, compares, and moves the bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Value(Vec<u8>);

impl Value {
    /// Wrap an already-encoded byte blob.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Encode any `Serialize` value as JSON and wrap it.
    pub fn from_json<T: Serialize>(value: &T) -> crate::error::Result<Self> {
        Ok(Self(serde_json::to_vec(value)?))
    }

    /// Decode the wrapped bytes as JSON.
    pub fn to_json<T: for<'de> Deserialize<'de>>(&self) -> crate::error::Result<T> {
        Ok(serde_json::from_slice(&self.0)?)
    }

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// True if this value carries no payload (used when clearing a
    /// forgotten instance's value).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// An empty value, used in place of a real payload once an instance is
    /// reclaimed.
    pub fn empty() -> Self {
        Self(Vec::new())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}
