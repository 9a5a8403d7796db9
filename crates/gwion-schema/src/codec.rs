//! Encode/decode between typed values and JSON text.
//!
//! Decoding never panics: failures come back as a [`CodecError`] carrying the
//! underlying parser message, so callers can surface them to the model as
//! recoverable tool-call failures.

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::schema::Schema;

/// Result type alias using the codec error type.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Error type for codec operations.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// Input text or value did not decode into the expected type.
    #[error("decode error: {0}")]
    Decode(String),

    /// Value could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),
}

/// A type with a JSON Schema description and a serde codec.
///
/// Implementations are written per type; the contract is the rendered
/// schema shape, not the derivation mechanism.
pub trait Schematic: Serialize + DeserializeOwned + Send {
    /// The JSON Schema describing this type's encoded form.
    fn schema() -> Schema;
}

/// Encode a value to compact JSON.
pub fn encode<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Encode a value to pretty-printed JSON.
pub fn encode_pretty<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decode a value from JSON text.
pub fn decode<T: DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| CodecError::Decode(e.to_string()))
}

/// Decode a value from an already-parsed JSON value.
pub fn decode_value<T: DeserializeOwned>(value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| CodecError::Decode(e.to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Schematic impls for primitives
// ─────────────────────────────────────────────────────────────────────────────

impl Schematic for String {
    fn schema() -> Schema {
        Schema::string()
    }
}

impl Schematic for bool {
    fn schema() -> Schema {
        Schema::boolean()
    }
}

impl Schematic for f64 {
    fn schema() -> Schema {
        Schema::number()
    }
}

impl Schematic for f32 {
    fn schema() -> Schema {
        Schema::number()
    }
}

impl Schematic for i64 {
    fn schema() -> Schema {
        Schema::integer()
    }
}

impl Schematic for i32 {
    fn schema() -> Schema {
        Schema::integer()
    }
}

impl Schematic for u64 {
    fn schema() -> Schema {
        Schema::integer().range(Some(0.0), None)
    }
}

impl Schematic for u32 {
    fn schema() -> Schema {
        Schema::integer().range(Some(0.0), None)
    }
}

impl<T: Schematic> Schematic for Vec<T> {
    fn schema() -> Schema {
        Schema::array(T::schema())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
