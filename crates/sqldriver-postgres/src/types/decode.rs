//! Result decoding (PostgreSQL text format → Rust).
//!
//! Every cell arrives as text tagged with its column's type OID. The OID is
//! looked up in [`DECODE_RULES`]; most types pass through as text and leave
//! numeric and temporal parsing to the caller. Only booleans and byte arrays
//! are transformed. An OID missing from the table cannot be decoded.

use sqldriver_core::error::{DecodeError, DecodeErrorKind};
use sqldriver_core::value::Value;

use super::oid;

/// How a column's text is turned into a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeRule {
    /// Raw text becomes `Value::Text` unchanged.
    PassThrough,
    /// `t` becomes `Value::Text("true")`, anything else `Value::Text("false")`.
    Boolean,
    /// `\x`-prefixed hex becomes `Value::Bytes`.
    ByteArray,
}

/// OID → decode rule.
pub const DECODE_RULES: &[(u32, DecodeRule)] = &[
    (oid::BOOL, DecodeRule::Boolean),
    (oid::BYTEA, DecodeRule::ByteArray),
    (oid::CHAR, DecodeRule::PassThrough),
    (oid::BPCHAR, DecodeRule::PassThrough),
    (oid::VARCHAR, DecodeRule::PassThrough),
    (oid::TEXT, DecodeRule::PassThrough),
    (oid::INT2, DecodeRule::PassThrough),
    (oid::INT4, DecodeRule::PassThrough),
    (oid::INT8, DecodeRule::PassThrough),
    (oid::OID, DecodeRule::PassThrough),
    (oid::XID, DecodeRule::PassThrough),
    (oid::FLOAT4, DecodeRule::PassThrough),
    (oid::FLOAT8, DecodeRule::PassThrough),
    (oid::DATE, DecodeRule::PassThrough),
    (oid::TIME, DecodeRule::PassThrough),
    (oid::TIMESTAMP, DecodeRule::PassThrough),
    (oid::TIMESTAMPTZ, DecodeRule::PassThrough),
    (oid::INTERVAL, DecodeRule::PassThrough),
    (oid::TIMETZ, DecodeRule::PassThrough),
    (oid::NUMERIC, DecodeRule::PassThrough),
];

/// Look up the decode rule for a type OID.
pub fn decode_rule(type_oid: u32) -> Option<DecodeRule> {
    DECODE_RULES
        .iter()
        .find(|(candidate, _)| *candidate == type_oid)
        .map(|(_, rule)| *rule)
}

/// Decode one cell. `None` is SQL NULL and decodes to `Value::Null` whatever
/// the column type.
pub fn decode_value(type_oid: u32, raw: Option<&[u8]>) -> Result<Value, DecodeError> {
    let Some(raw) = raw else {
        return Ok(Value::Null);
    };

    let rule = decode_rule(type_oid).ok_or_else(|| {
        DecodeError::new(
            DecodeErrorKind::UnsupportedType(type_oid),
            format!("unsupported type identifier: {type_oid}"),
        )
    })?;

    match rule {
        DecodeRule::Boolean => Ok(decode_bool(raw)),
        DecodeRule::ByteArray => decode_bytea(raw).map(Value::Bytes),
        DecodeRule::PassThrough => decode_text(raw).map(Value::Text),
    }
}

/// Booleans surface as text, not as `Value::Bool`.
pub fn decode_bool(raw: &[u8]) -> Value {
    let text = if raw == b"t" { "true" } else { "false" };
    Value::Text(text.to_string())
}

/// Decode bytea in hex output format (`\x0102ff`).
pub fn decode_bytea(raw: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let digits = raw.strip_prefix(b"\\x").ok_or_else(|| {
        DecodeError::new(DecodeErrorKind::InvalidByteString, "invalid byte string format")
    })?;
    hex::decode(digits).map_err(|err| {
        DecodeError::new(DecodeErrorKind::InvalidHex, format!("invalid byte string: {err}"))
    })
}

fn decode_text(raw: &[u8]) -> Result<String, DecodeError> {
    std::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|err| {
            DecodeError::new(DecodeErrorKind::InvalidUtf8, format!("invalid UTF-8 text: {err}"))
        })
}
