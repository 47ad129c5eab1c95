//! PostgreSQL type conversion.
//!
//! This module provides:
//! - OID constants for the built-in types the driver understands
//! - Encoding of parameters into PostgreSQL text format
//! - Decoding of text-format result cells, dispatched by column OID
//!
//! # Example
//!
//! ```rust,ignore
//! use sqldriver_postgres::types::{decode_value, encode_param, oid};
//!
//! let wire = encode_param(&Value::Bytes(vec![1, 2])).unwrap();
//! assert_eq!(wire, "\\x0102");
//! assert_eq!(decode_value(oid::BYTEA, Some(wire.as_bytes()))?, Value::Bytes(vec![1, 2]));
//! ```

pub mod decode;
pub mod encode;
pub mod oid;

pub use decode::{DECODE_RULES, DecodeRule, decode_rule, decode_value};
pub use encode::{TextEncode, encode_param};
