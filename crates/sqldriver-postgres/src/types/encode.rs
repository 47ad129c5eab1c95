//! Parameter encoding (Rust → PostgreSQL text format).
//!
//! Parameters are sent untyped, so the server infers each type from context.
//! The wire text is chosen by the shape of the host value, never by the
//! column it ends up in: an integer bound to a numeric column and to a text
//! column is encoded the same way.

use chrono::{DateTime, FixedOffset};
use sqldriver_core::value::Value;

/// Encode a value as PostgreSQL text.
pub trait TextEncode {
    /// Encode to PostgreSQL text representation.
    fn encode_text(&self) -> String;
}

impl TextEncode for bool {
    fn encode_text(&self) -> String {
        let text = if *self { "t" } else { "f" };
        text.to_string()
    }
}

impl TextEncode for i16 {
    fn encode_text(&self) -> String {
        self.to_string()
    }
}

impl TextEncode for i32 {
    fn encode_text(&self) -> String {
        self.to_string()
    }
}

impl TextEncode for i64 {
    fn encode_text(&self) -> String {
        self.to_string()
    }
}

impl TextEncode for f32 {
    fn encode_text(&self) -> String {
        if self.is_nan() {
            "NaN".to_string()
        } else if self.is_infinite() {
            if self.is_sign_positive() {
                "Infinity".to_string()
            } else {
                "-Infinity".to_string()
            }
        } else {
            self.to_string()
        }
    }
}

impl TextEncode for f64 {
    fn encode_text(&self) -> String {
        if self.is_nan() {
            "NaN".to_string()
        } else if self.is_infinite() {
            if self.is_sign_positive() {
                "Infinity".to_string()
            } else {
                "-Infinity".to_string()
            }
        } else {
            self.to_string()
        }
    }
}

impl TextEncode for [u8] {
    fn encode_text(&self) -> String {
        format!("\\x{}", hex::encode(self))
    }
}

impl TextEncode for [u8; 16] {
    fn encode_text(&self) -> String {
        let hex = hex::encode(self);
        format!(
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        )
    }
}

/// `YYYY-MM-DD HH:MM:SS.ffffff±hh`, with `mm` appended to the offset only
/// when it is not a whole number of hours.
impl TextEncode for DateTime<FixedOffset> {
    fn encode_text(&self) -> String {
        let offset = self.offset().local_minus_utc();
        let hours = offset / 3600;
        let minutes = (offset % 3600).abs() / 60;
        let sign = if offset < 0 { '-' } else { '+' };

        let mut text = format!("{}{sign}{:02}", self.format("%Y-%m-%d %H:%M:%S%.6f"), hours.abs());
        if minutes != 0 {
            text.push_str(&format!("{minutes:02}"));
        }
        text
    }
}

/// Encode a parameter. `None` means SQL NULL.
pub fn encode_param(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::Bool(v) => v.encode_text(),
        Value::SmallInt(v) => v.encode_text(),
        Value::Int(v) => v.encode_text(),
        Value::BigInt(v) => v.encode_text(),
        Value::Float(v) => v.encode_text(),
        Value::Double(v) => v.encode_text(),
        Value::Decimal(v) | Value::Text(v) => v.clone(),
        Value::Bytes(v) => v.as_slice().encode_text(),
        Value::Timestamp(v) => v.encode_text(),
        Value::Uuid(v) => v.encode_text(),
        Value::Json(v) => v.to_string(),
    };
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_bool_encoding() {
        assert_eq!(true.encode_text(), "t");
        assert_eq!(false.encode_text(), "f");
        assert_eq!(encode_param(&Value::Bool(true)).as_deref(), Some("t"));
    }

    #[test]
    fn test_integer_encoding() {
        assert_eq!(42i32.encode_text(), "42");
        assert_eq!((-100i64).encode_text(), "-100");
        assert_eq!(encode_param(&Value::SmallInt(-7)).as_deref(), Some("-7"));
    }

    #[test]
    fn test_float_encoding() {
        assert_eq!(f64::NAN.encode_text(), "NaN");
        assert_eq!(f64::INFINITY.encode_text(), "Infinity");
        assert_eq!(f64::NEG_INFINITY.encode_text(), "-Infinity");
        assert_eq!(1.5f64.encode_text(), "1.5");
        assert_eq!(f32::INFINITY.encode_text(), "Infinity");
    }

    #[test]
    fn test_bytea_encoding() {
        let bytes = vec![0xDE, 0xAD, 0xBE, 0xEF];
        assert_eq!(bytes.as_slice().encode_text(), "\\xdeadbeef");
        assert_eq!(encode_param(&Value::Bytes(vec![])).as_deref(), Some("\\x"));
    }

    #[test]
    fn test_uuid_encoding() {
        let uuid: [u8; 16] = [
            0x55, 0x06, 0x9c, 0x47, 0x86, 0x8b, 0x4a, 0x08, 0xa4, 0x7f, 0x36, 0x53, 0x26, 0x2b,
            0xce, 0x35,
        ];
        assert_eq!(uuid.encode_text(), "55069c47-868b-4a08-a47f-3653262bce35");
    }

    #[test]
    fn test_timestamp_encoding() {
        let pst = FixedOffset::west_opt(7 * 3600).unwrap();
        let ts = pst
            .with_ymd_and_hms(2011, 11, 4, 9, 5, 3)
            .unwrap()
            .checked_add_signed(chrono::Duration::microseconds(42))
            .unwrap();
        assert_eq!(ts.encode_text(), "2011-11-04 09:05:03.000042-07");

        let utc = FixedOffset::east_opt(0).unwrap();
        let ts = utc.with_ymd_and_hms(1999, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(ts.encode_text(), "1999-12-31 23:59:59.000000+00");

        let ist = FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap();
        let ts = ist.with_ymd_and_hms(2020, 2, 29, 0, 0, 0).unwrap();
        assert_eq!(ts.encode_text(), "2020-02-29 00:00:00.000000+0530");
    }

    #[test]
    fn test_shape_directed_encoding() {
        assert_eq!(encode_param(&Value::Null), None);
        assert_eq!(encode_param(&Value::Int(3)).as_deref(), Some("3"));
        assert_eq!(
            encode_param(&Value::Text("bob".to_string())).as_deref(),
            Some("bob")
        );
        assert_eq!(
            encode_param(&Value::Decimal("12.50".to_string())).as_deref(),
            Some("12.50")
        );
        assert_eq!(
            encode_param(&Value::Json(serde_json::json!({"a": 1}))).as_deref(),
            Some(r#"{"a":1}"#)
        );
    }
}
