//! JSON codec for the wire records exchanged with devices.
//!
//! Records are plain serde types, so nested records (a [`TestResult`]
//! embedding a [`Device`]) are rebuilt from the field types declared on the
//! struct. Adding a record only needs a derive and a [`WireRecord`] impl.
//!
//! Mapping keys keep insertion order through `serde_json`'s `preserve_order`
//! feature, which makes encoded payloads and report entries stable.
//!
//! [`TestResult`]: crate::types::TestResult
//! [`Device`]: crate::types::Device

use crate::error::{FactoryError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use serde_json::{Map, Value};

/// Free-form, ordered key/value parameters carried by specs and results.
pub type Parameters = Map<String, Value>;

/// A record that travels as a JSON payload.
pub trait WireRecord: Serialize + DeserializeOwned {
    /// Name used as the root of decode error paths.
    const RECORD: &'static str;
}

pub fn encode<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| FactoryError::Encode(e.to_string()))
}

/// Two-space indented encoding used for report entries and spec files.
pub fn encode_pretty<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| FactoryError::Encode(e.to_string()))
}

/// Decodes `bytes` into `T`, rejecting missing fields, mismatched types and
/// trailing data.
///
/// The error path names the record and the offending field, for example
/// `TestResult.device.serial`.
pub fn decode<T: WireRecord>(bytes: &[u8]) -> Result<T> {
    let mut de = serde_json::Deserializer::from_slice(bytes);
    let value: T = serde_path_to_error::deserialize(&mut de).map_err(|e| {
        let path = e.path().to_string();
        FactoryError::Decode {
            path: record_path(T::RECORD, &path),
            message: e.into_inner().to_string(),
        }
    })?;
    de.end().map_err(|e| FactoryError::Decode {
        path: T::RECORD.to_string(),
        message: e.to_string(),
    })?;
    Ok(value)
}

pub fn decode_str<T: WireRecord>(text: &str) -> Result<T> {
    decode(text.as_bytes())
}

fn record_path(record: &str, field_path: &str) -> String {
    if field_path.is_empty() || field_path == "." {
        record.to_string()
    } else {
        format!("{record}.{field_path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Inner {
        name: String,
        count: u32,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Outer {
        label: String,
        inner: Inner,
        extra: Parameters,
    }

    impl WireRecord for Outer {
        const RECORD: &'static str = "Outer";
    }

    #[test]
    fn test_nested_record_is_rebuilt() {
        let text = r#"{"label":"x","inner":{"name":"n","count":3},"extra":{}}"#;
        let outer: Outer = decode_str(text).unwrap();
        assert_eq!(
            outer.inner,
            Inner {
                name: "n".to_string(),
                count: 3
            }
        );
    }

    #[test]
    fn test_encode_keeps_insertion_order() {
        let mut extra = Parameters::new();
        extra.insert("zeta".to_string(), json!(1));
        extra.insert("alpha".to_string(), json!({"nested": [1, 2, {"deep": true}]}));
        extra.insert("mid".to_string(), json!("v"));
        let outer = Outer {
            label: "l".to_string(),
            inner: Inner {
                name: "n".to_string(),
                count: 0,
            },
            extra,
        };

        let text = encode(&outer).unwrap();
        assert_eq!(
            text,
            r#"{"label":"l","inner":{"name":"n","count":0},"extra":{"zeta":1,"alpha":{"nested":[1,2,{"deep":true}]},"mid":"v"}}"#
        );
        let back: Outer = decode_str(&text).unwrap();
        assert_eq!(back, outer);
    }

    #[test]
    fn test_missing_field_reports_path() {
        let text = r#"{"label":"x","inner":{"name":"n"},"extra":{}}"#;
        let err = decode_str::<Outer>(text).unwrap_err();
        match err {
            FactoryError::Decode { path, message } => {
                assert_eq!(path, "Outer.inner");
                assert!(message.contains("count"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_type_mismatch_reports_path() {
        let text = r#"{"label":"x","inner":{"name":5,"count":1},"extra":{}}"#;
        let err = decode_str::<Outer>(text).unwrap_err();
        assert!(matches!(
            err,
            FactoryError::Decode { ref path, .. } if path == "Outer.inner.name"
        ));
    }

    #[test]
    fn test_root_level_errors() {
        let err = decode::<Outer>(b"not json").unwrap_err();
        assert!(matches!(err, FactoryError::Decode { ref path, .. } if path == "Outer"));

        let err = decode::<Outer>(br#"{"label":"x"}"#).unwrap_err();
        assert!(matches!(err, FactoryError::Decode { ref path, .. } if path == "Outer"));
    }

    #[test]
    fn test_trailing_data_rejected() {
        let text = r#"{"label":"x","inner":{"name":"n","count":3},"extra":{}} {}"#;
        assert!(decode_str::<Outer>(text).is_err());
    }

    #[test]
    fn test_encode_pretty_indents_two_spaces() {
        let text = encode_pretty(&json!({"a": {"b": 1}})).unwrap();
        assert_eq!(text, "{\n  \"a\": {\n    \"b\": 1\n  }\n}");
    }
}
