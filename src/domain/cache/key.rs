//! Cache key derivation
//!
//! `hex(SHA256(utf8(normalized_query) + utf8(json_sorted_keys(context or {}))))`
//!
//! The context is rendered the way a sorted-key JSON dump with default
//! separators renders it (`{"a": 1, "b": [1, 2]}`, non-ASCII escaped as
//! `\uXXXX`) so keys stay stable across implementations sharing a cache
//! directory.

use std::collections::BTreeMap;
use std::io;

use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::domain::DomainError;

/// Opaque key/value map that scopes a cached response
pub type CacheContext = BTreeMap<String, Value>;

/// Derive the storage key for a normalized query and optional context
pub fn derive_cache_key(
    normalized_query: &str,
    context: Option<&CacheContext>,
) -> Result<String, DomainError> {
    let context_json = canonical_json(context)?;

    let mut hasher = Sha256::new();
    hasher.update(normalized_query.as_bytes());
    hasher.update(context_json.as_bytes());

    Ok(hex::encode(hasher.finalize()))
}

/// Sorted-key JSON rendering of the context, `{}` when absent
pub fn canonical_json(context: Option<&CacheContext>) -> Result<String, DomainError> {
    let value = match context {
        Some(context) => Value::Object(
            context
                .iter()
                .map(|(k, v)| (k.clone(), sort_keys(v)))
                .collect(),
        ),
        None => Value::Object(serde_json::Map::new()),
    };

    let mut buffer = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, SpacedAsciiFormatter);
    value.serialize(&mut serializer)?;

    String::from_utf8(buffer)
        .map_err(|e| DomainError::serialization(format!("Context JSON is not UTF-8: {}", e)))
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> =
                map.iter().map(|(k, v)| (k, sort_keys(v))).collect();
            Value::Object(sorted.into_iter().map(|(k, v)| (k.clone(), v)).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// `", "` / `": "` separators and ASCII-only string output
struct SpacedAsciiFormatter;

impl Formatter for SpacedAsciiFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        for ch in fragment.chars() {
            if ch.is_ascii() {
                writer.write_all(&[ch as u8])?;
            } else {
                let mut units = [0u16; 2];

                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_context_renders_braces() {
        assert_eq!(canonical_json(None).unwrap(), "{}");
        assert_eq!(canonical_json(Some(&CacheContext::new())).unwrap(), "{}");
    }

    #[test]
    fn test_key_without_context() {
        let key = derive_cache_key("what is 2+2?", None).unwrap();

        assert_eq!(
            key,
            "b884c3ed52fa3d8cb81bec571eadcfda320e4bd6e93c77f3c26e85ead2fbba70"
        );
    }

    #[test]
    fn test_canonical_json_sorts_and_spaces() {
        let mut context = CacheContext::new();
        context.insert("model".to_string(), json!("gpt-4"));
        context.insert("b".to_string(), json!([1, 2]));
        context.insert("a".to_string(), json!({"z": 1, "y": "é"}));

        assert_eq!(
            canonical_json(Some(&context)).unwrap(),
            r#"{"a": {"y": "\u00e9", "z": 1}, "b": [1, 2], "model": "gpt-4"}"#
        );
        assert_eq!(
            derive_cache_key("hello", Some(&context)).unwrap(),
            "9e0acc807dbe182af1dc0ba73c2eef29b06611df210a742e0437eecf00454b17"
        );
    }

    #[test]
    fn test_context_changes_key() {
        let mut context = CacheContext::new();
        context.insert("model".to_string(), json!("gpt-4"));

        let plain = derive_cache_key("hello", None).unwrap();
        let scoped = derive_cache_key("hello", Some(&context)).unwrap();

        assert_ne!(plain, scoped);
        assert_eq!(plain.len(), 64);
    }
}
