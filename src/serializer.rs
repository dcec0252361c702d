//! Serializers: captured value (serde_json::Value) -> snapshot text.
//!
//! Built-ins:
//! - ToStringSerializer ("text"): strings verbatim, everything else compact JSON.
//! - JsonSerializer ("json"): pretty JSON; object keys come out sorted because
//!   serde_json's Map is a BTreeMap without `preserve_order`.
//! - Base64Serializer ("base64"): byte arrays / strings as standard base64.

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;

use crate::strategy::StrategyContext;

pub const FORMAT_TEXT: &str = "TEXT";
pub const FORMAT_JSON: &str = "JSON";
pub const FORMAT_BASE64: &str = "BASE64";

pub trait SnapshotSerializer: Send + Sync {
    fn serialize(&self, value: &Value, ctx: &StrategyContext) -> Result<String>;

    /// Tag reporters use to decide whether they can render this output.
    fn output_format(&self) -> &str;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ToStringSerializer;

impl SnapshotSerializer for ToStringSerializer {
    fn serialize(&self, value: &Value, _ctx: &StrategyContext) -> Result<String> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Null => Ok(String::new()),
            other => serde_json::to_string(other).context("compact json"),
        }
    }

    fn output_format(&self) -> &str {
        FORMAT_TEXT
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl SnapshotSerializer for JsonSerializer {
    fn serialize(&self, value: &Value, _ctx: &StrategyContext) -> Result<String> {
        serde_json::to_string_pretty(value).context("pretty json")
    }

    fn output_format(&self) -> &str {
        FORMAT_JSON
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Base64Serializer;

impl Base64Serializer {
    fn bytes_of(value: &Value) -> Result<Vec<u8>> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::String(s) => Ok(s.as_bytes().to_vec()),
            Value::Array(items) if items.iter().all(|v| v.as_u64().is_some()) => items
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let n = v.as_u64().unwrap_or(u64::MAX);
                    u8::try_from(n).map_err(|_| anyhow!("element {} = {} is not a byte", i, n))
                })
                .collect(),
            other => Ok(serde_json::to_string(other)?.into_bytes()),
        }
    }
}

impl SnapshotSerializer for Base64Serializer {
    fn serialize(&self, value: &Value, _ctx: &StrategyContext) -> Result<String> {
        let bytes = Self::bytes_of(value)?;
        Ok(STANDARD.encode(bytes))
    }

    fn output_format(&self) -> &str {
        FORMAT_BASE64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> StrategyContext {
        StrategyContext::new("k")
    }

    #[test]
    fn to_string_keeps_strings_raw() {
        let s = ToStringSerializer;
        assert_eq!(s.serialize(&json!("a\nb"), &ctx()).unwrap(), "a\nb");
        assert_eq!(s.serialize(&json!([1, 2]), &ctx()).unwrap(), "[1,2]");
    }

    #[test]
    fn json_is_pretty_with_sorted_keys() {
        let s = JsonSerializer;
        let out = s.serialize(&json!({"b": 1, "a": [true]}), &ctx()).unwrap();
        assert_eq!(out, "{\n  \"a\": [\n    true\n  ],\n  \"b\": 1\n}");
    }

    #[test]
    fn base64_of_bytes_and_strings() {
        let s = Base64Serializer;
        assert_eq!(s.serialize(&json!([104, 105]), &ctx()).unwrap(), "aGk=");
        assert_eq!(s.serialize(&json!("hi"), &ctx()).unwrap(), "aGk=");
        assert!(s.serialize(&json!([300]), &ctx()).is_err());
    }
}
