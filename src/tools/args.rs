//! Two-phase argument decoding: read the discriminator first, then decode the
//! typed parameter struct for that mode.

use crate::mcp::{ErrorCode, StructuredError};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::str::FromStr;
use strum::VariantNames;

/// Raw `arguments` object of a `tools/call`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs(Map<String, Value>);

impl ToolArgs {
    /// Accept an object, nothing, or an object encoded as a JSON string.
    pub fn from_value(arguments: Option<Value>) -> Result<Self, StructuredError> {
        match arguments {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(Value::Object(map)) => Ok(Self(map)),
            Some(Value::String(raw)) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(map)) => Ok(Self(map)),
                Ok(_) => Err(not_an_object()),
                Err(e) => Err(StructuredError::new(
                    ErrorCode::InvalidJson,
                    format!("arguments string is not valid JSON: {e}"),
                )
                .with_param("arguments")),
            },
            Some(_) => Err(not_an_object()),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn require_str(&self, key: &str) -> Result<&str, StructuredError> {
        match self.get(key) {
            None => Err(StructuredError::missing_param(key)),
            Some(Value::String(_)) => self
                .str(key)
                .ok_or_else(|| StructuredError::invalid_param(key, format!("'{key}' must not be empty"))),
            Some(_) => Err(StructuredError::invalid_param(
                key,
                format!("'{key}' must be a string"),
            )),
        }
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(Value::as_u64)
    }

    /// Phase one: parse the discriminator named `key`.
    pub fn mode<M>(&self, key: &str) -> Result<M, StructuredError>
    where
        M: FromStr + VariantNames,
    {
        let valid = M::VARIANTS;
        let raw = match self.get(key) {
            None => {
                return Err(StructuredError::missing_param(key)
                    .with_hint(format!("Valid values: {}", valid.join(", "))));
            }
            Some(Value::String(raw)) => raw.trim(),
            Some(_) => {
                return Err(StructuredError::invalid_param(
                    key,
                    format!("'{key}' must be a string"),
                ));
            }
        };
        raw.parse()
            .map_err(|_| StructuredError::unknown_mode(key, raw, valid))
    }

    /// Phase two: decode the typed parameters for the selected mode. Fields
    /// the struct does not name are ignored here and reported separately.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StructuredError> {
        serde_json::from_value(Value::Object(self.0.clone())).map_err(|e| {
            StructuredError::new(ErrorCode::InvalidParam, format!("Invalid arguments: {e}"))
        })
    }

    /// Argument names not in `known`, in sorted order.
    pub fn unknown_keys<'a>(&'a self, known: &[&str]) -> Vec<&'a str> {
        self.0
            .keys()
            .map(String::as_str)
            .filter(|key| !known.contains(key))
            .collect()
    }

    /// Copy of the arguments without `keys`, used as command params.
    pub fn without(&self, keys: &[&str]) -> Value {
        Value::Object(
            self.0
                .iter()
                .filter(|(k, v)| !keys.contains(&k.as_str()) && !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

fn not_an_object() -> StructuredError {
    StructuredError::new(ErrorCode::InvalidJson, "arguments must be a JSON object")
        .with_param("arguments")
}
