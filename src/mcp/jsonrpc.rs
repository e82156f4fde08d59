//! JSON-RPC 2.0 envelopes.

use crate::error::ProtocolError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// Incoming request or notification.
///
/// `id` distinguishes the two: a missing field is a notification, while an
/// explicit `"id": null` is still a request that gets a response.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default, deserialize_with = "present")]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl From<&ProtocolError> for JsonRpcError {
    fn from(err: &ProtocolError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            data: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, err: &ProtocolError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: None,
            error: Some(err.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Outcome of decoding one frame.
#[derive(Debug)]
pub enum Decoded {
    Request(JsonRpcRequest),
    /// The frame was rejected; answer with this response.
    Reject(JsonRpcResponse),
    /// Malformed notification; nothing to send.
    Ignore,
}

/// Decode a raw frame, applying envelope validation.
///
/// Unparseable bytes and non-object frames are answered with `id: null`.
/// A malformed envelope is answered only when it carries an `id`.
pub fn decode(bytes: &[u8]) -> Decoded {
    let value: Value = match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(err) => {
            return Decoded::Reject(JsonRpcResponse::failure(
                Value::Null,
                &ProtocolError::Parse(err.to_string()),
            ));
        }
    };

    let Value::Object(map) = &value else {
        return Decoded::Reject(JsonRpcResponse::failure(
            Value::Null,
            &ProtocolError::InvalidRequest("request must be a JSON object".into()),
        ));
    };
    let raw_id = map.get("id").cloned();

    let invalid = |reason: &str| match &raw_id {
        Some(id) => Decoded::Reject(JsonRpcResponse::failure(
            id.clone(),
            &ProtocolError::InvalidRequest(reason.to_string()),
        )),
        None => Decoded::Ignore,
    };

    if map.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return invalid("jsonrpc must be \"2.0\"");
    }
    if !map.get("method").is_some_and(Value::is_string) {
        return invalid("method must be a string");
    }

    match serde_json::from_value::<JsonRpcRequest>(value) {
        Ok(request) => Decoded::Request(request),
        Err(err) => invalid(&err.to_string()),
    }
}
