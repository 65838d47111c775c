use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const JSONRPC_VERSION: &str = "2.0";
/// Advertised when the client does not name a protocol version.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// Incoming JSON-RPC message. Without an `id` it is a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl McpRequest {
    /// Notifications carry no `id` and get no response.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl McpResponse {
    /// Response carrying a result.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Response carrying a JSON-RPC error.
    pub fn error(id: Value, error: &McpError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: None,
            error: Some(RpcError {
                code: error.code(),
                message: error.to_string(),
            }),
        }
    }
}

/// Protocol level failures. Tool failures are not errors here; they travel
/// inside a successful `tools/call` result.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Method not found: {0}")]
    MethodNotFound(String),
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

impl McpError {
    /// JSON-RPC error code.
    pub fn code(&self) -> i64 {
        match self {
            McpError::Parse(_) => -32700,
            McpError::InvalidRequest(_) => -32600,
            McpError::MethodNotFound(_) => -32601,
            McpError::InvalidParams(_) | McpError::UnknownTool(_) => -32602,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_without_id_is_notification() {
        let req: McpRequest =
            serde_json::from_value(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
                .unwrap();
        assert!(req.is_notification());
        assert!(req.params.is_null());

        let req: McpRequest =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": "a-1", "method": "ping"})).unwrap();
        assert!(!req.is_notification());
    }

    #[test]
    fn error_response_shape() {
        let resp = McpResponse::error(json!(7), &McpError::MethodNotFound("foo".into()));
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["id"], json!(7));
        assert_eq!(value["error"]["code"], json!(-32601));
        assert_eq!(value["error"]["message"], json!("Method not found: foo"));
        assert!(value.get("result").is_none());
    }
}
