use anyhow::Result;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::handlers::ToolHandlers;
use crate::mcp::protocol::{McpError, McpRequest, McpResponse, DEFAULT_PROTOCOL_VERSION};
use crate::mcp::tools::Tool;

/// MCP server exposing the Docker tools to a single client over stdio.
pub struct McpServer {
    handlers: ToolHandlers,
    name: String,
    version: String,
}

impl McpServer {
    /// Server named after this crate.
    pub fn new(handlers: ToolHandlers) -> Self {
        Self {
            handlers,
            name: env!("CARGO_PKG_NAME").into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }

    /// Serves stdin/stdout until the client closes its end.
    pub async fn serve_stdio(&self) -> Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await
    }

    /// Requests are handled one at a time, in arrival order.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = Vec::new();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line).await? == 0 {
                break;
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            if let Some(response) = self.handle_line(&line).await {
                let mut payload = serde_json::to_string(&response)?;
                payload.push('\n');
                writer.write_all(payload.as_bytes()).await?;
                writer.flush().await?;
            }
        }
        tracing::info!("client closed the connection");
        Ok(())
    }

    /// Handles one raw line. Bytes that are not JSON get a parse error reply.
    pub async fn handle_line(&self, line: &[u8]) -> Option<McpResponse> {
        let value: Value = match serde_json::from_slice(line) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("unparseable message: {e}");
                return Some(McpResponse::error(Value::Null, &McpError::Parse(e.to_string())));
            }
        };

        match serde_json::from_value::<McpRequest>(value.clone()) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => {
                let id = value.get("id").cloned().unwrap_or(Value::Null);
                Some(McpResponse::error(id, &McpError::InvalidRequest(e.to_string())))
            }
        }
    }

    /// Returns `None` for notifications.
    pub async fn handle_request(&self, request: McpRequest) -> Option<McpResponse> {
        if request.is_notification() {
            tracing::debug!(method = %request.method, "notification");
            return None;
        }
        let id = request.id.clone().unwrap_or(Value::Null);

        tracing::debug!(method = %request.method, "request");
        let response = match self.dispatch(&request.method, &request.params).await {
            Ok(result) => McpResponse::success(id, result),
            Err(e) => {
                tracing::warn!(method = %request.method, "request failed: {e}");
                McpResponse::error(id, &e)
            }
        };
        Some(response)
    }

    async fn dispatch(&self, method: &str, params: &Value) -> Result<Value, McpError> {
        match method {
            "initialize" => Ok(self.initialize(params)),
            "ping" => Ok(json!({})),
            "tools/list" => {
                let tools: Vec<Value> = Tool::ALL.iter().map(Tool::definition).collect();
                Ok(json!({ "tools": tools }))
            }
            "tools/call" => self.call_tool(params).await,
            other => Err(McpError::MethodNotFound(other.to_string())),
        }
    }

    fn initialize(&self, params: &Value) -> Value {
        let protocol_version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_PROTOCOL_VERSION);

        json!({
            "protocolVersion": protocol_version,
            "capabilities": {
                "tools": { "listChanged": false }
            },
            "serverInfo": {
                "name": self.name,
                "version": self.version,
            }
        })
    }

    async fn call_tool(&self, params: &Value) -> Result<Value, McpError> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| McpError::InvalidParams("missing tool name".into()))?;
        let tool = Tool::from_name(name).ok_or_else(|| McpError::UnknownTool(name.to_string()))?;
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        let output = self.handlers.call(tool, &arguments).await;
        Ok(json!({
            "content": [{ "type": "text", "text": output.text }],
            "isError": output.is_error,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::docker::DockerEnv;

    fn server() -> McpServer {
        let env = DockerEnv::default().with_host("tcp://127.0.0.1:1");
        McpServer::new(ToolHandlers::with_env(Config::default(), env))
    }

    async fn call(server: &McpServer, message: Value) -> Option<Value> {
        server
            .handle_line(message.to_string().as_bytes())
            .await
            .map(|resp| serde_json::to_value(resp).unwrap())
    }

    #[tokio::test]
    async fn initialize_echoes_protocol_version() {
        let server = server();
        let resp = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize",
                   "params": {"protocolVersion": "2025-03-26"}}),
        )
        .await
        .unwrap();

        assert_eq!(resp["result"]["protocolVersion"], json!("2025-03-26"));
        assert_eq!(resp["result"]["serverInfo"]["name"], json!("docker-mcp"));
        assert!(resp["result"]["capabilities"]["tools"].is_object());

        let resp = call(&server, json!({"jsonrpc": "2.0", "id": 2, "method": "initialize"}))
            .await
            .unwrap();
        assert_eq!(resp["result"]["protocolVersion"], json!(DEFAULT_PROTOCOL_VERSION));
    }

    #[tokio::test]
    async fn lists_all_tools() {
        let resp = call(&server(), json!({"jsonrpc": "2.0", "id": "t", "method": "tools/list"}))
            .await
            .unwrap();

        assert_eq!(resp["id"], json!("t"));
        let names: Vec<&str> = resp["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "create-container",
                "deploy-compose",
                "get-logs",
                "list-containers",
                "get-container-info",
                "get-container-stats"
            ]
        );
    }

    #[tokio::test]
    async fn notifications_get_no_response() {
        let resp = call(
            &server(),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        )
        .await;
        assert!(resp.is_none());
    }

    #[tokio::test]
    async fn protocol_errors() {
        let server = server();

        let resp = call(&server, json!({"jsonrpc": "2.0", "id": 3, "method": "resources/list"}))
            .await
            .unwrap();
        assert_eq!(resp["error"]["code"], json!(-32601));

        let resp = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call",
                   "params": {"name": "remove-container", "arguments": {}}}),
        )
        .await
        .unwrap();
        assert_eq!(resp["error"]["code"], json!(-32602));
        assert!(resp["error"]["message"].as_str().unwrap().contains("remove-container"));

        let resp = server.handle_line(b"{not json").await.unwrap();
        let resp = serde_json::to_value(resp).unwrap();
        assert_eq!(resp["error"]["code"], json!(-32700));
        assert_eq!(resp["id"], Value::Null);

        let resp = call(&server, json!({"jsonrpc": "2.0", "id": 5})).await.unwrap();
        assert_eq!(resp["error"]["code"], json!(-32600));
        assert_eq!(resp["id"], json!(5));
    }

    #[tokio::test]
    async fn tool_failure_is_a_result_not_an_rpc_error() {
        let resp = call(
            &server(),
            json!({"jsonrpc": "2.0", "id": 6, "method": "tools/call",
                   "params": {"name": "list-containers"}}),
        )
        .await
        .unwrap();

        assert!(resp.get("error").is_none());
        assert_eq!(resp["result"]["isError"], json!(true));
        assert_eq!(resp["result"]["content"][0]["type"], json!("text"));
        let text = resp["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("Error listing containers:"));
    }

    #[tokio::test]
    async fn serves_line_delimited_messages_in_order() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#,
            "\n"
        );
        let mut output = Vec::new();
        server().serve(input.as_bytes(), &mut output).await.unwrap();

        let responses: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], json!(1));
        assert_eq!(responses[1]["id"], json!(2));
        assert_eq!(responses[1]["result"], json!({}));
    }

    #[tokio::test]
    async fn invalid_utf8_line_gets_parse_error_and_serving_continues() {
        let mut input = br#"{"jsonrpc":"2.0","id":1,"method":"ping","params":{"x":""#.to_vec();
        input.extend_from_slice(&[0xff, 0xfe]);
        input.extend_from_slice(b"\"}}\n");
        input.extend_from_slice(br#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#);
        input.extend_from_slice(b"\n");

        let mut output = Vec::new();
        server().serve(input.as_slice(), &mut output).await.unwrap();

        let responses: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["error"]["code"], json!(-32700));
        assert_eq!(responses[0]["id"], Value::Null);
        assert_eq!(responses[1]["id"], json!(2));
        assert_eq!(responses[1]["result"], json!({}));
    }
}
