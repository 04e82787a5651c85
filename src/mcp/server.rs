//! SDK MCP server: a minimal JSON-RPC 2.0 responder for host tools

use std::collections::HashMap;

use serde_json::{json, Value};
use tracing::debug;

use super::tool::{SdkMcpTool, ToolContext};

/// MCP protocol version answered from `initialize`
const PROTOCOL_VERSION: &str = "2024-11-05";

/// An in-process MCP server hosting custom tools.
///
/// The tool catalogue is frozen at construction; the server then answers
/// JSON-RPC requests routed to it by the control protocol for as long as
/// the query holds it.
pub struct SdkMcpServer {
    name: String,
    version: String,
    tools: HashMap<String, SdkMcpTool>,
}

impl SdkMcpServer {
    /// Create a new MCP server with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: "1.0.0".to_string(),
            tools: HashMap::new(),
        }
    }

    /// Set the server version
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Register a tool. Names are unique within a server; a tool with an
    /// existing name replaces the previous one.
    pub fn tool(mut self, tool: SdkMcpTool) -> Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    /// Register multiple tools at once
    pub fn tools(mut self, tools: Vec<SdkMcpTool>) -> Self {
        for tool in tools {
            self.tools.insert(tool.name().to_string(), tool);
        }
        self
    }

    /// Server name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Server version
    pub fn server_version(&self) -> &str {
        &self.version
    }

    /// Handle one JSON-RPC message and produce the reply.
    ///
    /// Routing:
    /// - `initialize` → protocol version and capabilities
    /// - `tools/list` → normalized tool catalogue
    /// - `tools/call` → invoke the named tool
    /// - `notifications/initialized` → empty acknowledgement
    /// - anything else → `-32601` Method not found
    pub async fn handle_message(&self, context: ToolContext, message: &Value) -> Value {
        let method = message.get("method").and_then(Value::as_str).unwrap_or("");
        let msg_id = message.get("id").cloned().unwrap_or(Value::Null);
        let params = message.get("params").cloned().unwrap_or(Value::Null);

        debug!(server = %self.name, method, "handling MCP request");

        match method {
            "initialize" => self.handle_initialize(msg_id),
            "tools/list" => self.handle_list_tools(msg_id),
            "tools/call" => self.handle_call_tool(context, msg_id, params).await,
            "notifications/initialized" => json!({
                "jsonrpc": "2.0",
                "result": {},
            }),
            other => json!({
                "jsonrpc": "2.0",
                "id": msg_id,
                "error": {
                    "code": -32601,
                    "message": format!("Method '{other}' not found"),
                },
            }),
        }
    }

    fn handle_initialize(&self, msg_id: Value) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": msg_id,
            "result": {
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {},
                },
                "serverInfo": {
                    "name": self.name,
                    "version": self.version,
                },
            },
        })
    }

    fn handle_list_tools(&self, msg_id: Value) -> Value {
        let tools: Vec<Value> = self
            .tools
            .values()
            .map(|tool| {
                json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "inputSchema": normalize_schema(tool.input_schema()),
                })
            })
            .collect();

        json!({
            "jsonrpc": "2.0",
            "id": msg_id,
            "result": { "tools": tools },
        })
    }

    async fn handle_call_tool(&self, context: ToolContext, msg_id: Value, params: Value) -> Value {
        let tool_name = params
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let Some(tool) = self.tools.get(tool_name) else {
            return json!({
                "jsonrpc": "2.0",
                "id": msg_id,
                "error": {
                    "code": -32602,
                    "message": format!("Tool '{tool_name}' not found"),
                },
            });
        };

        // Missing arguments are tolerated; the handler sees null.
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        if context.cancellation.is_cancelled() {
            return json!({
                "jsonrpc": "2.0",
                "id": msg_id,
                "result": {
                    "content": [{"type": "text", "text": "Error: tool invocation cancelled"}],
                    "isError": true,
                },
            });
        }

        match tool.invoke(context, arguments).await {
            Ok(result) => {
                let result_json = serde_json::to_value(result).unwrap_or(Value::Null);
                json!({
                    "jsonrpc": "2.0",
                    "id": msg_id,
                    "result": result_json,
                })
            }
            Err(e) => json!({
                "jsonrpc": "2.0",
                "id": msg_id,
                "result": {
                    "content": [{"type": "text", "text": format!("Error: {e}")}],
                    "isError": true,
                },
            }),
        }
    }
}

impl std::fmt::Debug for SdkMcpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdkMcpServer")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Normalize a registered input schema to JSON Schema.
///
/// Pre-formed schemas (objects carrying `type` and `properties`) pass
/// through unchanged; `name → primitive-type` maps become an `object`
/// schema with every field required.
fn normalize_schema(schema: &Value) -> Value {
    let Some(map) = schema.as_object() else {
        return json!({"type": "object", "properties": {}});
    };

    if map.contains_key("type") && map.contains_key("properties") {
        return schema.clone();
    }

    let mut properties = serde_json::Map::new();
    let mut required = Vec::with_capacity(map.len());
    for (name, type_val) in map {
        required.push(Value::String(name.clone()));
        properties.insert(name.clone(), type_to_schema(type_val));
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn type_to_schema(type_val: &Value) -> Value {
    match type_val {
        // A pre-formed property schema passes through.
        Value::Object(_) => type_val.clone(),
        Value::String(name) => match name.as_str() {
            "number" | "float" | "float64" => json!({"type": "number"}),
            "integer" | "int" => json!({"type": "integer"}),
            "boolean" | "bool" => json!({"type": "boolean"}),
            _ => json!({"type": "string"}),
        },
        _ => json!({"type": "string"}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::ToolResult;

    fn echo_tool(name: &str) -> SdkMcpTool {
        SdkMcpTool::new(
            name,
            format!("Test tool {name}"),
            json!({"text": "string"}),
            |_ctx, input| async move {
                let text = input["text"].as_str().unwrap_or("default").to_string();
                Ok(ToolResult::text(text))
            },
        )
    }

    #[tokio::test]
    async fn test_initialize() {
        let server = SdkMcpServer::new("test").version("2.0.0");
        let reply = server
            .handle_message(
                ToolContext::default(),
                &json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}),
            )
            .await;

        assert_eq!(reply["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(reply["result"]["serverInfo"]["name"], "test");
        assert_eq!(reply["result"]["serverInfo"]["version"], "2.0.0");
        assert!(reply["result"]["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_tools_list() {
        let server = SdkMcpServer::new("test")
            .tool(echo_tool("tool1"))
            .tool(echo_tool("tool2"));

        let reply = server
            .handle_message(
                ToolContext::default(),
                &json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}),
            )
            .await;

        let tools = reply["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0]["inputSchema"]["type"], "object");
    }

    #[tokio::test]
    async fn test_tools_call() {
        let server = SdkMcpServer::new("test").tool(echo_tool("echo"));

        let reply = server
            .handle_message(
                ToolContext::default(),
                &json!({
                    "jsonrpc": "2.0",
                    "id": 2,
                    "method": "tools/call",
                    "params": {"name": "echo", "arguments": {"text": "hello"}},
                }),
            )
            .await;

        assert_eq!(reply["id"], 2);
        assert_eq!(reply["result"]["content"][0]["text"], "hello");
    }

    #[tokio::test]
    async fn test_tool_not_found() {
        let server = SdkMcpServer::new("test");
        let reply = server
            .handle_message(
                ToolContext::default(),
                &json!({
                    "jsonrpc": "2.0",
                    "id": 3,
                    "method": "tools/call",
                    "params": {"name": "nope", "arguments": {}},
                }),
            )
            .await;

        assert_eq!(reply["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let server = SdkMcpServer::new("test");
        let reply = server
            .handle_message(
                ToolContext::default(),
                &json!({"jsonrpc": "2.0", "id": 4, "method": "unknown/method"}),
            )
            .await;

        assert_eq!(reply["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn test_notifications_initialized() {
        let server = SdkMcpServer::new("test");
        let reply = server
            .handle_message(
                ToolContext::default(),
                &json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            )
            .await;

        assert_eq!(reply["result"], json!({}));
    }

    #[tokio::test]
    async fn test_handler_error_becomes_error_result() {
        let server = SdkMcpServer::new("test").tool(SdkMcpTool::new(
            "boom",
            "Always fails",
            json!({}),
            |_ctx, _input| async move {
                Err(crate::error::ClaudeError::mcp("database unavailable"))
            },
        ));

        let reply = server
            .handle_message(
                ToolContext::default(),
                &json!({
                    "jsonrpc": "2.0",
                    "id": 5,
                    "method": "tools/call",
                    "params": {"name": "boom"},
                }),
            )
            .await;

        assert_eq!(reply["result"]["isError"], true);
        let text = reply["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("database unavailable"));
    }

    #[test]
    fn test_normalize_simple_type_map() {
        let schema = normalize_schema(&json!({"a": "number", "b": "number"}));
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["a"]["type"], "number");
        let mut required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        required.sort_unstable();
        assert_eq!(required, vec!["a", "b"]);
    }

    #[test]
    fn test_normalize_passthrough() {
        let schema = json!({
            "type": "object",
            "properties": {"x": {"type": "string"}},
            "required": ["x"],
        });
        assert_eq!(normalize_schema(&schema), schema);
    }

    #[test]
    fn test_normalize_type_names() {
        let schema = normalize_schema(&json!({
            "s": "string",
            "i": "int",
            "f": "float",
            "b": "bool",
            "other": "whatever",
        }));
        assert_eq!(schema["properties"]["s"]["type"], "string");
        assert_eq!(schema["properties"]["i"]["type"], "integer");
        assert_eq!(schema["properties"]["f"]["type"], "number");
        assert_eq!(schema["properties"]["b"]["type"], "boolean");
        assert_eq!(schema["properties"]["other"]["type"], "string");
    }
}
