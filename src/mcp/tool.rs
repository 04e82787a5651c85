//! Tool definitions for the SDK MCP server

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::ToolHandler;
use crate::error::Result;

/// Context passed to tool handlers.
///
/// The token is cancelled when the owning query shuts down; long-running
/// handlers should observe it and bail out with an error result.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Cancellation token for the invocation
    pub cancellation: CancellationToken,
}

/// A tool that Claude can invoke through the SDK MCP server.
pub struct SdkMcpTool {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) input_schema: serde_json::Value,
    pub(crate) handler: ToolHandler,
}

impl SdkMcpTool {
    /// Create a new tool.
    ///
    /// `input_schema` is either a full JSON Schema object or a simple
    /// `name → primitive-type` map.
    ///
    /// ```rust
    /// use claude_agent_sdk::mcp::{SdkMcpTool, ToolResult};
    /// use serde_json::json;
    ///
    /// let tool = SdkMcpTool::new(
    ///     "greet",
    ///     "Greet a user by name",
    ///     json!({"name": "string"}),
    ///     |_ctx, input| Box::pin(async move {
    ///         let name = input["name"].as_str().unwrap_or("stranger");
    ///         Ok(ToolResult::text(format!("Hello, {name}!")))
    ///     }),
    /// );
    /// # let _ = tool;
    /// ```
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolContext, serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolResult>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            handler: Arc::new(move |ctx, input| Box::pin(handler(ctx, input))),
        }
    }

    /// Tool name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tool description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Raw input schema as registered
    pub fn input_schema(&self) -> &serde_json::Value {
        &self.input_schema
    }

    /// Invoke the tool handler
    pub async fn invoke(&self, context: ToolContext, input: serde_json::Value) -> Result<ToolResult> {
        (self.handler)(context, input).await
    }
}

impl std::fmt::Debug for SdkMcpTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdkMcpTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish()
    }
}

/// Result returned by a tool handler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Content blocks (text, images)
    pub content: Vec<ToolContent>,
    /// Whether this result represents an error
    #[serde(skip_serializing_if = "Option::is_none", rename = "isError")]
    pub is_error: Option<bool>,
}

impl ToolResult {
    /// Create a successful text result
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: None,
        }
    }

    /// Create an error result
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: Some(true),
        }
    }
}

/// Content block in a tool result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content
    Text {
        /// The text content
        text: String,
    },
    /// Image content (base64 encoded)
    Image {
        /// Base64 encoded image data
        data: String,
        /// MIME type (e.g. "image/png")
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}
