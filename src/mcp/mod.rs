//! In-process SDK MCP server
//!
//! Lets the host register tools that Claude invokes directly, without a
//! subprocess: the CLI forwards JSON-RPC 2.0 requests through the control
//! protocol (`mcp_message`), and the server answers them in-process.
//!
//! # Quick Start
//!
//! ```rust
//! use claude_agent_sdk::mcp::{SdkMcpServer, SdkMcpTool, ToolResult};
//! use serde_json::json;
//!
//! let server = SdkMcpServer::new("calculator")
//!     .version("1.0.0")
//!     .tool(SdkMcpTool::new(
//!         "add",
//!         "Add two numbers",
//!         json!({"a": "number", "b": "number"}),
//!         |_ctx, input| Box::pin(async move {
//!             let sum = input["a"].as_f64().unwrap_or(0.0)
//!                 + input["b"].as_f64().unwrap_or(0.0);
//!             Ok(ToolResult::text(sum.to_string()))
//!         }),
//!     ));
//! # let _ = server;
//! ```
//!
//! Input schemas may be full JSON Schema objects or simple
//! `name → primitive-type` maps; the latter are normalized to an object
//! schema with every field required.

mod server;
mod tool;

pub use server::SdkMcpServer;
pub use tool::{SdkMcpTool, ToolContent, ToolContext, ToolResult};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Type alias for tool handler functions.
///
/// A handler receives a cancellation-aware [`ToolContext`] and the tool
/// arguments as JSON, and returns a [`ToolResult`]. Handlers must be
/// `Send + Sync + 'static` to support concurrent invocation.
pub type ToolHandler = Arc<
    dyn Fn(
            ToolContext,
            serde_json::Value,
        ) -> Pin<Box<dyn Future<Output = crate::error::Result<ToolResult>> + Send>>
        + Send
        + Sync,
>;
