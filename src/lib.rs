//! # Claude Agent SDK for Rust
//!
//! Rust SDK for building AI agents on top of the Claude Code CLI. The SDK
//! drives the CLI as a long-lived subprocess and layers a bidirectional
//! control protocol over its stdio: structured conversations stream in
//! while tool-permission queries, lifecycle hooks, and in-process MCP tool
//! calls flow back to host callbacks on the same pipe.
//!
//! ## Quick Start
//!
//! One-shot queries go through [`query()`]:
//!
//! ```no_run
//! use claude_agent_sdk::{query, Message};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let stream = query("What is 2 + 2?", None).await?;
//!     let mut stream = std::pin::pin!(stream);
//!
//!     while let Some(message) = stream.next().await {
//!         if let Message::Assistant(m) = message? {
//!             println!("{:?}", m.content);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Interactive conversations use [`ClaudeSDKClient`]:
//!
//! ```no_run
//! use claude_agent_sdk::{ClaudeSDKClient, ClaudeAgentOptions, Message};
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = ClaudeAgentOptions::builder()
//!     .system_prompt("You are a helpful coding assistant")
//!     .max_turns(10)
//!     .build();
//!
//! let mut client = ClaudeSDKClient::new(options);
//! client.connect().await?;
//! client.query("Hello, Claude!").await?;
//!
//! {
//!     let mut response = std::pin::pin!(client.receive_response());
//!     while let Some(message) = response.next().await {
//!         println!("{:?}", message?);
//!     }
//! }
//!
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Capabilities
//!
//! - **Permission control**: a [`types::CanUseToolCallback`] authorizes,
//!   rewrites, or rejects every tool invocation (see [`permissions`]).
//! - **Hooks**: host callbacks run at lifecycle points such as
//!   `PreToolUse` and `Stop` (see [`hooks`]).
//! - **In-process tools**: register an [`mcp::SdkMcpServer`] and Claude
//!   invokes your tools without any extra subprocess (see [`mcp`]).
//! - **Session control**: interrupt a running turn, switch permission
//!   mode or model mid-conversation.
//!
//! ## Architecture
//!
//! - [`transport`]: subprocess lifecycle and newline-delimited JSON
//!   framing over the CLI's stdio
//! - [`control`]: the control-protocol multiplexer correlating RPCs and
//!   dispatching host callbacks
//! - [`message`]: typed domain messages and their decoder
//! - [`client`] / [`query()`]: the interactive facade and the one-shot
//!   wrapper
//!
//! ## Requirements
//!
//! - Rust 1.75 or later
//! - Claude Code: `npm install -g @anthropic-ai/claude-code`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod control;
pub mod error;
pub mod hooks;
pub mod mcp;
pub mod message;
pub mod permissions;
mod query;
pub mod transport;
pub mod types;

pub use client::ClaudeSDKClient;
pub use error::{ClaudeError, Result};
pub use hooks::{hook_callback, HookMatcherBuilder};
pub use message::{parse_message, AssistantMessage, ContentBlock, Message, ResultMessage};
pub use permissions::permission_callback;
pub use query::query;
pub use transport::{PromptInput, SubprocessTransport, Transport};
pub use types::{
    AgentDefinition, CanUseToolCallback, ClaudeAgentOptions, ClaudeAgentOptionsBuilder,
    HookCallback, HookContext, HookEvent, HookJsonOutput, HookMatcher, McpServerConfig,
    PermissionMode, PermissionResult, PermissionResultAllow, PermissionResultAsk,
    PermissionResultDeny, PermissionUpdate, SessionId, SettingSource, SystemPrompt,
    SystemPromptPreset, ToolName, ToolPermissionContext,
};

/// Version of the SDK, reported to the CLI via `CLAUDE_AGENT_SDK_VERSION`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
