//! Interactive client for bidirectional conversations with Claude Code
//!
//! [`ClaudeSDKClient`] keeps a conversation open: send follow-up messages
//! based on responses, interrupt a running turn, switch permission mode or
//! model mid-conversation, and serve permission/hook/tool callbacks while
//! messages stream in.
//!
//! ```no_run
//! use claude_agent_sdk::{ClaudeSDKClient, ClaudeAgentOptions, Message};
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = ClaudeSDKClient::new(ClaudeAgentOptions::default());
//! client.connect().await?;
//!
//! client.query("Hello, Claude!").await?;
//!
//! {
//!     let mut response = std::pin::pin!(client.receive_response());
//!     while let Some(message) = response.next().await {
//!         match message? {
//!             Message::Assistant(m) => println!("{:?}", m.content),
//!             Message::Result(_) => break,
//!             _ => {}
//!         }
//!     }
//! }
//!
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use futures::Stream;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::control::Query;
use crate::error::{ClaudeError, Result};
use crate::mcp::SdkMcpServer;
use crate::message::{parse_message, Message};
use crate::permissions::validate_permission_settings;
use crate::transport::{PromptInput, SubprocessTransport, Transport};
use crate::types::{ClaudeAgentOptions, McpServerConfig, PermissionMode, SessionId};

/// Pull the in-process SDK MCP server instances out of the configured
/// server map; these are served over the control protocol.
pub(crate) fn extract_sdk_mcp_servers(
    servers: &HashMap<String, McpServerConfig>,
) -> HashMap<String, Arc<SdkMcpServer>> {
    servers
        .iter()
        .filter_map(|(name, config)| match config {
            McpServerConfig::Sdk(sdk) => Some((name.clone(), sdk.instance.clone())),
            _ => None,
        })
        .collect()
}

/// Client for bidirectional, stateful conversations with Claude Code.
///
/// For simple one-shot interactions, see [`query()`](crate::query()).
pub struct ClaudeSDKClient {
    options: ClaudeAgentOptions,
    custom_transport: Option<Box<dyn Transport>>,
    query: Option<Query>,
    message_rx: Option<mpsc::Receiver<Result<Value>>>,
    input_task: Option<JoinHandle<Result<()>>>,
    current_session: SessionId,
}

impl ClaudeSDKClient {
    /// Create a new client with the given options.
    pub fn new(options: ClaudeAgentOptions) -> Self {
        Self {
            options,
            custom_transport: None,
            query: None,
            message_rx: None,
            input_task: None,
            current_session: SessionId::default(),
        }
    }

    /// Create a client with a custom transport instead of the CLI
    /// subprocess.
    pub fn with_transport(options: ClaudeAgentOptions, transport: Box<dyn Transport>) -> Self {
        Self {
            options,
            custom_transport: Some(transport),
            query: None,
            message_rx: None,
            input_task: None,
            current_session: SessionId::default(),
        }
    }

    /// Connect to Claude Code with no initial prompt.
    pub async fn connect(&mut self) -> Result<()> {
        self.connect_inner(None).await
    }

    /// Connect and send an initial prompt.
    pub async fn connect_with_prompt(&mut self, prompt: impl Into<String>) -> Result<()> {
        let prompt = prompt.into();
        self.connect_inner(None).await?;
        self.query(prompt).await
    }

    /// Connect with a stream of input messages. Each received frame is
    /// written to the CLI; the input closes when the stream ends.
    pub async fn connect_with_stream(&mut self, stream: mpsc::Receiver<Value>) -> Result<()> {
        self.connect_inner(Some(stream)).await
    }

    async fn connect_inner(&mut self, stream: Option<mpsc::Receiver<Value>>) -> Result<()> {
        if self.query.is_some() {
            return Ok(());
        }

        // Interactive clients always run the streaming protocol.
        let mut options = self.options.clone();
        validate_permission_settings(&mut options, true)?;
        options
            .env
            .entry("CLAUDE_CODE_ENTRYPOINT".to_string())
            .or_insert_with(|| "sdk-rust-client".to_string());

        let mut transport: Box<dyn Transport> = match self.custom_transport.take() {
            Some(transport) => transport,
            None => Box::new(SubprocessTransport::new(
                PromptInput::Stream,
                options.clone(),
                None,
            )?),
        };

        transport.connect().await?;

        let sdk_mcp_servers = extract_sdk_mcp_servers(&options.mcp_servers);
        let buffer_size = options.message_channel_buffer_size.unwrap_or(0);

        let mut query = Query::new(
            transport,
            true,
            options.can_use_tool.clone(),
            options.hooks.clone(),
            sdk_mcp_servers,
            buffer_size,
        );

        query.start().await?;
        query.initialize().await?;

        self.message_rx = query.take_message_receiver();
        if let Some(stream) = stream {
            self.input_task = Some(query.spawn_stream_input(stream));
        }
        self.query = Some(query);

        debug!("client connected");
        Ok(())
    }

    fn connected_query(&self) -> Result<&Query> {
        self.query
            .as_ref()
            .ok_or_else(|| ClaudeError::not_connected("not connected. Call connect() first"))
    }

    /// Send a user message in the current session.
    pub async fn query(&mut self, prompt: impl Into<String>) -> Result<()> {
        let session = self.current_session.clone();
        self.query_with_session(prompt, session).await
    }

    /// Send a user message in a specific session.
    pub async fn query_with_session(
        &mut self,
        prompt: impl Into<String>,
        session_id: impl Into<SessionId>,
    ) -> Result<()> {
        let query = self.connected_query()?;
        let frame = json!({
            "type": "user",
            "message": {
                "role": "user",
                "content": prompt.into(),
            },
            "parent_tool_use_id": null,
            "session_id": session_id.into().as_str(),
        });
        query.write_frame(&frame).await
    }

    /// Receive all messages until the connection ends.
    ///
    /// The stream borrows the client's single data channel; drop it to call
    /// control methods, then resume receiving.
    pub fn receive_messages(&mut self) -> impl Stream<Item = Result<Message>> + '_ {
        let rx = self.message_rx.as_mut();
        async_stream::stream! {
            let Some(rx) = rx else {
                yield Err(ClaudeError::not_connected(
                    "not connected. Call connect() first",
                ));
                return;
            };
            while let Some(item) = rx.recv().await {
                match item {
                    Ok(value) => yield parse_message(&value),
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }
    }

    /// Receive messages until and including the next result message.
    ///
    /// Convenience over [`receive_messages`](Self::receive_messages) for
    /// single-response workflows.
    pub fn receive_response(&mut self) -> impl Stream<Item = Result<Message>> + '_ {
        let rx = self.message_rx.as_mut();
        async_stream::stream! {
            let Some(rx) = rx else {
                yield Err(ClaudeError::not_connected(
                    "not connected. Call connect() first",
                ));
                return;
            };
            while let Some(item) = rx.recv().await {
                match item {
                    Ok(value) => {
                        let message = parse_message(&value);
                        let done = matches!(message, Ok(Message::Result(_)));
                        yield message;
                        if done {
                            return;
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }
    }

    /// Interrupt the current turn.
    pub async fn interrupt(&mut self) -> Result<()> {
        self.connected_query()?.interrupt().await
    }

    /// Change the permission mode during the conversation.
    pub async fn set_permission_mode(&mut self, mode: PermissionMode) -> Result<()> {
        self.connected_query()?.set_permission_mode(mode).await
    }

    /// Change the model during the conversation.
    pub async fn set_model(&mut self, model: impl AsRef<str>) -> Result<()> {
        self.connected_query()?.set_model(model.as_ref()).await
    }

    /// Server initialization info: available commands, output styles, and
    /// capabilities. `None` before connect.
    pub fn get_server_info(&self) -> Option<&Value> {
        self.query.as_ref().and_then(|q| q.init_result())
    }

    /// Close the connection. Idempotent; safe to call before connect.
    pub async fn disconnect(&mut self) -> Result<()> {
        if let Some(task) = self.input_task.take() {
            task.abort();
        }
        self.message_rx = None;
        if let Some(mut query) = self.query.take() {
            query.close().await?;
        }
        Ok(())
    }

    /// Alias for [`disconnect`](Self::disconnect).
    pub async fn close(&mut self) -> Result<()> {
        self.disconnect().await
    }
}
