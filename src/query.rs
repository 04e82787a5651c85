//! One-shot query function for simple interactions

use futures::Stream;

use crate::client::extract_sdk_mcp_servers;
use crate::control::Query;
use crate::error::{ClaudeError, Result};
use crate::message::{parse_message, Message};
use crate::permissions::validate_permission_settings;
use crate::transport::{PromptInput, SubprocessTransport, Transport};
use crate::types::ClaudeAgentOptions;

/// One-shot query against Claude Code.
///
/// Ideal for stateless interactions where no follow-up is needed: the
/// prompt travels on the command line, stdin closes immediately, and the
/// returned stream yields messages until the CLI exits. For interactive,
/// stateful conversations use [`ClaudeSDKClient`](crate::ClaudeSDKClient)
/// instead — one-shot mode supports neither interrupts nor permission
/// callbacks.
///
/// ```no_run
/// use claude_agent_sdk::{query, Message};
/// use futures::StreamExt;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let stream = query("What is the capital of France?", None).await?;
/// let mut stream = std::pin::pin!(stream);
///
/// while let Some(message) = stream.next().await {
///     if let Message::Assistant(m) = message? {
///         println!("{:?}", m.content);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn query(
    prompt: impl Into<String>,
    options: Option<ClaudeAgentOptions>,
) -> Result<impl Stream<Item = Result<Message>>> {
    let mut options = options.unwrap_or_default();
    validate_permission_settings(&mut options, false)?;
    options
        .env
        .entry("CLAUDE_CODE_ENTRYPOINT".to_string())
        .or_insert_with(|| "sdk-rust".to_string());

    let sdk_mcp_servers = extract_sdk_mcp_servers(&options.mcp_servers);
    let buffer_size = options.message_channel_buffer_size.unwrap_or(0);

    let mut transport =
        SubprocessTransport::new(PromptInput::from(prompt.into()), options.clone(), None)?;
    transport.connect().await?;

    let mut handler = Query::new(
        Box::new(transport),
        false,
        options.can_use_tool.clone(),
        options.hooks.clone(),
        sdk_mcp_servers,
        buffer_size,
    );
    handler.start().await?;

    let mut rx = handler
        .take_message_receiver()
        .ok_or_else(|| ClaudeError::connection("message channel unavailable"))?;

    Ok(async_stream::stream! {
        while let Some(item) = rx.recv().await {
            match item {
                Ok(value) => yield parse_message(&value),
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
        // The handler owns the transport; tear it down when the stream
        // is exhausted or dropped.
        let _ = handler.close().await;
    })
}
