//! Typed domain messages exchanged with the Claude Code CLI

mod parser;

pub use parser::parse_message;

use serde::{Deserialize, Serialize};
use serde_json::json;

/// Content value for tool results; either a plain string or content blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentValue {
    /// String content
    String(String),
    /// Structured content blocks forwarded as-is
    Blocks(Vec<serde_json::Value>),
}

/// Content block types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Text content
    Text {
        /// The text
        text: String,
    },
    /// Extended thinking content
    Thinking {
        /// Thinking content
        thinking: String,
        /// Signature for verification
        signature: String,
    },
    /// Tool invocation request
    ToolUse {
        /// Tool use ID
        id: String,
        /// Tool name
        name: String,
        /// Tool input parameters
        input: serde_json::Value,
    },
    /// Tool execution result
    ToolResult {
        /// ID of the tool use this result belongs to
        tool_use_id: String,
        /// Result content
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<ContentValue>,
        /// Whether this result represents an error
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
    /// Image content (base64 encoded)
    Image {
        /// Base64 encoded image data
        data: String,
        /// MIME type, e.g. "image/png"
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

/// User message content; either plain text or content blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserContent {
    /// Plain string content
    Text(String),
    /// Structured content blocks
    Blocks(Vec<ContentBlock>),
}

/// A user message
#[derive(Debug, Clone, PartialEq)]
pub struct UserMessage {
    /// Message content
    pub content: UserContent,
    /// Parent tool use ID for nested conversations
    pub parent_tool_use_id: Option<String>,
}

/// An assistant message
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantMessage {
    /// Message content blocks
    pub content: Vec<ContentBlock>,
    /// Model that generated the message
    pub model: String,
    /// Parent tool use ID for nested conversations
    pub parent_tool_use_id: Option<String>,
}

/// A system message; the payload shape is owned by the CLI
#[derive(Debug, Clone, PartialEq)]
pub struct SystemMessage {
    /// System message subtype
    pub subtype: String,
    /// Raw message data, including the subtype
    pub data: serde_json::Value,
}

/// Final result of a query with timing, cost, and usage information
#[derive(Debug, Clone, PartialEq)]
pub struct ResultMessage {
    /// Result subtype
    pub subtype: String,
    /// Total duration in milliseconds
    pub duration_ms: i64,
    /// API call duration in milliseconds
    pub duration_api_ms: i64,
    /// Whether this is an error result
    pub is_error: bool,
    /// Number of conversation turns
    pub num_turns: i64,
    /// Session ID
    pub session_id: String,
    /// Total cost in USD
    pub total_cost_usd: Option<f64>,
    /// Token usage statistics, shape owned by the CLI
    pub usage: Option<serde_json::Value>,
    /// Result text
    pub result: Option<String>,
}

/// Partial message update during streaming
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    /// Event UUID
    pub uuid: String,
    /// Session ID
    pub session_id: String,
    /// Raw event payload, shape owned by the CLI
    pub event: serde_json::Value,
    /// Parent tool use ID
    pub parent_tool_use_id: Option<String>,
}

/// Messages produced by the CLI
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// User message
    User(UserMessage),
    /// Assistant message
    Assistant(AssistantMessage),
    /// System message
    System(SystemMessage),
    /// Result message
    Result(ResultMessage),
    /// Stream event for partial messages
    StreamEvent(StreamEvent),
}

impl Message {
    /// Encode the message back into its wire representation.
    ///
    /// `parse_message` over the returned value yields an equal message.
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            Message::User(m) => {
                let mut obj = json!({
                    "type": "user",
                    "message": {
                        "role": "user",
                        "content": &m.content,
                    },
                });
                if let Some(ref pid) = m.parent_tool_use_id {
                    obj["parent_tool_use_id"] = json!(pid);
                }
                obj
            }
            Message::Assistant(m) => {
                let mut obj = json!({
                    "type": "assistant",
                    "message": {
                        "model": &m.model,
                        "content": &m.content,
                    },
                });
                if let Some(ref pid) = m.parent_tool_use_id {
                    obj["parent_tool_use_id"] = json!(pid);
                }
                obj
            }
            Message::System(m) => {
                // data already carries type and subtype
                m.data.clone()
            }
            Message::Result(m) => {
                let mut obj = json!({
                    "type": "result",
                    "subtype": &m.subtype,
                    "duration_ms": m.duration_ms,
                    "duration_api_ms": m.duration_api_ms,
                    "is_error": m.is_error,
                    "num_turns": m.num_turns,
                    "session_id": &m.session_id,
                });
                if let Some(cost) = m.total_cost_usd {
                    obj["total_cost_usd"] = json!(cost);
                }
                if let Some(ref usage) = m.usage {
                    obj["usage"] = usage.clone();
                }
                if let Some(ref result) = m.result {
                    obj["result"] = json!(result);
                }
                obj
            }
            Message::StreamEvent(m) => {
                let mut obj = json!({
                    "type": "stream_event",
                    "uuid": &m.uuid,
                    "session_id": &m.session_id,
                    "event": &m.event,
                });
                if let Some(ref pid) = m.parent_tool_use_id {
                    obj["parent_tool_use_id"] = json!(pid);
                }
                obj
            }
        }
    }
}
