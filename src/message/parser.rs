//! Decoder from raw CLI frames into typed messages

use serde_json::Value;

use super::{
    AssistantMessage, ContentBlock, ContentValue, Message, ResultMessage, StreamEvent,
    SystemMessage, UserContent, UserMessage,
};
use crate::error::{ClaudeError, Result};

/// Parse a raw JSON frame into a typed [`Message`].
///
/// Dispatches on the top-level `type` field; unknown types and missing or
/// mistyped required fields fail with [`ClaudeError::MessageParse`] carrying
/// the offending data.
pub fn parse_message(data: &Value) -> Result<Message> {
    let obj = data
        .as_object()
        .ok_or_else(|| ClaudeError::message_parse("message must be an object", Some(data.clone())))?;

    let msg_type = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ClaudeError::message_parse("message missing 'type' field", Some(data.clone())))?;

    match msg_type {
        "user" => parse_user_message(data),
        "assistant" => parse_assistant_message(data),
        "system" => parse_system_message(data),
        "result" => parse_result_message(data),
        "stream_event" => parse_stream_event(data),
        other => Err(ClaudeError::message_parse(
            format!("unknown message type: {other}"),
            Some(data.clone()),
        )),
    }
}

fn missing(field: &str, data: &Value) -> ClaudeError {
    ClaudeError::message_parse(format!("message missing '{field}' field"), Some(data.clone()))
}

fn opt_string(data: &Value, field: &str) -> Option<String> {
    data.get(field).and_then(Value::as_str).map(str::to_string)
}

fn parse_user_message(data: &Value) -> Result<Message> {
    let message = data
        .get("message")
        .and_then(Value::as_object)
        .ok_or_else(|| missing("message", data))?;

    let parent_tool_use_id = opt_string(data, "parent_tool_use_id");

    let content = match message.get("content") {
        Some(Value::String(s)) => UserContent::Text(s.clone()),
        Some(Value::Array(items)) => {
            let mut blocks = Vec::with_capacity(items.len());
            for item in items {
                blocks.push(parse_content_block(item, data)?);
            }
            UserContent::Blocks(blocks)
        }
        _ => {
            return Err(ClaudeError::message_parse(
                "user message content must be string or array",
                Some(data.clone()),
            ))
        }
    };

    Ok(Message::User(UserMessage {
        content,
        parent_tool_use_id,
    }))
}

fn parse_assistant_message(data: &Value) -> Result<Message> {
    let message = data
        .get("message")
        .and_then(Value::as_object)
        .ok_or_else(|| missing("message", data))?;

    let model = message
        .get("model")
        .and_then(Value::as_str)
        .ok_or_else(|| missing("model", data))?
        .to_string();

    let items = message
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            ClaudeError::message_parse("assistant message content must be array", Some(data.clone()))
        })?;

    let mut blocks = Vec::with_capacity(items.len());
    for item in items {
        blocks.push(parse_content_block(item, data)?);
    }

    Ok(Message::Assistant(AssistantMessage {
        content: blocks,
        model,
        parent_tool_use_id: opt_string(data, "parent_tool_use_id"),
    }))
}

fn parse_content_block(item: &Value, data: &Value) -> Result<ContentBlock> {
    let block = item.as_object().ok_or_else(|| {
        ClaudeError::message_parse("content block must be object", Some(data.clone()))
    })?;

    let block_type = block.get("type").and_then(Value::as_str).ok_or_else(|| {
        ClaudeError::message_parse("content block missing 'type' field", Some(data.clone()))
    })?;

    let field = |name: &str| -> Result<String> {
        block
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ClaudeError::message_parse(
                    format!("{block_type} block missing '{name}' field"),
                    Some(data.clone()),
                )
            })
    };

    match block_type {
        "text" => Ok(ContentBlock::Text { text: field("text")? }),
        "thinking" => Ok(ContentBlock::Thinking {
            thinking: field("thinking")?,
            signature: field("signature")?,
        }),
        "tool_use" => {
            let input = block.get("input").cloned().ok_or_else(|| {
                ClaudeError::message_parse(
                    "tool_use block missing 'input' field",
                    Some(data.clone()),
                )
            })?;
            Ok(ContentBlock::ToolUse {
                id: field("id")?,
                name: field("name")?,
                input,
            })
        }
        "tool_result" => {
            let content = match block.get("content") {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) => Some(ContentValue::String(s.clone())),
                Some(Value::Array(items)) => Some(ContentValue::Blocks(items.clone())),
                Some(other) => Some(ContentValue::Blocks(vec![other.clone()])),
            };
            Ok(ContentBlock::ToolResult {
                tool_use_id: field("tool_use_id")?,
                content,
                is_error: block.get("is_error").and_then(Value::as_bool),
            })
        }
        "image" => Ok(ContentBlock::Image {
            data: field("data")?,
            mime_type: field("mimeType")?,
        }),
        other => Err(ClaudeError::message_parse(
            format!("unknown content block type: {other}"),
            Some(data.clone()),
        )),
    }
}

fn parse_system_message(data: &Value) -> Result<Message> {
    let subtype = data
        .get("subtype")
        .and_then(Value::as_str)
        .ok_or_else(|| missing("subtype", data))?
        .to_string();

    Ok(Message::System(SystemMessage {
        subtype,
        data: data.clone(),
    }))
}

fn parse_result_message(data: &Value) -> Result<Message> {
    let subtype = data
        .get("subtype")
        .and_then(Value::as_str)
        .ok_or_else(|| missing("subtype", data))?
        .to_string();

    // JSON numbers arrive as floats; durations and turn counts truncate.
    let number = |name: &str| -> Result<i64> {
        data.get(name)
            .and_then(Value::as_f64)
            .map(|n| n as i64)
            .ok_or_else(|| missing(name, data))
    };

    let is_error = data
        .get("is_error")
        .and_then(Value::as_bool)
        .ok_or_else(|| missing("is_error", data))?;

    let session_id = data
        .get("session_id")
        .and_then(Value::as_str)
        .ok_or_else(|| missing("session_id", data))?
        .to_string();

    Ok(Message::Result(ResultMessage {
        subtype,
        duration_ms: number("duration_ms")?,
        duration_api_ms: number("duration_api_ms")?,
        is_error,
        num_turns: number("num_turns")?,
        session_id,
        total_cost_usd: data.get("total_cost_usd").and_then(Value::as_f64),
        usage: data.get("usage").filter(|v| v.is_object()).cloned(),
        result: opt_string(data, "result"),
    }))
}

fn parse_stream_event(data: &Value) -> Result<Message> {
    let uuid = data
        .get("uuid")
        .and_then(Value::as_str)
        .ok_or_else(|| missing("uuid", data))?
        .to_string();

    let session_id = data
        .get("session_id")
        .and_then(Value::as_str)
        .ok_or_else(|| missing("session_id", data))?
        .to_string();

    let event = data
        .get("event")
        .filter(|v| v.is_object())
        .cloned()
        .ok_or_else(|| missing("event", data))?;

    Ok(Message::StreamEvent(StreamEvent {
        uuid,
        session_id,
        event,
        parent_tool_use_id: opt_string(data, "parent_tool_use_id"),
    }))
}
