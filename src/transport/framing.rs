//! Bounded accumulating JSON framer for the CLI output stream
//!
//! The CLI writes newline-delimited JSON, but a physical line may carry
//! several glued objects and a single object may span several reads. The
//! framer accumulates segments until they parse, in arrival order, and
//! enforces a ceiling on the accumulator.

use serde_json::Value;

use crate::error::{ClaudeError, Result};

/// Default ceiling for the JSON accumulator (1 MiB)
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// Accumulating framer over line-oriented JSON input.
///
/// Feed each line read from the stream to [`push_line`](Self::push_line);
/// it returns every complete object the line finished. An incomplete
/// trailing object stays buffered without error. Exceeding the configured
/// ceiling yields a [`ClaudeError::JsonDecode`] and the framer must not be
/// fed further.
#[derive(Debug)]
pub struct JsonFramer {
    buffer: String,
    max_buffer_size: usize,
}

impl JsonFramer {
    /// Create a framer with the given accumulator ceiling in bytes.
    ///
    /// Zero falls back to the default ceiling.
    pub fn new(max_buffer_size: usize) -> Self {
        let max_buffer_size = if max_buffer_size == 0 {
            DEFAULT_MAX_BUFFER_SIZE
        } else {
            max_buffer_size
        };
        Self {
            buffer: String::new(),
            max_buffer_size,
        }
    }

    /// Consume one physical line and return the objects it completed.
    pub fn push_line(&mut self, line: &str) -> Result<Vec<Value>> {
        let mut messages = Vec::new();

        // A line handed over by the reader may itself contain several
        // objects separated by embedded newlines.
        for segment in line.split('\n') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }

            self.buffer.push_str(segment);

            if self.buffer.len() > self.max_buffer_size {
                let size = self.buffer.len();
                self.buffer.clear();
                return Err(ClaudeError::json_decode(
                    format!(
                        "JSON message exceeded maximum buffer size of {} bytes (got {size})",
                        self.max_buffer_size
                    ),
                    segment,
                ));
            }

            // Objects only; anything else keeps accumulating until the
            // stream produces a parseable object or overflows.
            if let Ok(map) = serde_json::from_str::<serde_json::Map<String, Value>>(&self.buffer) {
                self.buffer.clear();
                messages.push(Value::Object(map));
            }
        }

        Ok(messages)
    }

    /// True when a partial object is still buffered.
    pub fn has_partial(&self) -> bool {
        !self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn framer() -> JsonFramer {
        JsonFramer::new(DEFAULT_MAX_BUFFER_SIZE)
    }

    #[test]
    fn test_single_object() {
        let mut f = framer();
        let msgs = f.push_line(r#"{"type":"result","status":"ok"}"#).unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0]["type"], "result");
        assert!(!f.has_partial());
    }

    #[test]
    fn test_multiple_objects_on_one_line() {
        let mut f = framer();
        let line = format!(
            "{}\n{}",
            json!({"type": "message", "id": "msg1"}),
            json!({"type": "result", "id": "res1"})
        );
        let msgs = f.push_line(&line).unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0]["id"], "msg1");
        assert_eq!(msgs[1]["id"], "res1");
    }

    #[test]
    fn test_object_split_across_lines() {
        let mut f = framer();
        assert!(f.push_line(r#"{"type":"assistant","#).unwrap().is_empty());
        assert!(f.has_partial());
        assert!(f.push_line(r#""content":"par"#).unwrap().is_empty());
        let msgs = f.push_line(r#"tial"}"#).unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0]["content"], "partial");
        assert!(!f.has_partial());
    }

    #[test]
    fn test_single_byte_segments() {
        let mut f = framer();
        let payload = r#"{"a":1}"#;
        let mut collected = Vec::new();
        for ch in payload.chars() {
            collected.extend(f.push_line(&ch.to_string()).unwrap());
        }
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0]["a"], 1);
    }

    #[test]
    fn test_embedded_newlines_in_string_values() {
        let mut f = framer();
        let value = "line one\nline two\ttabbed";
        let line = serde_json::to_string(&json!({"text": value})).unwrap();
        let msgs = f.push_line(&line).unwrap();
        assert_eq!(msgs[0]["text"], value);
    }

    #[test]
    fn test_unicode_round_trip() {
        let mut f = framer();
        let value = "日本語 🦀 \u{1F680} éàç";
        let line = serde_json::to_string(&json!({"text": value})).unwrap();
        let msgs = f.push_line(&line).unwrap();
        assert_eq!(msgs[0]["text"], value);
    }

    #[test]
    fn test_unicode_escapes() {
        let mut f = framer();
        let msgs = f.push_line(r#"{"text":"日本"}"#).unwrap();
        assert_eq!(msgs[0]["text"], "日本");
    }

    #[test]
    fn test_blank_lines_ignored() {
        let mut f = framer();
        assert!(f.push_line("").unwrap().is_empty());
        assert!(f.push_line("   ").unwrap().is_empty());
        assert!(f.push_line("\n\n").unwrap().is_empty());
        let msgs = f.push_line(r#"{"ok":true}"#).unwrap();
        assert_eq!(msgs.len(), 1);
    }

    #[test]
    fn test_incomplete_trailing_object_no_error() {
        let mut f = framer();
        let msgs = f
            .push_line(&format!("{}\n{}", json!({"id": 1}), r#"{"id":2,"#))
            .unwrap();
        assert_eq!(msgs.len(), 1);
        assert!(f.has_partial());
    }

    #[test]
    fn test_buffer_overflow() {
        let mut f = JsonFramer::new(64);
        let big = format!(r#"{{"data":"{}""#, "x".repeat(128));
        let err = f.push_line(&big).unwrap_err();
        match err {
            ClaudeError::JsonDecode { message, .. } => {
                assert!(message.contains("maximum buffer size"));
            }
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn test_accumulator_stays_bounded_across_lines() {
        let mut f = JsonFramer::new(32);
        assert!(f.push_line(r#"{"data":"aaaaaaaaaa"#).unwrap().is_empty());
        assert!(f.push_line("bbbbbbbbbb").unwrap().is_empty());
        let err = f.push_line("cccccccccc").unwrap_err();
        assert!(matches!(err, ClaudeError::JsonDecode { .. }));
    }

    #[test]
    fn test_non_object_json_keeps_accumulating() {
        let mut f = framer();
        // A bare array is not a frame; it stays buffered.
        assert!(f.push_line(r#"[1,2,3]"#).unwrap().is_empty());
        assert!(f.has_partial());
    }

    #[test]
    fn test_zero_ceiling_falls_back_to_default() {
        let f = JsonFramer::new(0);
        assert_eq!(f.max_buffer_size, DEFAULT_MAX_BUFFER_SIZE);
    }
}
