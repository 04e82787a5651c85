//! Hook system for intercepting agent lifecycle events
//!
//! Hooks are host callbacks the CLI invokes at lifecycle points
//! (PreToolUse, PostToolUse, ...). Matching happens CLI-side: during
//! initialization each callback is registered under an opaque ID together
//! with its matcher pattern, and the CLI calls back by ID. This module
//! provides the matcher builder, a closure adapter, and typed views of the
//! hook input payloads.
//!
//! ```rust
//! use claude_agent_sdk::hooks::{hook_callback, HookMatcherBuilder};
//! use claude_agent_sdk::types::HookJsonOutput;
//!
//! let log_hook = hook_callback(|input, _tool_use_id, _context| async move {
//!     println!("tool: {:?}", input.get("tool_name"));
//!     Ok(HookJsonOutput::default())
//! });
//!
//! let matcher = HookMatcherBuilder::new(Some("Bash")).add_hook(log_hook).build();
//! # let _ = matcher;
//! ```

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

use crate::error::Result;
use crate::types::{HookCallback, HookContext, HookJsonOutput, HookMatcher};

/// Adapt a closure into a [`HookCallback`].
pub fn hook_callback<F, Fut>(f: F) -> HookCallback
where
    F: Fn(serde_json::Value, Option<String>, HookContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HookJsonOutput>> + Send + 'static,
{
    Arc::new(move |input, tool_use_id, context| Box::pin(f(input, tool_use_id, context)))
}

/// Builder for [`HookMatcher`]
pub struct HookMatcherBuilder {
    matcher: Option<String>,
    hooks: Vec<HookCallback>,
}

impl HookMatcherBuilder {
    /// Create a builder; `None` matches every tool.
    pub fn new(pattern: Option<impl Into<String>>) -> Self {
        Self {
            matcher: pattern.map(|p| p.into()),
            hooks: Vec::new(),
        }
    }

    /// Add a hook callback
    pub fn add_hook(mut self, hook: HookCallback) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Build the matcher
    pub fn build(self) -> HookMatcher {
        HookMatcher {
            matcher: self.matcher,
            hooks: self.hooks,
        }
    }
}

// ============================================================================
// Typed hook inputs
// ============================================================================

/// Fields present across all hook events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseHookInput {
    /// Session the event belongs to
    pub session_id: String,
    /// Path to the conversation transcript
    pub transcript_path: String,
    /// Working directory of the session
    pub cwd: String,
    /// Active permission mode, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_mode: Option<String>,
}

/// Input for PreToolUse hook events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreToolUseHookInput {
    /// Common fields
    #[serde(flatten)]
    pub base: BaseHookInput,
    /// Always "PreToolUse"
    pub hook_event_name: String,
    /// Tool about to run
    pub tool_name: String,
    /// Tool input parameters
    pub tool_input: serde_json::Value,
}

/// Input for PostToolUse hook events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostToolUseHookInput {
    /// Common fields
    #[serde(flatten)]
    pub base: BaseHookInput,
    /// Always "PostToolUse"
    pub hook_event_name: String,
    /// Tool that ran
    pub tool_name: String,
    /// Tool input parameters
    pub tool_input: serde_json::Value,
    /// Tool response payload
    pub tool_response: serde_json::Value,
}

/// Input for UserPromptSubmit hook events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPromptSubmitHookInput {
    /// Common fields
    #[serde(flatten)]
    pub base: BaseHookInput,
    /// Always "UserPromptSubmit"
    pub hook_event_name: String,
    /// The submitted prompt
    pub prompt: String,
}

/// Input for Stop hook events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopHookInput {
    /// Common fields
    #[serde(flatten)]
    pub base: BaseHookInput,
    /// Always "Stop"
    pub hook_event_name: String,
    /// Whether a stop hook is already active
    pub stop_hook_active: bool,
}

/// Input for SubagentStop hook events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubagentStopHookInput {
    /// Common fields
    #[serde(flatten)]
    pub base: BaseHookInput,
    /// Always "SubagentStop"
    pub hook_event_name: String,
    /// Whether a stop hook is already active
    pub stop_hook_active: bool,
}

/// Input for PreCompact hook events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreCompactHookInput {
    /// Common fields
    #[serde(flatten)]
    pub base: BaseHookInput,
    /// Always "PreCompact"
    pub hook_event_name: String,
    /// "manual" or "auto"
    pub trigger: String,
    /// Instructions supplied with a manual compact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
}
