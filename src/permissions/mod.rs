//! Permission control for tool usage
//!
//! A [`CanUseToolCallback`] lets the host authorize, modify, or reject
//! each tool invocation. The callback rides the control protocol and
//! therefore requires streaming mode.
//!
//! ```rust
//! use claude_agent_sdk::permissions::permission_callback;
//! use claude_agent_sdk::types::{
//!     PermissionResult, PermissionResultAllow, PermissionResultDeny,
//! };
//!
//! let callback = permission_callback(|tool_name, _input, _context| async move {
//!     match tool_name.as_str() {
//!         "Read" | "Glob" => Ok(PermissionResult::Allow(PermissionResultAllow::default())),
//!         _ => Ok(PermissionResult::Deny(PermissionResultDeny {
//!             message: "Only read-only operations allowed".to_string(),
//!             interrupt: false,
//!         })),
//!     }
//! });
//! # let _ = callback;
//! ```

use std::future::Future;
use std::sync::Arc;

use crate::error::{ClaudeError, Result};
use crate::types::{
    CanUseToolCallback, ClaudeAgentOptions, PermissionResult, ToolName, ToolPermissionContext,
};

/// Adapt a closure into a [`CanUseToolCallback`].
pub fn permission_callback<F, Fut>(f: F) -> CanUseToolCallback
where
    F: Fn(ToolName, serde_json::Value, ToolPermissionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PermissionResult>> + Send + 'static,
{
    Arc::new(move |tool_name, tool_input, context| Box::pin(f(tool_name, tool_input, context)))
}

/// Validate permission-related options and wire the callback into the
/// control protocol.
///
/// A permission callback requires streaming mode and is mutually exclusive
/// with `permission_prompt_tool_name`; when present, the prompt tool is
/// overridden to the `"stdio"` sentinel so the CLI routes permission
/// queries over the control channel.
pub fn validate_permission_settings(
    options: &mut ClaudeAgentOptions,
    is_streaming: bool,
) -> Result<()> {
    if options.can_use_tool.is_none() {
        return Ok(());
    }

    if !is_streaming {
        return Err(ClaudeError::invalid_config(
            "can_use_tool callback requires streaming mode",
        ));
    }

    if options.permission_prompt_tool_name.is_some() {
        return Err(ClaudeError::invalid_config(
            "can_use_tool callback cannot be used with permission_prompt_tool_name",
        ));
    }

    options.permission_prompt_tool_name = Some("stdio".to_string());
    Ok(())
}
