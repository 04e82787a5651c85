//! Control protocol layered over the transport
//!
//! The CLI and the SDK share one newline-delimited JSON stream. Frames
//! whose `type` starts with `control_` implement a bidirectional RPC:
//!
//! - outbound `control_request` frames (initialize, interrupt,
//!   set_permission_mode, set_model) are correlated with their
//!   `control_response` by request ID;
//! - inbound `control_request` frames (can_use_tool, hook_callback,
//!   mcp_message) are dispatched to host callbacks and answered with
//!   `control_response` frames;
//! - `control_cancel_request` is reserved: parsed and ignored.
//!
//! Everything else on the stream is a data message surfaced to the
//! consumer in arrival order.

mod query;

pub use query::Query;

/// Hard ceiling for an outbound control request to be answered
pub const CONTROL_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

/// Default capacity of the data message channel
pub const DEFAULT_MESSAGE_BUFFER_SIZE: usize = 100;
