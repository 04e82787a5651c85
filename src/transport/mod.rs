//! Transport layer for communicating with the Claude Code CLI
//!
//! The transport owns raw I/O with the CLI process: spawning, framed reads
//! from stdout, serialized writes to stdin, and teardown. The control
//! protocol in [`crate::control`] is layered on top.

pub mod framing;
pub mod subprocess;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

/// Abstract interface for Claude communication.
///
/// Custom implementations (e.g. remote connections) may be injected into
/// [`ClaudeSDKClient`](crate::ClaudeSDKClient); the SDK ships
/// [`SubprocessTransport`] for the CLI subprocess.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Initialize the transport and prepare for communication.
    ///
    /// For subprocess transports this starts the process.
    async fn connect(&mut self) -> Result<()>;

    /// Send raw data, typically one JSON frame terminated by a newline.
    ///
    /// Fails when the transport is not ready or the peer has gone away;
    /// after a write failure the transport is no longer ready.
    async fn write(&mut self, data: &str) -> Result<()>;

    /// Return a channel of framed JSON objects read from the transport.
    ///
    /// Spawns the background reader; the channel closes when the stream
    /// ends or a fatal error is delivered. A nonzero exit of the peer
    /// process is surfaced as a final error item.
    fn read_messages(&mut self) -> mpsc::Receiver<Result<serde_json::Value>>;

    /// Signal the end of the input stream (close stdin).
    async fn end_input(&mut self) -> Result<()>;

    /// True between a successful `connect()` and `close()`.
    fn is_ready(&self) -> bool;

    /// Terminate the transport and clean up resources. Idempotent.
    async fn close(&mut self) -> Result<()>;
}

pub use framing::{JsonFramer, DEFAULT_MAX_BUFFER_SIZE};
pub use subprocess::{PromptInput, SubprocessTransport};
