//! Error types for the Claude Agent SDK

use thiserror::Error;

/// Main error type for the Claude Agent SDK
#[derive(Error, Debug)]
pub enum ClaudeError {
    /// Claude Code CLI not found or not installed
    #[error("Claude Code CLI not found: {0}")]
    CliNotFound(String),

    /// Connection error when spawning or talking to the CLI process
    #[error("Connection error: {message}")]
    Connection {
        /// Error message
        message: String,
        /// Underlying cause, if any
        #[source]
        source: Option<std::io::Error>,
    },

    /// CLI process exited with a nonzero status
    #[error("Process error (exit code {exit_code}): {message}")]
    Process {
        /// Error message
        message: String,
        /// Process exit code
        exit_code: i32,
        /// Tail of the process stderr output
        stderr: Option<String>,
    },

    /// Framing or JSON decode failure on the CLI output stream
    #[error("JSON decode error: {message}")]
    JsonDecode {
        /// Error message
        message: String,
        /// The offending line (truncated)
        line: String,
    },

    /// Typed-message field missing or mistyped
    #[error("Message parse error: {message}")]
    MessageParse {
        /// Error message
        message: String,
        /// Raw message data that failed to parse
        data: Option<serde_json::Value>,
    },

    /// Control response carried `subtype: "error"`
    #[error("Control protocol error: {0}")]
    ControlProtocol(String),

    /// Control request exceeded its response window
    #[error("Control request timeout: {0}")]
    Timeout(String),

    /// Operation attempted before connect or after close
    #[error("Not connected: {0}")]
    NotConnected(String),

    /// Mutually-exclusive or otherwise invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation against a closed instance
    #[error("Connection closed")]
    Closed,

    /// Hook callback failure
    #[error("Hook error: {0}")]
    Hook(String),

    /// SDK MCP server failure
    #[error("MCP error: {0}")]
    Mcp(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Claude SDK operations
pub type Result<T> = std::result::Result<T, ClaudeError>;

impl From<serde_json::Error> for ClaudeError {
    fn from(e: serde_json::Error) -> Self {
        Self::JsonDecode {
            message: e.to_string(),
            line: String::new(),
        }
    }
}

impl ClaudeError {
    /// Create a CLI not found error with installation instructions
    pub fn cli_not_found() -> Self {
        Self::CliNotFound(
            "Claude Code not found. Install with:\n\
             npm install -g @anthropic-ai/claude-code\n\
             \n\
             If already installed locally, try:\n\
             export PATH=\"$HOME/node_modules/.bin:$PATH\"\n\
             \n\
             Or specify the path when creating transport"
                .to_string(),
        )
    }

    /// Create a connection error without an underlying cause
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a connection error wrapping an I/O cause
    pub fn connection_with(msg: impl Into<String>, source: std::io::Error) -> Self {
        Self::Connection {
            message: msg.into(),
            source: Some(source),
        }
    }

    /// Create a process error
    pub fn process(msg: impl Into<String>, exit_code: i32, stderr: Option<String>) -> Self {
        Self::Process {
            message: msg.into(),
            exit_code,
            stderr,
        }
    }

    /// Create a JSON decode error, truncating long lines for display
    pub fn json_decode(msg: impl Into<String>, line: &str) -> Self {
        let truncated = if line.len() > 100 {
            let cut = line
                .char_indices()
                .take_while(|(i, _)| *i < 100)
                .last()
                .map(|(i, c)| i + c.len_utf8())
                .unwrap_or(0);
            format!("{}...", &line[..cut])
        } else {
            line.to_string()
        };
        Self::JsonDecode {
            message: msg.into(),
            line: truncated,
        }
    }

    /// Create a message parse error
    pub fn message_parse(msg: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self::MessageParse {
            message: msg.into(),
            data,
        }
    }

    /// Create a control protocol error
    pub fn control_protocol(msg: impl Into<String>) -> Self {
        Self::ControlProtocol(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a not-connected error
    pub fn not_connected(msg: impl Into<String>) -> Self {
        Self::NotConnected(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a hook error
    pub fn hook(msg: impl Into<String>) -> Self {
        Self::Hook(msg.into())
    }

    /// Create an MCP error
    pub fn mcp(msg: impl Into<String>) -> Self {
        Self::Mcp(msg.into())
    }
}
