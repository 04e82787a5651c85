//! Subprocess transport driving the Claude Code CLI

use async_trait::async_trait;
use std::collections::HashMap;
use std::env;
use std::io::Write as _;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::framing::{JsonFramer, DEFAULT_MAX_BUFFER_SIZE};
use super::Transport;
use crate::error::{ClaudeError, Result};
use crate::types::{ClaudeAgentOptions, McpServerConfig, SystemPrompt};

const DEFAULT_SCANNER_BUFFER_SIZE: usize = 64 * 1024;
const MINIMUM_CLI_VERSION: &str = "2.0.0";
const CLOSE_GRACE_PERIOD: Duration = Duration::from_secs(2);
const STDERR_JOIN_TIMEOUT: Duration = Duration::from_secs(1);
const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

// Command lines beyond these sizes are rejected by the platform shell; the
// --agents payload spills to a temp file past them.
const WINDOWS_CMD_LENGTH_LIMIT: usize = 8_000;
const NON_WINDOWS_CMD_LENGTH_LIMIT: usize = 100_000;

/// Prompt input mode
#[derive(Debug)]
pub enum PromptInput {
    /// Single string prompt, passed on the command line
    String(String),
    /// Open-ended stream of JSON messages over stdin
    Stream,
}

impl From<String> for PromptInput {
    fn from(s: String) -> Self {
        PromptInput::String(s)
    }
}

impl From<&str> for PromptInput {
    fn from(s: &str) -> Self {
        PromptInput::String(s.to_string())
    }
}

/// Subprocess transport for the Claude Code CLI
pub struct SubprocessTransport {
    prompt: PromptInput,
    options: ClaudeAgentOptions,
    cli_path: PathBuf,
    child: Arc<Mutex<Option<Child>>>,
    stdin: Option<ChildStdin>,
    stdout: Option<BufReader<ChildStdout>>,
    ready: Arc<AtomicBool>,
    max_buffer_size: usize,
    reader_task: Option<JoinHandle<()>>,
    stderr_task: Option<JoinHandle<()>>,
    temp_files: Vec<tempfile::NamedTempFile>,
}

impl SubprocessTransport {
    /// Create a new subprocess transport.
    ///
    /// Locates the CLI on disk when `cli_path` is `None`; fails with
    /// [`ClaudeError::CliNotFound`] when it cannot be found.
    pub fn new(
        prompt: PromptInput,
        options: ClaudeAgentOptions,
        cli_path: Option<PathBuf>,
    ) -> Result<Self> {
        let cli_path = match cli_path {
            Some(path) => path,
            None => Self::find_cli()?,
        };

        let max_buffer_size = options.max_buffer_size.unwrap_or(DEFAULT_MAX_BUFFER_SIZE);

        Ok(Self {
            prompt,
            options,
            cli_path,
            child: Arc::new(Mutex::new(None)),
            stdin: None,
            stdout: None,
            ready: Arc::new(AtomicBool::new(false)),
            max_buffer_size,
            reader_task: None,
            stderr_task: None,
            temp_files: Vec::new(),
        })
    }

    /// Locate the Claude Code CLI binary.
    fn find_cli() -> Result<PathBuf> {
        if let Ok(path) = which::which("claude") {
            return Ok(path);
        }

        let home = env::var("HOME").unwrap_or_else(|_| String::from("/root"));
        let locations = [
            PathBuf::from(&home).join(".npm-global/bin/claude"),
            PathBuf::from("/usr/local/bin/claude"),
            PathBuf::from(&home).join(".local/bin/claude"),
            PathBuf::from(&home).join("node_modules/.bin/claude"),
            PathBuf::from(&home).join(".yarn/bin/claude"),
            PathBuf::from(&home).join(".claude/local/claude"),
        ];

        for path in locations {
            if path.is_file() {
                return Ok(path);
            }
        }

        Err(ClaudeError::cli_not_found())
    }

    /// Assemble CLI arguments from the options.
    fn build_args(&mut self) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--output-format".into(),
            "stream-json".into(),
            "--verbose".into(),
        ];

        if let Some(ref system_prompt) = self.options.system_prompt {
            match system_prompt {
                SystemPrompt::String(s) => {
                    args.push("--system-prompt".into());
                    args.push(s.clone());
                }
                SystemPrompt::Preset(preset) => {
                    if let Some(ref append) = preset.append {
                        args.push("--append-system-prompt".into());
                        args.push(append.clone());
                    }
                }
            }
        }

        if !self.options.allowed_tools.is_empty() {
            let tools: Vec<&str> = self
                .options
                .allowed_tools
                .iter()
                .map(|t| t.as_str())
                .collect();
            args.push("--allowedTools".into());
            args.push(tools.join(","));
        }
        if !self.options.disallowed_tools.is_empty() {
            let tools: Vec<&str> = self
                .options
                .disallowed_tools
                .iter()
                .map(|t| t.as_str())
                .collect();
            args.push("--disallowedTools".into());
            args.push(tools.join(","));
        }

        if let Some(max_turns) = self.options.max_turns {
            args.push("--max-turns".into());
            args.push(max_turns.to_string());
        }

        if let Some(ref model) = self.options.model {
            args.push("--model".into());
            args.push(model.clone());
        }
        if let Some(ref fallback) = self.options.fallback_model {
            args.push("--fallback-model".into());
            args.push(fallback.clone());
        }

        if let Some(budget) = self.options.max_budget_usd {
            args.push("--max-budget-usd".into());
            args.push(format!("{budget:.2}"));
        }
        if let Some(tokens) = self.options.max_thinking_tokens {
            args.push("--max-thinking-tokens".into());
            args.push(tokens.to_string());
        }

        if let Some(ref mode) = self.options.permission_mode {
            args.push("--permission-mode".into());
            args.push(mode.as_str().into());
        }
        if let Some(ref tool) = self.options.permission_prompt_tool_name {
            args.push("--permission-prompt-tool".into());
            args.push(tool.clone());
        }

        if self.options.continue_conversation {
            args.push("--continue".into());
        }
        if let Some(ref session_id) = self.options.resume {
            args.push("--resume".into());
            args.push(session_id.as_str().into());
        }
        if self.options.fork_session {
            args.push("--fork-session".into());
        }

        if let Some(ref settings) = self.options.settings {
            args.push("--settings".into());
            args.push(settings.to_string_lossy().into_owned());
        }

        for dir in &self.options.add_dirs {
            args.push("--add-dir".into());
            args.push(dir.to_string_lossy().into_owned());
        }

        if !self.options.mcp_servers.is_empty() {
            let mut servers = serde_json::Map::new();
            for (name, config) in &self.options.mcp_servers {
                servers.insert(name.clone(), serialize_mcp_config(config));
            }
            let config_json = serde_json::json!({ "mcpServers": servers });
            args.push("--mcp-config".into());
            args.push(config_json.to_string());
        }

        if self.options.include_partial_messages {
            args.push("--include-partial-messages".into());
        }

        if let Some(ref agents) = self.options.agents {
            if !agents.is_empty() {
                args.push("--agents".into());
                args.push(serde_json::to_string(agents).unwrap_or_default());
            }
        }

        // Absent setting sources mean none are loaded.
        args.push("--setting-sources".into());
        match self.options.setting_sources {
            Some(ref sources) => {
                let names: Vec<&str> = sources.iter().map(|s| s.as_str()).collect();
                args.push(names.join(","));
            }
            None => args.push(String::new()),
        }

        for plugin in &self.options.plugins {
            if plugin.plugin_type == "local" {
                args.push("--plugin-dir".into());
                args.push(plugin.path.clone());
            }
        }

        for (flag, value) in &self.options.extra_args {
            args.push(format!("--{flag}"));
            if let Some(v) = value {
                args.push(v.clone());
            }
        }

        match &self.prompt {
            PromptInput::Stream => {
                args.push("--input-format".into());
                args.push("stream-json".into());
            }
            PromptInput::String(s) => {
                args.push("--print".into());
                args.push("--".into());
                args.push(s.clone());
            }
        }

        self.spill_long_command_line(args)
    }

    /// Spill the `--agents` payload to a temp file when the assembled
    /// command line exceeds the platform limit.
    fn spill_long_command_line(&mut self, mut args: Vec<String>) -> Vec<String> {
        let limit = if cfg!(windows) {
            WINDOWS_CMD_LENGTH_LIMIT
        } else {
            NON_WINDOWS_CMD_LENGTH_LIMIT
        };

        let cmd_len: usize = args.iter().map(|a| a.len() + 1).sum();
        if cmd_len <= limit {
            return args;
        }

        let Some(pos) = args.iter().position(|a| a == "--agents") else {
            return args;
        };
        if pos + 1 >= args.len() {
            return args;
        }

        let file = tempfile::Builder::new()
            .prefix("claude-agents-")
            .suffix(".json")
            .tempfile();
        let mut file = match file {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "failed to create temp file for long command line");
                return args;
            }
        };

        if let Err(e) = file.write_all(args[pos + 1].as_bytes()) {
            warn!(error = %e, "failed to write agents payload to temp file");
            return args;
        }

        debug!(
            cmd_len,
            limit,
            path = %file.path().display(),
            "command line over limit, spilling --agents to temp file"
        );
        args[pos + 1] = format!("@{}", file.path().display());
        self.temp_files.push(file);
        args
    }

    /// Build the process environment: parent env, user overrides, SDK
    /// identification, and PWD when a working directory is configured.
    fn build_env(&self) -> HashMap<String, String> {
        let mut process_env: HashMap<String, String> = env::vars().collect();

        process_env.insert(
            "CLAUDE_CODE_ENTRYPOINT".to_string(),
            "sdk-rust".to_string(),
        );
        process_env.insert(
            "CLAUDE_AGENT_SDK_VERSION".to_string(),
            crate::VERSION.to_string(),
        );

        for (key, value) in &self.options.env {
            process_env.insert(key.clone(), value.clone());
        }

        if let Some(ref cwd) = self.options.cwd {
            process_env.insert("PWD".to_string(), cwd.to_string_lossy().into_owned());
        }

        process_env
    }

    /// Best-effort version sniff: warn on stderr when the CLI is older than
    /// the minimum supported version. Never fails the connect.
    async fn check_cli_version(&self) {
        if env::var("CLAUDE_AGENT_SDK_SKIP_VERSION_CHECK").is_ok() {
            return;
        }

        let output = tokio::time::timeout(
            VERSION_CHECK_TIMEOUT,
            Command::new(&self.cli_path).arg("-v").output(),
        )
        .await;

        let output = match output {
            Ok(Ok(out)) => out,
            _ => return,
        };

        let version_str = String::from_utf8_lossy(&output.stdout);
        let re = match regex::Regex::new(r"([0-9]+\.[0-9]+\.[0-9]+)") {
            Ok(re) => re,
            Err(_) => return,
        };
        let Some(version) = re
            .captures(&version_str)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
        else {
            return;
        };

        if compare_versions(version, MINIMUM_CLI_VERSION) == std::cmp::Ordering::Less {
            eprintln!(
                "Warning: Claude Code version {version} is unsupported in the Agent SDK. \
                 Minimum required version is {MINIMUM_CLI_VERSION}. \
                 Some features may not work correctly."
            );
        }
    }

    fn spawn_stderr_reader(
        &mut self,
        stderr: tokio::process::ChildStderr,
    ) -> JoinHandle<()> {
        let callback = self.options.stderr.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.is_empty() {
                    continue;
                }
                if let Some(ref cb) = callback {
                    cb(&line);
                }
            }
        })
    }
}

/// Serialize an MCP server config for the `--mcp-config` flag.
///
/// SDK servers are flattened to `{type:"sdk", name}`; the instance itself
/// is reached through the control protocol, not the CLI.
fn serialize_mcp_config(config: &McpServerConfig) -> serde_json::Value {
    match config {
        McpServerConfig::Stdio(stdio) => {
            serde_json::to_value(stdio).unwrap_or(serde_json::Value::Null)
        }
        McpServerConfig::Sse(sse) => {
            let mut obj = serde_json::json!({"type": "sse", "url": sse.url});
            if let Some(ref headers) = sse.headers {
                obj["headers"] = serde_json::json!(headers);
            }
            obj
        }
        McpServerConfig::Http(http) => {
            let mut obj = serde_json::json!({"type": "http", "url": http.url});
            if let Some(ref headers) = http.headers {
                obj["headers"] = serde_json::json!(headers);
            }
            obj
        }
        McpServerConfig::Sdk(sdk) => {
            serde_json::json!({"type": "sdk", "name": sdk.name})
        }
    }
}

/// Compare two dotted version strings component-wise.
fn compare_versions(v1: &str, v2: &str) -> std::cmp::Ordering {
    let parse = |v: &str| -> Vec<u64> {
        v.split('.')
            .take(3)
            .map(|p| p.parse().unwrap_or(0))
            .collect()
    };
    let a = parse(v1);
    let b = parse(v2);
    for i in 0..3 {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            std::cmp::Ordering::Equal => continue,
            other => return other,
        }
    }
    std::cmp::Ordering::Equal
}

#[async_trait]
impl Transport for SubprocessTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.child.lock().await.is_some() {
            return Ok(());
        }

        self.check_cli_version().await;

        if let Some(ref cwd) = self.options.cwd {
            if !cwd.exists() {
                return Err(ClaudeError::connection(format!(
                    "working directory does not exist: {}",
                    cwd.display()
                )));
            }
        }

        let args = self.build_args();
        debug!(cli = %self.cli_path.display(), ?args, "starting Claude Code");

        let mut cmd = Command::new(&self.cli_path);
        cmd.args(&args);
        cmd.env_clear();
        cmd.envs(self.build_env());
        if let Some(ref cwd) = self.options.cwd {
            cmd.current_dir(cwd);
        }

        let pipe_stderr = self.options.stderr.is_some()
            || self.options.extra_args.contains_key("debug-to-stderr");
        cmd.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(
            if pipe_stderr {
                Stdio::piped()
            } else {
                Stdio::inherit()
            },
        );

        cmd.kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| ClaudeError::connection_with("failed to start Claude Code", e))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ClaudeError::connection("failed to open stdin pipe"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClaudeError::connection("failed to open stdout pipe"))?;

        if pipe_stderr {
            if let Some(stderr) = child.stderr.take() {
                let task = self.spawn_stderr_reader(stderr);
                self.stderr_task = Some(task);
            }
        }

        let capacity = self
            .options
            .scanner_initial_buffer_size
            .filter(|&s| s > 0)
            .unwrap_or(DEFAULT_SCANNER_BUFFER_SIZE);
        self.stdout = Some(BufReader::with_capacity(capacity, stdout));
        self.stdin = Some(stdin);
        *self.child.lock().await = Some(child);
        self.ready.store(true, Ordering::SeqCst);

        // One-shot prompts travel on the command line; nothing will be
        // written, so the input stream ends here.
        if matches!(self.prompt, PromptInput::String(_)) {
            self.end_input().await?;
        }

        Ok(())
    }

    async fn write(&mut self, data: &str) -> Result<()> {
        if !self.is_ready() {
            return Err(ClaudeError::connection("transport is not ready for writing"));
        }

        if let Ok(mut guard) = self.child.try_lock() {
            if let Some(child) = guard.as_mut() {
                if let Ok(Some(status)) = child.try_wait() {
                    self.ready.store(false, Ordering::SeqCst);
                    return Err(ClaudeError::connection(format!(
                        "cannot write to terminated process (exit code: {})",
                        status.code().unwrap_or(-1)
                    )));
                }
            }
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ClaudeError::connection("stdin not available"))?;

        let result = async {
            stdin.write_all(data.as_bytes()).await?;
            stdin.flush().await
        }
        .await;

        if let Err(e) = result {
            self.ready.store(false, Ordering::SeqCst);
            return Err(ClaudeError::connection_with(
                "failed to write to process stdin",
                e,
            ));
        }

        Ok(())
    }

    fn read_messages(&mut self) -> mpsc::Receiver<Result<serde_json::Value>> {
        let (tx, rx) = mpsc::channel(10);

        let stdout = self.stdout.take();
        let child = self.child.clone();
        let max_buffer_size = self.max_buffer_size;

        let task = tokio::spawn(async move {
            let Some(mut stdout) = stdout else {
                let _ = tx
                    .send(Err(ClaudeError::connection(
                        "not connected - stdout not available",
                    )))
                    .await;
                return;
            };

            let mut framer = JsonFramer::new(max_buffer_size);
            let mut line = String::new();

            loop {
                line.clear();
                match stdout.read_line(&mut line).await {
                    Ok(0) => break,
                    Ok(_) => match framer.push_line(&line) {
                        Ok(messages) => {
                            for message in messages {
                                if tx.send(Ok(message)).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                    },
                    Err(e) => {
                        let _ = tx.send(Err(ClaudeError::Io(e))).await;
                        return;
                    }
                }
            }

            // Stream ended cleanly; surface a nonzero exit if any.
            let child = child.lock().await.take();
            if let Some(mut child) = child {
                match child.wait().await {
                    Ok(status) => {
                        if !status.success() {
                            if let Some(code) = status.code() {
                                let _ = tx
                                    .send(Err(ClaudeError::process(
                                        "command failed",
                                        code,
                                        Some("check stderr output for details".to_string()),
                                    )))
                                    .await;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(ClaudeError::Io(e))).await;
                    }
                }
            }
        });

        self.reader_task = Some(task);
        rx
    }

    async fn end_input(&mut self) -> Result<()> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin
                .shutdown()
                .await
                .map_err(|e| ClaudeError::connection_with("failed to close stdin", e))?;
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn close(&mut self) -> Result<()> {
        self.ready.store(false, Ordering::SeqCst);

        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.shutdown().await;
        }

        // Closing stdin is the termination request; give the process a
        // bounded grace period before killing it.
        let child = self.child.lock().await.take();
        if let Some(mut child) = child {
            match tokio::time::timeout(CLOSE_GRACE_PERIOD, child.wait()).await {
                Ok(Ok(status)) => {
                    debug!(?status, "Claude Code exited");
                }
                Ok(Err(e)) => {
                    self.cleanup_tasks().await;
                    return Err(ClaudeError::Io(e));
                }
                Err(_) => {
                    warn!("Claude Code did not exit within grace period, killing");
                    let _ = child.kill().await;
                    let _ = child.wait().await;
                }
            }
        }

        self.cleanup_tasks().await;
        self.stdout = None;
        self.temp_files.clear();

        Ok(())
    }
}

impl SubprocessTransport {
    async fn cleanup_tasks(&mut self) {
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        if let Some(task) = self.stderr_task.take() {
            // The stderr pump exits on pipe EOF; join briefly, continue
            // regardless.
            let _ = tokio::time::timeout(STDERR_JOIN_TIMEOUT, task).await;
        }
    }
}

impl Drop for SubprocessTransport {
    fn drop(&mut self) {
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
        // kill_on_drop reaps the child if close() was never called.
    }
}
