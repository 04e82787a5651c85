//! The control multiplexer: routes frames, correlates RPCs, dispatches
//! inbound requests to host callbacks

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::{CONTROL_REQUEST_TIMEOUT, DEFAULT_MESSAGE_BUFFER_SIZE};
use crate::error::{ClaudeError, Result};
use crate::mcp::{SdkMcpServer, ToolContext};
use crate::transport::Transport;
use crate::types::{
    CanUseToolCallback, HookCallback, HookContext, HookEvent, HookMatcher, PermissionMode,
    PermissionResult, ToolName, ToolPermissionContext,
};

/// State shared between the multiplexer, its reader pump, and the spawned
/// inbound-request handlers.
struct QueryShared {
    transport: Arc<Mutex<Box<dyn Transport>>>,
    can_use_tool: Option<CanUseToolCallback>,
    /// Populated once during initialize, read-only afterwards
    hook_callbacks: Mutex<HashMap<String, HookCallback>>,
    sdk_mcp_servers: HashMap<String, Arc<SdkMcpServer>>,
    /// Waiters for outbound control requests, keyed by request ID
    pending: Mutex<HashMap<String, oneshot::Sender<Result<Value>>>>,
    request_counter: AtomicU64,
    cancellation: CancellationToken,
}

impl QueryShared {
    /// Serialize a frame and write it with a trailing newline. The
    /// transport mutex is the single write serializer.
    async fn write_frame(&self, frame: &Value) -> Result<()> {
        let line = format!("{frame}\n");
        self.transport.lock().await.write(&line).await
    }

    /// Release every outstanding waiter with a closed-channel error.
    /// Entries leave the map before their waiters fire.
    async fn drain_pending(&self) {
        let waiters: Vec<_> = self.pending.lock().await.drain().collect();
        for (request_id, tx) in waiters {
            trace!(%request_id, "releasing pending control request on close");
            let _ = tx.send(Err(ClaudeError::Closed));
        }
    }
}

/// Bidirectional control-protocol handler on top of a [`Transport`].
///
/// One reader pump drains the transport. Control responses resolve their
/// waiting callers; inbound control requests run concurrently on spawned
/// tasks; every other frame is a data message delivered in arrival order
/// through a bounded channel.
pub struct Query {
    shared: Arc<QueryShared>,
    streaming_mode: bool,
    hooks: Option<HashMap<HookEvent, Vec<HookMatcher>>>,
    next_hook_callback_id: u64,
    message_rx: Option<mpsc::Receiver<Result<Value>>>,
    message_buffer_size: usize,
    router_task: Option<JoinHandle<()>>,
    init_result: Option<Value>,
    closed: bool,
}

impl Query {
    /// Create a new multiplexer over the given transport.
    ///
    /// `streaming_mode` controls whether outbound control requests are
    /// permitted. A `message_buffer_size` of zero falls back to the
    /// default capacity.
    pub fn new(
        transport: Box<dyn Transport>,
        streaming_mode: bool,
        can_use_tool: Option<CanUseToolCallback>,
        hooks: Option<HashMap<HookEvent, Vec<HookMatcher>>>,
        sdk_mcp_servers: HashMap<String, Arc<SdkMcpServer>>,
        message_buffer_size: usize,
    ) -> Self {
        let message_buffer_size = if message_buffer_size == 0 {
            DEFAULT_MESSAGE_BUFFER_SIZE
        } else {
            message_buffer_size
        };

        Self {
            shared: Arc::new(QueryShared {
                transport: Arc::new(Mutex::new(transport)),
                can_use_tool,
                hook_callbacks: Mutex::new(HashMap::new()),
                sdk_mcp_servers,
                pending: Mutex::new(HashMap::new()),
                request_counter: AtomicU64::new(0),
                cancellation: CancellationToken::new(),
            }),
            streaming_mode,
            hooks,
            next_hook_callback_id: 0,
            message_rx: None,
            message_buffer_size,
            router_task: None,
            init_result: None,
            closed: false,
        }
    }

    /// Spawn the reader pump. Legal once, before any other operation.
    pub async fn start(&mut self) -> Result<()> {
        if self.router_task.is_some() {
            return Err(ClaudeError::control_protocol("already started"));
        }
        if self.closed {
            return Err(ClaudeError::Closed);
        }

        let transport_rx = self.shared.transport.lock().await.read_messages();
        let (tx, rx) = mpsc::channel(self.message_buffer_size);
        self.message_rx = Some(rx);

        let shared = self.shared.clone();
        self.router_task = Some(tokio::spawn(route_messages(shared, transport_rx, tx)));
        Ok(())
    }

    /// Send the initialize request, registering hook callbacks.
    ///
    /// No-op outside streaming mode. Returns the server info stored as the
    /// init result.
    pub async fn initialize(&mut self) -> Result<Option<Value>> {
        if !self.streaming_mode {
            return Ok(None);
        }

        let mut hooks_config = serde_json::Map::new();
        if let Some(hooks) = self.hooks.take() {
            let mut registry = self.shared.hook_callbacks.lock().await;
            for (event, matchers) in hooks {
                if matchers.is_empty() {
                    continue;
                }
                let mut matcher_configs = Vec::with_capacity(matchers.len());
                for matcher in matchers {
                    let mut callback_ids = Vec::with_capacity(matcher.hooks.len());
                    for callback in matcher.hooks {
                        let callback_id = format!("hook_{}", self.next_hook_callback_id);
                        self.next_hook_callback_id += 1;
                        registry.insert(callback_id.clone(), callback);
                        callback_ids.push(Value::String(callback_id));
                    }
                    matcher_configs.push(json!({
                        "matcher": matcher.matcher,
                        "hookCallbackIds": callback_ids,
                    }));
                }
                hooks_config.insert(event.as_str().to_string(), Value::Array(matcher_configs));
            }
        }

        let mut request = serde_json::Map::new();
        request.insert("subtype".into(), "initialize".into());
        if !hooks_config.is_empty() {
            request.insert("hooks".into(), Value::Object(hooks_config));
        }

        let response = self.send_control_request(Value::Object(request)).await?;
        self.init_result = Some(response.clone());
        Ok(Some(response))
    }

    /// Send an interrupt control request and await acknowledgement.
    pub async fn interrupt(&self) -> Result<()> {
        self.send_control_request(json!({"subtype": "interrupt"}))
            .await
            .map(|_| ())
    }

    /// Change the permission mode mid-conversation.
    pub async fn set_permission_mode(&self, mode: PermissionMode) -> Result<()> {
        self.send_control_request(json!({
            "subtype": "set_permission_mode",
            "mode": mode.as_str(),
        }))
        .await
        .map(|_| ())
    }

    /// Change the model mid-conversation.
    pub async fn set_model(&self, model: &str) -> Result<()> {
        self.send_control_request(json!({
            "subtype": "set_model",
            "model": model,
        }))
        .await
        .map(|_| ())
    }

    /// Write each input message as a frame; closes the input stream when
    /// the source is exhausted.
    pub async fn stream_input(&self, stream: mpsc::Receiver<Value>) -> Result<()> {
        stream_input_task(self.shared.clone(), stream).await
    }

    /// Background variant of [`stream_input`](Self::stream_input).
    pub fn spawn_stream_input(&self, stream: mpsc::Receiver<Value>) -> JoinHandle<Result<()>> {
        tokio::spawn(stream_input_task(self.shared.clone(), stream))
    }

    /// Write a single raw frame (used by the facade for user messages).
    pub async fn write_frame(&self, frame: &Value) -> Result<()> {
        self.shared.write_frame(frame).await
    }

    /// Take the data message channel. Exactly one consumer may hold it.
    pub fn take_message_receiver(&mut self) -> Option<mpsc::Receiver<Result<Value>>> {
        self.message_rx.take()
    }

    /// The stored initialize response, if initialization has run.
    pub fn init_result(&self) -> Option<&Value> {
        self.init_result.as_ref()
    }

    /// Send an outbound control request and wait for its response.
    ///
    /// Only legal in streaming mode. The waiter is registered before the
    /// frame is written; timeout, close, and response each remove it
    /// exactly once.
    pub async fn send_control_request(&self, request: Value) -> Result<Value> {
        if !self.streaming_mode {
            return Err(ClaudeError::control_protocol(
                "control requests require streaming mode",
            ));
        }
        if self.shared.cancellation.is_cancelled() {
            return Err(ClaudeError::Closed);
        }

        let subtype = request
            .get("subtype")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        let counter = self.shared.request_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let request_id = format!("req_{}_{:08x}", counter, rand::random::<u32>());

        let (tx, rx) = oneshot::channel();
        self.shared
            .pending
            .lock()
            .await
            .insert(request_id.clone(), tx);

        let frame = json!({
            "type": "control_request",
            "request_id": request_id,
            "request": request,
        });

        if let Err(e) = self.shared.write_frame(&frame).await {
            self.shared.pending.lock().await.remove(&request_id);
            return Err(e);
        }

        debug!(%request_id, %subtype, "sent control request");

        match tokio::time::timeout(CONTROL_REQUEST_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            // Waiter dropped without a response: the pump closed and
            // already removed the entry.
            Ok(Err(_)) => Err(ClaudeError::Closed),
            Err(_) => {
                self.shared.pending.lock().await.remove(&request_id);
                Err(ClaudeError::timeout(subtype))
            }
        }
    }

    /// Cancel the pump, release all waiters, and close the transport.
    /// Idempotent; legal from any state.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.shared.cancellation.cancel();
        if let Some(task) = self.router_task.take() {
            task.abort();
        }
        self.shared.drain_pending().await;
        self.shared.transport.lock().await.close().await
    }
}

/// Input pump: writes each queued message, then ends the input stream.
async fn stream_input_task(
    shared: Arc<QueryShared>,
    mut stream: mpsc::Receiver<Value>,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = shared.cancellation.cancelled() => return Err(ClaudeError::Closed),
            msg = stream.recv() => match msg {
                Some(msg) => shared.write_frame(&msg).await?,
                None => {
                    return shared.transport.lock().await.end_input().await;
                }
            },
        }
    }
}

/// Reader pump: drains the transport and routes each frame.
async fn route_messages(
    shared: Arc<QueryShared>,
    mut transport_rx: mpsc::Receiver<Result<Value>>,
    tx: mpsc::Sender<Result<Value>>,
) {
    loop {
        let item = tokio::select! {
            _ = shared.cancellation.cancelled() => break,
            item = transport_rx.recv() => item,
        };

        let msg = match item {
            None => break,
            Some(Err(e)) => {
                // Fatal transport or framing error: deliver it, then the
                // channel closes.
                let _ = tx.send(Err(e)).await;
                break;
            }
            Some(Ok(msg)) => msg,
        };

        match msg.get("type").and_then(Value::as_str) {
            Some("control_response") => handle_control_response(&shared, &msg).await,
            Some("control_request") => {
                let shared = shared.clone();
                tokio::spawn(handle_control_request(shared, msg));
            }
            Some("control_cancel_request") => {
                // Reserved on the wire; accepted without action.
                trace!("ignoring control_cancel_request");
            }
            _ => {
                // Data message; bounded send is the backpressure point.
                let delivered = tokio::select! {
                    _ = shared.cancellation.cancelled() => false,
                    sent = tx.send(Ok(msg)) => sent.is_ok(),
                };
                if !delivered {
                    break;
                }
            }
        }
    }

    shared.drain_pending().await;
}

/// Resolve a pending outbound request from a `control_response` frame.
async fn handle_control_response(shared: &QueryShared, msg: &Value) {
    let Some(response) = msg.get("response").and_then(Value::as_object) else {
        return;
    };
    let Some(request_id) = response.get("request_id").and_then(Value::as_str) else {
        return;
    };

    // Remove before resolving so the map never holds a released waiter.
    let waiter = shared.pending.lock().await.remove(request_id);
    let Some(waiter) = waiter else {
        trace!(request_id, "control response for unknown request");
        return;
    };

    let subtype = response.get("subtype").and_then(Value::as_str);
    let outcome = if subtype == Some("error") {
        let message = response
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown control error");
        Err(ClaudeError::control_protocol(message))
    } else {
        Ok(response.get("response").cloned().unwrap_or(Value::Null))
    };

    let _ = waiter.send(outcome);
}

/// Handle one inbound control request and write the response frame.
/// Runs on its own task; failures become error responses, never a crash
/// of the pump.
async fn handle_control_request(shared: Arc<QueryShared>, msg: Value) {
    let request_id = msg
        .get("request_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let request = msg.get("request").cloned().unwrap_or(Value::Null);
    let subtype = request
        .get("subtype")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    debug!(%request_id, %subtype, "handling inbound control request");

    let result = match subtype.as_str() {
        "can_use_tool" => handle_can_use_tool(&shared, &request).await,
        "hook_callback" => handle_hook_callback(&shared, &request).await,
        "mcp_message" => handle_mcp_message(&shared, &request).await,
        other => Err(ClaudeError::control_protocol(format!(
            "unsupported control request subtype: {other}"
        ))),
    };

    let frame = match result {
        Ok(data) => json!({
            "type": "control_response",
            "response": {
                "subtype": "success",
                "request_id": request_id,
                "response": data,
            },
        }),
        Err(e) => json!({
            "type": "control_response",
            "response": {
                "subtype": "error",
                "request_id": request_id,
                "error": e.to_string(),
            },
        }),
    };

    if let Err(e) = shared.write_frame(&frame).await {
        warn!(%request_id, error = %e, "failed to write control response");
    }
}

/// Run the host permission callback for a `can_use_tool` request.
async fn handle_can_use_tool(shared: &QueryShared, request: &Value) -> Result<Value> {
    let Some(ref callback) = shared.can_use_tool else {
        return Err(ClaudeError::control_protocol(
            "canUseTool callback is not provided",
        ));
    };

    let tool_name = request
        .get("tool_name")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let original_input = request.get("input").cloned().unwrap_or(json!({}));

    let suggestions = request
        .get("permission_suggestions")
        .cloned()
        .map(|v| serde_json::from_value(v).unwrap_or_default())
        .unwrap_or_default();

    let context = ToolPermissionContext {
        suggestions,
        cancellation: shared.cancellation.child_token(),
    };

    let result = callback(ToolName::new(tool_name), original_input.clone(), context).await?;

    let response = match result {
        PermissionResult::Allow(allow) => {
            let mut response = serde_json::Map::new();
            response.insert("behavior".into(), "allow".into());
            // Echo the original input when the callback leaves it alone.
            response.insert(
                "updatedInput".into(),
                allow.updated_input.unwrap_or(original_input),
            );
            if let Some(updates) = allow.updated_permissions {
                if !updates.is_empty() {
                    response.insert("updatedPermissions".into(), serde_json::to_value(updates)?);
                }
            }
            Value::Object(response)
        }
        PermissionResult::Deny(deny) => {
            let mut response = serde_json::Map::new();
            response.insert("behavior".into(), "deny".into());
            response.insert("message".into(), deny.message.into());
            if deny.interrupt {
                response.insert("interrupt".into(), true.into());
            }
            Value::Object(response)
        }
        PermissionResult::Ask(ask) => {
            let mut response = serde_json::Map::new();
            response.insert("behavior".into(), "ask".into());
            if let Some(message) = ask.message {
                response.insert("message".into(), message.into());
            }
            if let Some(input) = ask.updated_input {
                response.insert("updatedInput".into(), input);
            }
            if let Some(updates) = ask.updated_permissions {
                if !updates.is_empty() {
                    response.insert("updatedPermissions".into(), serde_json::to_value(updates)?);
                }
            }
            Value::Object(response)
        }
    };

    Ok(response)
}

/// Run a registered hook callback for a `hook_callback` request.
async fn handle_hook_callback(shared: &QueryShared, request: &Value) -> Result<Value> {
    let callback_id = request
        .get("callback_id")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let input = request.get("input").cloned().unwrap_or(json!({}));
    let tool_use_id = request
        .get("tool_use_id")
        .and_then(Value::as_str)
        .map(str::to_string);

    let callback = shared
        .hook_callbacks
        .lock()
        .await
        .get(callback_id)
        .cloned()
        .ok_or_else(|| {
            ClaudeError::hook(format!("no hook callback found for ID: {callback_id}"))
        })?;

    let context = HookContext {
        cancellation: shared.cancellation.child_token(),
    };
    let output = callback(input, tool_use_id, context).await?;

    // Serialization carries the exact wire field spellings.
    Ok(serde_json::to_value(output)?)
}

/// Route an `mcp_message` request to the named SDK MCP server.
async fn handle_mcp_message(shared: &QueryShared, request: &Value) -> Result<Value> {
    let server_name = request
        .get("server_name")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let message = request.get("message").filter(|m| m.is_object());

    let (server_name, message) = match (server_name, message) {
        ("", _) | (_, None) => {
            return Err(ClaudeError::mcp(
                "missing server_name or message for MCP request",
            ))
        }
        (name, Some(message)) => (name, message),
    };

    let Some(server) = shared.sdk_mcp_servers.get(server_name) else {
        return Ok(json!({
            "mcp_response": {
                "jsonrpc": "2.0",
                "id": message.get("id").cloned().unwrap_or(Value::Null),
                "error": {
                    "code": -32601,
                    "message": format!("Server '{server_name}' not found"),
                },
            },
        }));
    };

    let context = ToolContext {
        cancellation: shared.cancellation.child_token(),
    };
    let reply = server.handle_message(context, message).await;
    Ok(json!({ "mcp_response": reply }))
}
