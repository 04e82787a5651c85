//! Scripted in-memory transport for driving the control protocol in tests

// Not every test binary exercises every helper.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use claude_agent_sdk::error::Result;
use claude_agent_sdk::transport::Transport;

/// Test-side handle to a [`MockTransport`]: inject inbound frames and
/// observe written frames.
pub struct MockHandle {
    /// Feed frames "from the CLI"; drop to simulate EOF.
    pub incoming_tx: mpsc::Sender<Result<Value>>,
    /// Frames written by the SDK, one parsed JSON object per line.
    pub written_rx: mpsc::UnboundedReceiver<Value>,
    /// Set once `end_input` ran.
    pub input_ended: Arc<AtomicBool>,
    /// Set once `close` ran.
    pub closed: Arc<AtomicBool>,
}

impl MockHandle {
    /// Receive written frames until one satisfies the predicate.
    pub async fn written_frame<F>(&mut self, mut pred: F) -> Value
    where
        F: FnMut(&Value) -> bool,
    {
        while let Some(frame) = self.written_rx.recv().await {
            if pred(&frame) {
                return frame;
            }
        }
        panic!("written channel closed before expected frame");
    }

    /// Receive the next written control request with the given subtype and
    /// return `(request_id, request)`.
    pub async fn next_control_request(&mut self, subtype: &str) -> (String, Value) {
        let frame = self
            .written_frame(|f| {
                f["type"] == "control_request" && f["request"]["subtype"] == subtype
            })
            .await;
        (
            frame["request_id"].as_str().unwrap().to_string(),
            frame["request"].clone(),
        )
    }

    /// Inject a successful control response for `request_id`.
    pub async fn respond_success(&self, request_id: &str, response: Value) {
        self.incoming_tx
            .send(Ok(serde_json::json!({
                "type": "control_response",
                "response": {
                    "subtype": "success",
                    "request_id": request_id,
                    "response": response,
                },
            })))
            .await
            .unwrap();
    }

    /// Inject an error control response for `request_id`.
    pub async fn respond_error(&self, request_id: &str, error: &str) {
        self.incoming_tx
            .send(Ok(serde_json::json!({
                "type": "control_response",
                "response": {
                    "subtype": "error",
                    "request_id": request_id,
                    "error": error,
                },
            })))
            .await
            .unwrap();
    }

    /// Inject a data frame.
    pub async fn feed(&self, frame: Value) {
        self.incoming_tx.send(Ok(frame)).await.unwrap();
    }

    /// Answer the next initialize request with a default server info.
    pub async fn answer_initialize(&mut self) -> Value {
        let (request_id, request) = self.next_control_request("initialize").await;
        self.respond_success(
            &request_id,
            serde_json::json!({"commands": [], "output_style": "default"}),
        )
        .await;
        request
    }
}

/// In-memory [`Transport`] driven by a [`MockHandle`].
pub struct MockTransport {
    ready: AtomicBool,
    incoming_rx: Option<mpsc::Receiver<Result<Value>>>,
    written_tx: mpsc::UnboundedSender<Value>,
    input_ended: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

/// Build a mock transport and its test handle.
pub fn mock_transport() -> (MockTransport, MockHandle) {
    let (incoming_tx, incoming_rx) = mpsc::channel(64);
    let (written_tx, written_rx) = mpsc::unbounded_channel();
    let input_ended = Arc::new(AtomicBool::new(false));
    let closed = Arc::new(AtomicBool::new(false));

    (
        MockTransport {
            ready: AtomicBool::new(false),
            incoming_rx: Some(incoming_rx),
            written_tx,
            input_ended: input_ended.clone(),
            closed: closed.clone(),
        },
        MockHandle {
            incoming_tx,
            written_rx,
            input_ended,
            closed,
        },
    )
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self) -> Result<()> {
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn write(&mut self, data: &str) -> Result<()> {
        // Every write must be one or more complete newline-terminated
        // frames; a partial frame here means writes interleaved.
        for line in data.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(line)
                .unwrap_or_else(|e| panic!("non-atomic write {line:?}: {e}"));
            let _ = self.written_tx.send(value);
        }
        Ok(())
    }

    fn read_messages(&mut self) -> mpsc::Receiver<Result<Value>> {
        match self.incoming_rx.take() {
            Some(rx) => rx,
            None => mpsc::channel(1).1,
        }
    }

    async fn end_input(&mut self) -> Result<()> {
        self.input_ended.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn close(&mut self) -> Result<()> {
        self.ready.store(false, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
