//! Integration tests for the control-protocol multiplexer

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};

use claude_agent_sdk::control::Query;
use claude_agent_sdk::mcp::{SdkMcpServer, SdkMcpTool, ToolResult};
use claude_agent_sdk::message::{parse_message, Message};
use claude_agent_sdk::permissions::permission_callback;
use claude_agent_sdk::types::{
    HookEvent, HookJsonOutput, HookMatcher, PermissionMode, PermissionResult,
    PermissionResultAllow, PermissionResultDeny,
};
use claude_agent_sdk::{hook_callback, ClaudeError};

use common::{mock_transport, MockTransport};

fn streaming_query(transport: MockTransport) -> Query {
    Query::new(Box::new(transport), true, None, None, HashMap::new(), 0)
}

#[tokio::test]
async fn test_initialize_round_trip() {
    let (transport, mut handle) = mock_transport();
    let mut query = streaming_query(transport);
    query.start().await.unwrap();

    let responder = async {
        let (request_id, request) = handle.next_control_request("initialize").await;
        let id_shape = regex::Regex::new(r"^req_\d+_[0-9a-f]{8}$").unwrap();
        assert!(
            id_shape.is_match(&request_id),
            "unexpected request id {request_id}"
        );
        assert_eq!(request["subtype"], "initialize");
        handle
            .respond_success(
                &request_id,
                json!({"commands": [], "output_style": "default"}),
            )
            .await;
    };

    let (init_result, ()) = tokio::join!(query.initialize(), responder);
    let expected = json!({"commands": [], "output_style": "default"});
    assert_eq!(init_result.unwrap(), Some(expected.clone()));
    assert_eq!(query.init_result(), Some(&expected));
}

#[tokio::test]
async fn test_request_ids_are_unique_and_counted() {
    let (transport, mut handle) = mock_transport();
    let mut query = streaming_query(transport);
    query.start().await.unwrap();

    let responder = async {
        let (first, _) = handle.next_control_request("interrupt").await;
        handle.respond_success(&first, json!({})).await;
        let (second, _) = handle.next_control_request("interrupt").await;
        handle.respond_success(&second, json!({})).await;
        (first, second)
    };

    let interrupts = async {
        query.interrupt().await.unwrap();
        query.interrupt().await.unwrap();
    };

    let ((first, second), ()) = tokio::join!(responder, interrupts);
    assert_ne!(first, second);
    assert!(first.starts_with("req_1_"));
    assert!(second.starts_with("req_2_"));
}

#[tokio::test]
async fn test_data_and_control_interleaving() {
    let (transport, mut handle) = mock_transport();
    let mut query = streaming_query(transport);
    query.start().await.unwrap();
    let mut rx = query.take_message_receiver().unwrap();

    let responder = async {
        let (request_id, _) = handle.next_control_request("interrupt").await;
        handle
            .feed(json!({
                "type": "assistant",
                "message": {"model": "m", "content": [{"type": "text", "text": "hi"}]},
            }))
            .await;
        handle.respond_success(&request_id, json!({})).await;
        handle
            .feed(json!({
                "type": "result",
                "subtype": "success",
                "duration_ms": 10,
                "duration_api_ms": 5,
                "is_error": false,
                "num_turns": 1,
                "session_id": "s",
            }))
            .await;
    };

    let collector = async {
        let first = rx.recv().await.unwrap().unwrap();
        let second = rx.recv().await.unwrap().unwrap();
        (first, second)
    };

    let (interrupted, (), (first, second)) = tokio::join!(query.interrupt(), responder, collector);
    interrupted.unwrap();

    // Exactly two data messages, in wire order; the control response never
    // surfaces as data.
    match parse_message(&first).unwrap() {
        Message::Assistant(m) => {
            assert_eq!(m.model, "m");
        }
        other => panic!("expected assistant first, got {other:?}"),
    }
    assert!(matches!(
        parse_message(&second).unwrap(),
        Message::Result(_)
    ));
}

#[tokio::test]
async fn test_data_messages_preserve_order() {
    let (transport, handle) = mock_transport();
    let mut query = streaming_query(transport);
    query.start().await.unwrap();
    let mut rx = query.take_message_receiver().unwrap();

    for i in 0..50 {
        handle
            .feed(json!({"type": "system", "subtype": "tick", "seq": i}))
            .await;
    }

    for i in 0..50 {
        let msg = rx.recv().await.unwrap().unwrap();
        assert_eq!(msg["seq"], i);
    }
}

#[tokio::test]
async fn test_permission_callback_allow_with_modified_input() {
    let callback = permission_callback(|_name, _input, _context| async move {
        Ok(PermissionResult::Allow(PermissionResultAllow {
            updated_input: Some(json!({"file_path": "/tmp/a"})),
            updated_permissions: None,
        }))
    });

    let (transport, mut handle) = mock_transport();
    let mut query = Query::new(
        Box::new(transport),
        true,
        Some(callback),
        None,
        HashMap::new(),
        0,
    );
    query.start().await.unwrap();

    handle
        .feed(json!({
            "type": "control_request",
            "request_id": "req_X",
            "request": {
                "subtype": "can_use_tool",
                "tool_name": "Write",
                "input": {"file_path": "/etc/a"},
                "permission_suggestions": [],
            },
        }))
        .await;

    let frame = handle
        .written_frame(|f| f["type"] == "control_response")
        .await;
    assert_eq!(frame["response"]["subtype"], "success");
    assert_eq!(frame["response"]["request_id"], "req_X");
    assert_eq!(frame["response"]["response"]["behavior"], "allow");
    assert_eq!(
        frame["response"]["response"]["updatedInput"],
        json!({"file_path": "/tmp/a"})
    );
}

#[tokio::test]
async fn test_permission_callback_allow_echoes_original_input() {
    let callback = permission_callback(|_name, _input, _context| async move {
        Ok(PermissionResult::Allow(PermissionResultAllow::default()))
    });

    let (transport, mut handle) = mock_transport();
    let mut query = Query::new(
        Box::new(transport),
        true,
        Some(callback),
        None,
        HashMap::new(),
        0,
    );
    query.start().await.unwrap();

    handle
        .feed(json!({
            "type": "control_request",
            "request_id": "req_Y",
            "request": {
                "subtype": "can_use_tool",
                "tool_name": "Bash",
                "input": {"command": "ls"},
            },
        }))
        .await;

    let frame = handle
        .written_frame(|f| f["type"] == "control_response")
        .await;
    assert_eq!(
        frame["response"]["response"]["updatedInput"],
        json!({"command": "ls"})
    );
}

#[tokio::test]
async fn test_permission_callback_deny_with_interrupt() {
    let callback = permission_callback(|name, _input, _context| async move {
        Ok(PermissionResult::Deny(PermissionResultDeny {
            message: format!("{} is not allowed", name.as_str()),
            interrupt: true,
        }))
    });

    let (transport, mut handle) = mock_transport();
    let mut query = Query::new(
        Box::new(transport),
        true,
        Some(callback),
        None,
        HashMap::new(),
        0,
    );
    query.start().await.unwrap();

    handle
        .feed(json!({
            "type": "control_request",
            "request_id": "req_Z",
            "request": {
                "subtype": "can_use_tool",
                "tool_name": "Bash",
                "input": {"command": "rm -rf /"},
            },
        }))
        .await;

    let frame = handle
        .written_frame(|f| f["type"] == "control_response")
        .await;
    let response = &frame["response"]["response"];
    assert_eq!(response["behavior"], "deny");
    assert_eq!(response["message"], "Bash is not allowed");
    assert_eq!(response["interrupt"], true);
}

#[tokio::test]
async fn test_permission_request_without_callback_is_an_error() {
    let (transport, mut handle) = mock_transport();
    let mut query = streaming_query(transport);
    query.start().await.unwrap();

    handle
        .feed(json!({
            "type": "control_request",
            "request_id": "req_E",
            "request": {"subtype": "can_use_tool", "tool_name": "Bash", "input": {}},
        }))
        .await;

    let frame = handle
        .written_frame(|f| f["type"] == "control_response")
        .await;
    assert_eq!(frame["response"]["subtype"], "error");
    assert!(frame["response"]["error"]
        .as_str()
        .unwrap()
        .contains("canUseTool"));
}

#[tokio::test]
async fn test_hook_registration_and_denial_spellings() {
    let deny_hook = hook_callback(|input, _tool_use_id, _context| async move {
        assert_eq!(input["tool_input"]["command"], "rm -rf /");
        Ok(HookJsonOutput {
            decision: Some("block".into()),
            hook_specific_output: Some(json!({
                "hookEventName": "PreToolUse",
                "permissionDecision": "deny",
                "permissionDecisionReason": "blocked",
            })),
            ..Default::default()
        })
    });

    let mut hooks = HashMap::new();
    hooks.insert(
        HookEvent::PreToolUse,
        vec![HookMatcher {
            matcher: Some("Bash".to_string()),
            hooks: vec![deny_hook],
        }],
    );

    let (transport, mut handle) = mock_transport();
    let mut query = Query::new(Box::new(transport), true, None, Some(hooks), HashMap::new(), 0);
    query.start().await.unwrap();

    let responder = async {
        let (request_id, request) = handle.next_control_request("initialize").await;
        // The hook table rides the initialize request as callback IDs.
        assert_eq!(request["hooks"]["PreToolUse"][0]["matcher"], "Bash");
        assert_eq!(
            request["hooks"]["PreToolUse"][0]["hookCallbackIds"],
            json!(["hook_0"])
        );
        handle.respond_success(&request_id, json!({})).await;
    };
    let (init, ()) = tokio::join!(query.initialize(), responder);
    init.unwrap();

    handle
        .feed(json!({
            "type": "control_request",
            "request_id": "req_H",
            "request": {
                "subtype": "hook_callback",
                "callback_id": "hook_0",
                "input": {
                    "hook_event_name": "PreToolUse",
                    "tool_name": "Bash",
                    "tool_input": {"command": "rm -rf /"},
                },
            },
        }))
        .await;

    let frame = handle
        .written_frame(|f| f["type"] == "control_response")
        .await;
    let response = frame["response"]["response"].as_object().unwrap();
    // Exact wire spellings, nothing extra.
    assert_eq!(response.len(), 2);
    assert_eq!(response["decision"], "block");
    assert_eq!(
        response["hookSpecificOutput"]["permissionDecision"],
        "deny"
    );
    assert_eq!(
        response["hookSpecificOutput"]["permissionDecisionReason"],
        "blocked"
    );
}

#[tokio::test]
async fn test_hook_callback_unknown_id_is_an_error() {
    let (transport, mut handle) = mock_transport();
    let mut query = streaming_query(transport);
    query.start().await.unwrap();

    handle
        .feed(json!({
            "type": "control_request",
            "request_id": "req_U",
            "request": {"subtype": "hook_callback", "callback_id": "hook_99", "input": {}},
        }))
        .await;

    let frame = handle
        .written_frame(|f| f["type"] == "control_response")
        .await;
    assert_eq!(frame["response"]["subtype"], "error");
    assert!(frame["response"]["error"]
        .as_str()
        .unwrap()
        .contains("hook_99"));
}

fn calculator_server() -> Arc<SdkMcpServer> {
    Arc::new(
        SdkMcpServer::new("calculator").tool(SdkMcpTool::new(
            "add",
            "Add two numbers",
            json!({"a": "number", "b": "number"}),
            |_ctx, input| async move {
                let sum = input["a"].as_f64().unwrap_or(0.0) + input["b"].as_f64().unwrap_or(0.0);
                let text = if sum.fract() == 0.0 {
                    format!("{}", sum as i64)
                } else {
                    format!("{sum}")
                };
                Ok(ToolResult::text(text))
            },
        )),
    )
}

#[tokio::test]
async fn test_mcp_message_list_and_call() {
    let mut servers = HashMap::new();
    servers.insert("calculator".to_string(), calculator_server());

    let (transport, mut handle) = mock_transport();
    let mut query = Query::new(Box::new(transport), true, None, None, servers, 0);
    query.start().await.unwrap();

    handle
        .feed(json!({
            "type": "control_request",
            "request_id": "req_L",
            "request": {
                "subtype": "mcp_message",
                "server_name": "calculator",
                "message": {"jsonrpc": "2.0", "id": 1, "method": "tools/list"},
            },
        }))
        .await;

    let frame = handle
        .written_frame(|f| f["type"] == "control_response")
        .await;
    let reply = &frame["response"]["response"]["mcp_response"];
    let schema = &reply["result"]["tools"][0]["inputSchema"];
    assert_eq!(schema["type"], "object");
    let mut required: Vec<&str> = schema["required"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    required.sort_unstable();
    assert_eq!(required, vec!["a", "b"]);

    handle
        .feed(json!({
            "type": "control_request",
            "request_id": "req_C",
            "request": {
                "subtype": "mcp_message",
                "server_name": "calculator",
                "message": {
                    "jsonrpc": "2.0",
                    "id": 2,
                    "method": "tools/call",
                    "params": {"name": "add", "arguments": {"a": 2.0, "b": 3.0}},
                },
            },
        }))
        .await;

    let frame = handle
        .written_frame(|f| {
            f["type"] == "control_response" && f["response"]["request_id"] == "req_C"
        })
        .await;
    let reply = &frame["response"]["response"]["mcp_response"];
    assert_eq!(reply["jsonrpc"], "2.0");
    assert_eq!(reply["id"], 2);
    assert_eq!(reply["result"]["content"][0]["text"], "5");
}

#[tokio::test]
async fn test_mcp_message_unknown_server() {
    let (transport, mut handle) = mock_transport();
    let mut query = streaming_query(transport);
    query.start().await.unwrap();

    handle
        .feed(json!({
            "type": "control_request",
            "request_id": "req_S",
            "request": {
                "subtype": "mcp_message",
                "server_name": "missing",
                "message": {"jsonrpc": "2.0", "id": 7, "method": "tools/list"},
            },
        }))
        .await;

    let frame = handle
        .written_frame(|f| f["type"] == "control_response")
        .await;
    // Missing servers answer inside mcp_response, not as a control error.
    assert_eq!(frame["response"]["subtype"], "success");
    let reply = &frame["response"]["response"]["mcp_response"];
    assert_eq!(reply["id"], 7);
    assert_eq!(reply["error"]["code"], -32601);
}

#[tokio::test]
async fn test_unsupported_inbound_subtype() {
    let (transport, mut handle) = mock_transport();
    let mut query = streaming_query(transport);
    query.start().await.unwrap();

    handle
        .feed(json!({
            "type": "control_request",
            "request_id": "req_W",
            "request": {"subtype": "mystery"},
        }))
        .await;

    let frame = handle
        .written_frame(|f| f["type"] == "control_response")
        .await;
    assert_eq!(frame["response"]["subtype"], "error");
    assert!(frame["response"]["error"]
        .as_str()
        .unwrap()
        .contains("mystery"));
}

#[tokio::test]
async fn test_control_cancel_request_is_ignored() {
    let (transport, handle) = mock_transport();
    let mut query = streaming_query(transport);
    query.start().await.unwrap();
    let mut rx = query.take_message_receiver().unwrap();

    handle
        .feed(json!({"type": "control_cancel_request", "request_id": "req_1"}))
        .await;
    handle
        .feed(json!({"type": "system", "subtype": "status"}))
        .await;

    let msg = rx.recv().await.unwrap().unwrap();
    assert_eq!(msg["type"], "system");
}

#[tokio::test]
async fn test_error_control_response_surfaces_as_control_error() {
    let (transport, mut handle) = mock_transport();
    let mut query = streaming_query(transport);
    query.start().await.unwrap();

    let responder = async {
        let (request_id, _) = handle.next_control_request("set_model").await;
        handle.respond_error(&request_id, "model not available").await;
    };

    let (result, ()) = tokio::join!(query.set_model("claude-nonexistent"), responder);
    match result.unwrap_err() {
        ClaudeError::ControlProtocol(message) => {
            assert!(message.contains("model not available"));
        }
        other => panic!("expected control error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_set_permission_mode_wire_shape() {
    let (transport, mut handle) = mock_transport();
    let mut query = streaming_query(transport);
    query.start().await.unwrap();

    let responder = async {
        let (request_id, request) = handle.next_control_request("set_permission_mode").await;
        assert_eq!(request["mode"], "acceptEdits");
        handle.respond_success(&request_id, json!({})).await;
    };

    let (result, ()) = tokio::join!(
        query.set_permission_mode(PermissionMode::AcceptEdits),
        responder
    );
    result.unwrap();
}

#[tokio::test]
async fn test_non_streaming_rejects_control_requests() {
    let (transport, _handle) = mock_transport();
    let mut query = Query::new(Box::new(transport), false, None, None, HashMap::new(), 0);
    query.start().await.unwrap();

    let err = query.interrupt().await.unwrap_err();
    assert!(matches!(err, ClaudeError::ControlProtocol(_)));
}

#[tokio::test(start_paused = true)]
async fn test_control_request_timeout() {
    let (transport, mut handle) = mock_transport();
    let mut query = streaming_query(transport);
    query.start().await.unwrap();

    // No response ever arrives; the paused clock fast-forwards the 60 s
    // window.
    let err = query.interrupt().await.unwrap_err();
    assert!(matches!(err, ClaudeError::Timeout(_)));
    let _ = handle.next_control_request("interrupt").await;

    // A later request with a fresh id still resolves.
    let responder = async {
        let (request_id, _) = handle.next_control_request("set_model").await;
        handle.respond_success(&request_id, json!({})).await;
    };
    let (result, ()) = tokio::join!(query.set_model("claude-sonnet-4-5"), responder);
    result.unwrap();
}

#[tokio::test]
async fn test_transport_eof_releases_waiters() {
    let (transport, mut handle) = mock_transport();
    let mut query = streaming_query(transport);
    query.start().await.unwrap();
    let mut rx = query.take_message_receiver().unwrap();

    let eof = async move {
        let _ = handle.next_control_request("interrupt").await;
        drop(handle.incoming_tx);
    };

    let (result, ()) = tokio::join!(query.interrupt(), eof);
    assert!(matches!(result.unwrap_err(), ClaudeError::Closed));

    // The data channel closes too.
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_transport_error_terminates_data_channel() {
    let (transport, handle) = mock_transport();
    let mut query = streaming_query(transport);
    query.start().await.unwrap();
    let mut rx = query.take_message_receiver().unwrap();

    handle
        .incoming_tx
        .send(Err(ClaudeError::json_decode("oversized frame", "{...")))
        .await
        .unwrap();

    match rx.recv().await.unwrap() {
        Err(ClaudeError::JsonDecode { .. }) => {}
        other => panic!("expected decode error, got {other:?}"),
    }
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_close_is_idempotent_and_rejects_later_requests() {
    let (transport, handle) = mock_transport();
    let mut query = streaming_query(transport);
    query.start().await.unwrap();

    query.close().await.unwrap();
    query.close().await.unwrap();
    assert!(handle.closed.load(std::sync::atomic::Ordering::SeqCst));

    let err = query.interrupt().await.unwrap_err();
    assert!(matches!(err, ClaudeError::Closed));
}

#[tokio::test]
async fn test_concurrent_requests_resolve_and_frames_stay_atomic() {
    const CALLERS: usize = 100;

    let (transport, mut handle) = mock_transport();
    let mut query = streaming_query(transport);
    query.start().await.unwrap();

    // The mock panics on any write that is not a complete frame, so this
    // also proves writes are serialized.
    let responder = async {
        for _ in 0..CALLERS {
            let (request_id, _) = handle.next_control_request("interrupt").await;
            handle.respond_success(&request_id, json!({})).await;
        }
    };

    let callers = futures::future::join_all((0..CALLERS).map(|_| query.interrupt()));
    let (results, ()) = tokio::join!(callers, responder);
    for result in results {
        result.unwrap();
    }
}

#[tokio::test]
async fn test_stream_input_writes_frames_then_ends_input() {
    let (transport, mut handle) = mock_transport();
    let mut query = streaming_query(transport);
    query.start().await.unwrap();

    let (tx, rx) = tokio::sync::mpsc::channel::<Value>(4);
    let streamer = query.spawn_stream_input(rx);

    tx.send(json!({"type": "user", "message": {"role": "user", "content": "one"}}))
        .await
        .unwrap();
    tx.send(json!({"type": "user", "message": {"role": "user", "content": "two"}}))
        .await
        .unwrap();
    drop(tx);

    let first = handle.written_frame(|f| f["type"] == "user").await;
    assert_eq!(first["message"]["content"], "one");
    let second = handle.written_frame(|f| f["type"] == "user").await;
    assert_eq!(second["message"]["content"], "two");

    streamer.await.unwrap().unwrap();
    assert!(handle.input_ended.load(std::sync::atomic::Ordering::SeqCst));
}
