use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::{json, Value};

use bridge_core::{BridgeError, TaskKind, TaskSubmission};
use bridge_state::registry::{CancelCheck, LookupOutcome};

use crate::admission::admit;
use crate::auth::resolve_identity;
use crate::dispatch::dispatch_and_complete;
use crate::errors::to_jsonrpc_error;
use crate::state::SharedState;

#[derive(Deserialize)]
struct Envelope {
    jsonrpc: Option<String>,
    id: Option<Value>,
    method: Option<String>,
    #[serde(default)]
    params: Value,
}

/// `POST /` and `POST /a2a` (§4.1, §6.2). Envelope errors are always
/// returned as a 200 with a JSON-RPC error body — only genuine transport
/// failures (never produced here) would use a non-200 status.
pub async fn rpc_handler(
    State(state): State<SharedState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let envelope: Envelope = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(_) => return error_envelope(Value::Null, -32600, "Invalid Request", None),
    };

    let id = envelope.id.clone().unwrap_or(Value::Null);

    if envelope.jsonrpc.as_deref() != Some("2.0") || envelope.method.is_none() {
        return error_envelope(id, -32600, "Invalid Request", None);
    }
    let method = envelope.method.unwrap();

    match method.as_str() {
        "message/send" => message_send(&state, addr, &headers, id, envelope.params).await,
        "tasks/get" => tasks_get(&state, &headers, id, envelope.params).await,
        "tasks/cancel" => tasks_cancel(&state, &headers, id, envelope.params).await,
        "agent/describe" => agent_describe(&state, id),
        "agent/status" => agent_status(&state, id),
        _ => error_envelope(id, -32601, "Method not found", None),
    }
}

fn success_envelope(id: Value, result: Value) -> Response {
    Json(json!({ "jsonrpc": "2.0", "id": id, "result": result })).into_response()
}

fn error_envelope(id: Value, code: i64, message: &str, data: Option<Value>) -> Response {
    let mut error = json!({ "code": code, "message": message });
    if let Some(data) = data {
        error["data"] = data;
    }
    Json(json!({ "jsonrpc": "2.0", "id": id, "error": error })).into_response()
}

fn bridge_error_envelope(id: Value, err: BridgeError) -> Response {
    let (code, message, data) = to_jsonrpc_error(&err);
    error_envelope(id, code, &message, data)
}

async fn message_send(state: &SharedState, addr: SocketAddr, headers: &HeaderMap, id: Value, params: Value) -> Response {
    let text = params["message"]["parts"]
        .as_array()
        .and_then(|parts| parts.iter().find_map(|p| p.get("text")).and_then(|t| t.as_str()))
        .unwrap_or_default()
        .to_string();

    if text.is_empty() {
        return error_envelope(id, -32602, "Invalid params", Some(json!({ "reason": "message.parts[].text is required" })));
    }

    let submission = TaskSubmission {
        task_id: params
            .get("taskId")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        kind: TaskKind::Prompt,
        prompt: text,
        client_identity: params
            .get("clientIdentity")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        context: None,
        timeout_seconds: bridge_core::constants::DEFAULT_TIMEOUT_SECONDS,
        escrow_ref: params
            .get("escrowRef")
            .and_then(|v| v.as_str())
            .and_then(|s| bridge_core::EscrowRef::parse(s).ok()),
    };

    let now = bridge_state::now_unix();
    let resolved = match resolve_identity(headers, state.config.args.bearer_token.as_deref(), "POST", "/", now) {
        Ok(r) => r,
        Err(err) => return bridge_error_envelope(id, err),
    };

    let peer_addr = addr.to_string();
    let handle = match admit(state, submission, resolved, &peer_addr, now).await {
        Ok(handle) => handle,
        Err(err) => return bridge_error_envelope(id, err),
    };

    let task_id = handle.task_id.clone();
    let notifier = handle.notifier.clone();
    tokio::spawn(dispatch_and_complete(state.clone(), handle));

    let timeout = std::time::Duration::from_secs(state.config.args.sync_timeout_seconds);
    notifier.wait(timeout).await;
    let record = state.registry.lookup_completed(&task_id);

    let artifact_id = format!("a2a-{}-{}", now, hex::encode(rand::random::<[u8; 4]>()));
    let (state_label, parts) = match &record {
        Some(r) => (
            r.status.as_str().to_string(),
            vec![json!({ "type": "text", "text": r.output.clone().unwrap_or_default() })],
        ),
        None => ("working".to_string(), vec![]),
    };

    success_envelope(
        id,
        json!({
            "id": artifact_id,
            "status": { "state": state_label },
            "artifacts": [{ "parts": parts }],
        }),
    )
}

async fn tasks_get(state: &SharedState, headers: &HeaderMap, id: Value, params: Value) -> Response {
    let Some(task_id) = params.get("taskId").and_then(|v| v.as_str()) else {
        return error_envelope(id, -32602, "Invalid params", Some(json!({ "reason": "taskId is required" })));
    };

    let now = bridge_state::now_unix();
    let resolved = resolve_identity(headers, state.config.args.bearer_token.as_deref(), "POST", "/", now)
        .ok()
        .flatten();
    let identity = resolved.map(|r| r.identity).unwrap_or_else(|| "anonymous".to_string());

    match state.registry.lookup(task_id, &identity) {
        LookupOutcome::Running => success_envelope(id, json!({ "status": { "state": "working" } })),
        LookupOutcome::Completed(record) => success_envelope(id, json!({ "status": { "state": record.status.as_str() }, "result": record })),
        LookupOutcome::Forbidden => bridge_error_envelope(id, BridgeError::Forbidden),
        LookupOutcome::NotFound => bridge_error_envelope(id, BridgeError::NotFound),
    }
}

async fn tasks_cancel(state: &SharedState, headers: &HeaderMap, id: Value, params: Value) -> Response {
    let Some(task_id) = params.get("taskId").and_then(|v| v.as_str()) else {
        return error_envelope(id, -32602, "Invalid params", Some(json!({ "reason": "taskId is required" })));
    };

    let now = bridge_state::now_unix();
    let resolved = resolve_identity(headers, state.config.args.bearer_token.as_deref(), "POST", "/", now)
        .ok()
        .flatten();
    let identity = resolved.map(|r| r.identity).unwrap_or_else(|| "anonymous".to_string());

    match state.registry.can_cancel(task_id, &identity) {
        CancelCheck::Forbidden => bridge_error_envelope(id, BridgeError::Forbidden),
        CancelCheck::NotFound => bridge_error_envelope(id, BridgeError::NotFound),
        CancelCheck::NotCancellable => bridge_error_envelope(id, BridgeError::NotCancellable),
        CancelCheck::Ok => {
            state.executor.cancel(task_id).await.ok();
            state.registry.complete(
                task_id,
                bridge_core::CompletedRecord {
                    task_id: task_id.to_string(),
                    status: bridge_core::TaskStatus::Cancelled,
                    output: None,
                    error: None,
                    duration_ms: 0,
                    expires_at: now + state.config.args.completed_ttl_seconds,
                },
            );
            success_envelope(id, json!({ "status": { "state": "cancelled" } }))
        }
    }
}

fn agent_describe(state: &SharedState, id: Value) -> Response {
    success_envelope(id, crate::capability::capability_document(state))
}

fn agent_status(state: &SharedState, id: Value) -> Response {
    success_envelope(
        id,
        json!({
            "uptimeSeconds": state.uptime_seconds(),
            "protocols": ["rest", "jsonrpc", "ws"],
            "activeTasks": state.registry.pending_count(),
        }),
    )
}
