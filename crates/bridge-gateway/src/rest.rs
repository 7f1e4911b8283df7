use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use bridge_core::constants::{SANDBOX_HOURLY_CAP_PER_PEER, SANDBOX_MAX_CHARS};
use bridge_core::{BridgeError, RateLimitHelp, TaskKind, TaskSubmission};
use bridge_state::registry::{CancelCheck, LookupOutcome};

use crate::admission::admit;
use crate::auth::resolve_identity;
use crate::dispatch::dispatch_and_complete;
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct SubmitQuery {
    #[serde(default)]
    pub wait: bool,
}

/// `POST /task` (§4.1, §4.10).
pub async fn submit_task(
    State(state): State<SharedState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<SubmitQuery>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let submission: TaskSubmission = match serde_json::from_slice(&body) {
        Ok(s) => s,
        Err(err) => {
            return BridgeError::validation("body", err.to_string()).into_response();
        }
    };

    handle_submission(&state, addr, &headers, submission, query.wait, "POST", "/task").await
}

async fn handle_submission(
    state: &SharedState,
    addr: SocketAddr,
    headers: &HeaderMap,
    submission: TaskSubmission,
    wait: bool,
    method: &str,
    path: &str,
) -> Response {
    let now = bridge_state::now_unix();
    let resolved = match resolve_identity(headers, state.config.args.bearer_token.as_deref(), method, path, now) {
        Ok(r) => r,
        Err(err) => return err.into_response(),
    };

    let peer_addr = addr.to_string();
    let handle = match admit(state, submission, resolved, &peer_addr, now).await {
        Ok(handle) => handle,
        Err(err) => return err.into_response(),
    };

    let task_id = handle.task_id.clone();
    let notifier = handle.notifier.clone();
    tokio::spawn(dispatch_and_complete(state.clone(), handle));

    if wait {
        let timeout = std::time::Duration::from_secs(state.config.args.sync_timeout_seconds);
        if notifier.wait(timeout).await {
            if let Some(record) = state.registry.lookup_completed(&task_id) {
                return (StatusCode::OK, Json(record)).into_response();
            }
        }
    }

    let mut response = (
        StatusCode::ACCEPTED,
        Json(json!({ "task_id": task_id, "status": "pending" })),
    )
        .into_response();
    let headers_mut = response.headers_mut();
    headers_mut.insert(
        axum::http::header::LOCATION,
        HeaderValue::from_str(&format!("/task/{task_id}")).unwrap(),
    );
    headers_mut.insert("Retry-After", HeaderValue::from_static("5"));
    response
}

/// `GET /task/{id}` (§4.3, §7).
pub async fn get_task(State(state): State<SharedState>, headers: HeaderMap, Path(task_id): Path<String>) -> Response {
    let now = bridge_state::now_unix();
    let resolved = match resolve_identity(&headers, state.config.args.bearer_token.as_deref(), "GET", &format!("/task/{task_id}"), now) {
        Ok(r) => r,
        Err(err) => return err.into_response(),
    };
    let identity = resolved.map(|r| r.identity).unwrap_or_else(|| "anonymous".to_string());

    match state.registry.lookup(&task_id, &identity) {
        LookupOutcome::Running => (StatusCode::OK, Json(json!({ "status": "running" }))).into_response(),
        LookupOutcome::Completed(record) => (StatusCode::OK, Json(record)).into_response(),
        LookupOutcome::Forbidden => BridgeError::Forbidden.into_response(),
        LookupOutcome::NotFound => BridgeError::NotFound.into_response(),
    }
}

/// `DELETE /task/{id}` (§4.3, §5).
pub async fn cancel_task(State(state): State<SharedState>, headers: HeaderMap, Path(task_id): Path<String>) -> Response {
    let now = bridge_state::now_unix();
    let resolved = match resolve_identity(&headers, state.config.args.bearer_token.as_deref(), "DELETE", &format!("/task/{task_id}"), now) {
        Ok(r) => r,
        Err(err) => return err.into_response(),
    };
    let identity = resolved.map(|r| r.identity).unwrap_or_else(|| "anonymous".to_string());

    match state.registry.can_cancel(&task_id, &identity) {
        CancelCheck::Forbidden => BridgeError::Forbidden.into_response(),
        CancelCheck::NotFound => BridgeError::NotFound.into_response(),
        CancelCheck::NotCancellable => BridgeError::NotCancellable.into_response(),
        CancelCheck::Ok => {
            state.executor.cancel(&task_id).await.ok();
            let now = bridge_state::now_unix();
            state.registry.complete(
                &task_id,
                bridge_core::CompletedRecord {
                    task_id: task_id.clone(),
                    status: bridge_core::TaskStatus::Cancelled,
                    output: None,
                    error: None,
                    duration_ms: 0,
                    expires_at: now + state.config.args.completed_ttl_seconds,
                },
            );
            (StatusCode::OK, Json(json!({ "status": "cancelled" }))).into_response()
        }
    }
}

/// `GET /health` (§6.1).
pub async fn health(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let now = bridge_state::now_unix();
    let resolved = resolve_identity(&headers, state.config.args.bearer_token.as_deref(), "GET", "/health", now)
        .ok()
        .flatten();

    match resolved {
        Some(_) => Json(json!({
            "status": "ok",
            "agent": state.config.args.agent_name,
            "mode": if state.config.escrow_configured { "escrow" } else { "open" },
        }))
        .into_response(),
        None => Json(json!({ "status": "ok" })).into_response(),
    }
}

/// `POST /sandbox`: separately-rate-limited public trial (§4.1).
pub async fn sandbox(
    State(state): State<SharedState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let prompt = body.get("prompt").and_then(|v| v.as_str()).unwrap_or("");
    if prompt.is_empty() || prompt.len() > SANDBOX_MAX_CHARS {
        return BridgeError::validation("prompt", format!("must be 1-{SANDBOX_MAX_CHARS} chars")).into_response();
    }

    let peer = addr.to_string();
    let now = bridge_state::now_unix();
    let next_hour = (now.div_euclid(3600) + 1) * 3600;

    let mut entry = state
        .sandbox_counters
        .entry(peer)
        .or_insert((0, next_hour));
    if now >= entry.1 {
        entry.0 = 0;
        entry.1 = next_hour;
    }
    if entry.0 >= SANDBOX_HOURLY_CAP_PER_PEER {
        return BridgeError::RateLimited {
            help: RateLimitHelp {
                message: "sandbox trial limit reached, try again next hour".to_string(),
                retry_after_seconds: Some(entry.1 - now),
            },
        }
        .into_response();
    }
    entry.0 += 1;
    drop(entry);

    let submission = TaskSubmission {
        task_id: TaskSubmission::generate_task_id(),
        kind: TaskKind::Prompt,
        prompt: prompt.chars().take(SANDBOX_MAX_CHARS).collect(),
        client_identity: String::new(),
        context: None,
        timeout_seconds: 60,
        escrow_ref: None,
    };

    let result = match state.executor.execute(&submission).await {
        Ok(result) => result,
        Err(err) => {
            return BridgeError::Internal(err).into_response();
        }
    };

    let output = bridge_collab::truncate_output(result.output, SANDBOX_MAX_CHARS);
    Json(json!({ "status": result.status, "output": output, "error": result.error })).into_response()
}
