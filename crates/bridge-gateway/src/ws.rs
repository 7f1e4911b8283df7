use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use bridge_core::constants::{WS_HEARTBEAT_INTERVAL_SECONDS, WS_MISSED_HEARTBEATS_BEFORE_DROP};
use bridge_core::{BridgeError, CompletedRecord, TaskSubmission};

use crate::admission::admit;
use crate::auth::resolve_identity;
use crate::state::SharedState;

const OUTBOUND_QUEUE_DEPTH: usize = 32;

/// Registry of connected peers (§4.9). Each peer owns a bounded outbound
/// channel; a slow peer's queue filling up drops the message rather than
/// stalling completion storage (§5).
#[derive(Default)]
pub struct WsHub {
    peers: DashMap<u64, mpsc::Sender<String>>,
    next_id: AtomicU64,
}

impl WsHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self) -> (u64, mpsc::Receiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
        self.peers.insert(id, tx);
        (id, rx)
    }

    fn unregister(&self, id: u64) {
        self.peers.remove(&id);
    }

    /// Broadcast a completion to every connected peer (§4.9, §5 ordering
    /// guarantees: this is always called strictly after `registry.complete`).
    pub fn broadcast_result(&self, record: &CompletedRecord) {
        let frame = json!({ "type": "result", "payload": record }).to_string();
        for peer in self.peers.iter() {
            if peer.value().try_send(frame.clone()).is_err() {
                debug!(peer_id = *peer.key(), "dropping ws frame, peer queue full");
            }
        }
    }

    pub fn connected_count(&self) -> usize {
        self.peers.len()
    }
}

#[derive(serde::Deserialize)]
struct InboundFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

/// Upgrade handler (§4.9). Origin allow-list and WS bearer token are
/// checked before the handshake completes; a mismatch on either never
/// reaches `on_upgrade`.
pub async fn ws_handler(
    State(state): State<SharedState>,
    ConnectInfo(addr): ConnectInfo<std::net::SocketAddr>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    if let Some(allowlist) = non_empty(&state.config.args.origin_allowlist) {
        match headers.get(axum::http::header::ORIGIN).and_then(|v| v.to_str().ok()) {
            Some(origin) if allowlist.iter().any(|o| o == origin) => {}
            None => {}
            Some(_) => return BridgeError::Forbidden.into_response(),
        }
    }

    if let Some(ws_token) = &state.config.args.ws_auth_token {
        let matches = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.strip_prefix("Bearer ") == Some(ws_token.as_str()))
            .unwrap_or(false);
        if !matches {
            return BridgeError::unauthorized("/.well-known/agent.json").into_response();
        }
    }

    let peer_addr = addr.to_string();
    let now = bridge_state::now_unix();
    let resolved = resolve_identity(
        &headers,
        state.config.args.bearer_token.as_deref(),
        "POST",
        "/",
        now,
    )
    .ok()
    .flatten();

    ws.on_upgrade(move |socket| handle_socket(socket, state, peer_addr, resolved))
}

fn non_empty(v: &[String]) -> Option<&[String]> {
    if v.is_empty() {
        None
    } else {
        Some(v)
    }
}

async fn handle_socket(
    mut socket: WebSocket,
    state: SharedState,
    peer_addr: String,
    resolved: Option<crate::auth::ResolvedIdentity>,
) {
    let (peer_id, mut outbound) = state.ws_hub.register();
    let mut missed_heartbeats = 0u32;
    let mut heartbeat = tokio::time::interval(Duration::from_secs(WS_HEARTBEAT_INTERVAL_SECONDS));
    heartbeat.tick().await;

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                match frame {
                    Some(text) => {
                        if socket.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = heartbeat.tick() => {
                missed_heartbeats += 1;
                if missed_heartbeats > WS_MISSED_HEARTBEATS_BEFORE_DROP {
                    break;
                }
                if socket.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        missed_heartbeats = 0;
                        handle_inbound_frame(&mut socket, &state, &peer_addr, resolved.clone(), &text).await;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        missed_heartbeats = 0;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(%err, "ws recv error");
                        break;
                    }
                }
            }
        }
    }

    state.ws_hub.unregister(peer_id);
}

async fn handle_inbound_frame(
    socket: &mut WebSocket,
    state: &SharedState,
    peer_addr: &str,
    resolved: Option<crate::auth::ResolvedIdentity>,
    text: &str,
) {
    let parsed: Result<InboundFrame, _> = serde_json::from_str(text);
    let Ok(frame) = parsed else {
        send_error(socket, "INVALID_FRAME", "malformed frame").await;
        return;
    };

    if frame.kind != "task" {
        send_error(socket, "UNKNOWN_FRAME_TYPE", "unsupported frame type").await;
        return;
    }

    let submission: Result<TaskSubmission, _> = serde_json::from_value(frame.payload);
    let submission = match submission {
        Ok(s) => s,
        Err(_) => {
            send_error(socket, "VALIDATION_ERROR", "could not parse task submission").await;
            return;
        }
    };
    let now = bridge_state::now_unix();

    match admit(state, submission, resolved, peer_addr, now).await {
        Ok(handle) => {
            tokio::spawn(crate::dispatch::dispatch_and_complete(state.clone(), handle));
        }
        Err(err) => {
            let (code, message) = error_code_and_message(&err);
            send_error(socket, code, &message).await;
        }
    }
}

async fn send_error(socket: &mut WebSocket, code: &str, message: &str) {
    let frame = json!({ "type": "error", "code": code, "message": message }).to_string();
    socket.send(Message::Text(frame)).await.ok();
}

fn error_code_and_message(err: &BridgeError) -> (&'static str, String) {
    match err {
        BridgeError::Validation { reason, .. } => ("VALIDATION_ERROR", reason.clone()),
        BridgeError::Unauthorized { .. } => ("UNAUTHORIZED", "unauthorized".to_string()),
        BridgeError::PaymentRequired { reason } => ("PAYMENT_REQUIRED", reason.clone()),
        BridgeError::Forbidden => ("FORBIDDEN", "forbidden".to_string()),
        BridgeError::NotFound => ("NOT_FOUND", "not found".to_string()),
        BridgeError::NotCancellable => ("NOT_CANCELLABLE", "not cancellable".to_string()),
        BridgeError::BodyTooLarge => ("BODY_TOO_LARGE", "body too large".to_string()),
        BridgeError::RateLimited { help } => ("RATE_LIMITED", help.message.clone()),
        BridgeError::Capacity => ("CAPACITY_EXCEEDED", "capacity exceeded".to_string()),
        BridgeError::BadGateway => ("BAD_GATEWAY", "bad gateway".to_string()),
        BridgeError::Unavailable => ("UNAVAILABLE", "unavailable".to_string()),
        BridgeError::Internal(_) => ("INTERNAL_ERROR", "internal error".to_string()),
    }
}
