use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::capability::{capability_document, llms_txt};
use crate::state::SharedState;
use crate::{discovery, rest, rpc, ws};

/// Assemble the full HTTP surface (§2 C1/C2/C10, §6): REST, JSON-RPC at two
/// aliases, the WebSocket upgrade, well-known capability documents, and the
/// discovery/trust proxy. One axum `Router`, one bound port.
pub fn build_router(state: SharedState) -> Router {
    let body_limit = state.config.args.body_limit_bytes;
    let cors = build_cors(&state);

    Router::new()
        .route("/task", post(rest::submit_task))
        .route("/task/:id", get(rest::get_task).delete(rest::cancel_task))
        .route("/health", get(rest::health))
        .route("/sandbox", post(rest::sandbox))
        .route("/", post(rpc::rpc_handler).get(ws::ws_handler))
        .route("/a2a", post(rpc::rpc_handler))
        .route("/.well-known/agent.json", get(agent_card))
        .route("/.well-known/agent-card.json", get(agent_card))
        .route("/.well-known/a2a.json", get(agent_card))
        .route("/llms.txt", get(llms_txt_handler))
        .route("/discovery/agents", get(discovery::search_agents))
        .route("/discovery/search", post(discovery::search))
        .route("/discovery/agents/:did", get(discovery::get_agent))
        .route("/trust/:did", get(discovery::get_trust))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .with_state(state)
}

fn build_cors(state: &SharedState) -> CorsLayer {
    let allowlist = &state.config.args.origin_allowlist;
    if allowlist.is_empty() {
        CorsLayer::new().allow_methods(Any).allow_origin(Any).allow_headers(Any)
    } else {
        let origins: Vec<axum::http::HeaderValue> = allowlist
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_methods(Any)
            .allow_headers(Any)
            .allow_origin(origins)
    }
}

async fn agent_card(axum::extract::State(state): axum::extract::State<SharedState>) -> axum::Json<serde_json::Value> {
    axum::Json(capability_document(&state))
}

async fn llms_txt_handler(axum::extract::State(state): axum::extract::State<SharedState>) -> String {
    llms_txt(&state)
}
