use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use bridge_core::BridgeError;

use crate::state::SharedState;

#[derive(Deserialize)]
pub struct SearchAgentsQuery {
    #[serde(default)]
    pub q: String,
    #[serde(rename = "minTrust")]
    pub min_trust: Option<f64>,
    #[serde(rename = "maxPrice")]
    pub max_price: Option<f64>,
    pub limit: Option<u32>,
}

fn no_directory() -> Response {
    BridgeError::Unavailable.into_response()
}

/// `GET /discovery/agents` (§6.1): proxy to the configured directory node.
pub async fn search_agents(State(state): State<SharedState>, Query(query): Query<SearchAgentsQuery>) -> Response {
    let Some(directory) = &state.directory else {
        return no_directory();
    };
    match directory
        .search_agents(&query.q, query.min_trust, query.max_price, query.limit)
        .await
    {
        Ok(value) => Json(value).into_response(),
        Err(err) => {
            tracing::warn!(%err, "directory search_agents proxy failed");
            BridgeError::BadGateway.into_response()
        }
    }
}

/// `POST /discovery/search` (§6.1): free-form proxy search.
pub async fn search(State(state): State<SharedState>, Json(body): Json<serde_json::Value>) -> Response {
    let Some(directory) = &state.directory else {
        return no_directory();
    };
    match directory.search(body).await {
        Ok(value) => Json(value).into_response(),
        Err(err) => {
            tracing::warn!(%err, "directory search proxy failed");
            BridgeError::BadGateway.into_response()
        }
    }
}

/// `GET /discovery/agents/{did}` (§6.1).
pub async fn get_agent(State(state): State<SharedState>, Path(did): Path<String>) -> Response {
    let Some(directory) = &state.directory else {
        return no_directory();
    };
    match directory.get_agent(&did).await {
        Ok(Some(value)) => Json(value).into_response(),
        Ok(None) => BridgeError::NotFound.into_response(),
        Err(err) => {
            tracing::warn!(%err, "directory get_agent proxy failed");
            BridgeError::BadGateway.into_response()
        }
    }
}

/// `GET /trust/{did}` (§6.1): merges this node's own reputation record for
/// `did` with the network view proxied from the directory, so callers don't
/// have to make two requests to compare local and network trust.
pub async fn get_trust(State(state): State<SharedState>, Path(did): Path<String>) -> Response {
    let Some(directory) = &state.directory else {
        return no_directory();
    };
    let now = chrono::Utc::now().timestamp();
    let local = local_trust(&state, &did, now);
    match directory.get_trust(&did).await {
        Ok(network) => Json(serde_json::json!({
            "did": did,
            "local": local,
            "network": network,
        }))
        .into_response(),
        Err(err) => {
            tracing::warn!(%err, "directory get_trust proxy failed");
            BridgeError::BadGateway.into_response()
        }
    }
}

fn local_trust(state: &SharedState, did: &str, now: i64) -> serde_json::Value {
    let tier = state.trust_store.tier_for(did, now);
    serde_json::json!({
        "tier": tier,
        "dailyCap": tier.daily_cap(),
        "outputCap": tier.output_cap(),
    })
}
