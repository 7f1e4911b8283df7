use bridge_core::{BridgeError, RateLimitHelp, TaskSubmission};
use bridge_state::PendingHandle;

use crate::auth::{anonymous_identity, ResolvedIdentity};
use crate::state::AppState;

/// Run the ordered admission chain (§4.2 steps 2-8; step 1 body-size is
/// enforced by the transport-level `RequestBodyLimitLayer`, step 4 origin
/// is WS-only and checked before the upgrade completes). Returns the handle
/// the caller uses to dispatch to the executor and optionally wait
/// synchronously. No side effects occur on any rejection.
pub async fn admit(
    state: &AppState,
    mut submission: TaskSubmission,
    resolved: Option<ResolvedIdentity>,
    peer_addr: &str,
    now: i64,
) -> Result<PendingHandle, BridgeError> {
    if submission.task_id.is_empty() {
        submission.task_id = TaskSubmission::generate_task_id();
    }

    let sandbox_root = state.config.args.sandbox_root.as_path();
    submission.validate(Some(sandbox_root))?;

    if state.config.args.require_auth && resolved.is_none() {
        return Err(BridgeError::unauthorized(well_known_agent_card_url(state)));
    }

    let owner_identity = match &resolved {
        Some(r) => r.identity.clone(),
        None if !submission.client_identity.is_empty() => submission.client_identity.clone(),
        None => anonymous_identity(peer_addr),
    };
    submission.client_identity = owner_identity.clone();

    let is_free_tier = resolved.as_ref().map(|r| r.is_free_tier).unwrap_or(true);
    let identity_cap = state.trust_store.tier_for(&owner_identity, now).daily_cap();
    let peer_cap = state.config.args.free_tier_peer_daily_cap;

    if is_free_tier {
        if matches!(
            state.limiter.peek_identity(&owner_identity, identity_cap, now),
            bridge_state::ratelimit::Admit::Exceeded
        ) {
            return Err(rate_limited("daily identity quota exceeded"));
        }
        if matches!(
            state.limiter.peek_peer(peer_addr, peer_cap, now),
            bridge_state::ratelimit::Admit::Exceeded
        ) {
            return Err(rate_limited("daily per-peer quota exceeded"));
        }
    }

    if state.config.escrow_configured {
        if let Some(escrow_ref) = &submission.escrow_ref {
            let outcome = state
                .escrow
                .validate(escrow_ref, &state.config.args.escrow_provider_did.clone().unwrap_or_default())
                .await
                .map_err(BridgeError::Internal)?;
            if !outcome.valid {
                return Err(BridgeError::PaymentRequired {
                    reason: outcome.reason.unwrap_or_else(|| "escrow validation failed".to_string()),
                });
            }
        }
    }

    let handle = state
        .registry
        .admit(submission, &owner_identity)
        .ok_or(BridgeError::Capacity)?;

    // Only charge the free-tier quota once every later step (escrow,
    // capacity) has also succeeded; a rejection anywhere above must leave
    // both counters untouched (§4.2, §4.6).
    if is_free_tier {
        state.limiter.commit_identity(&owner_identity, now);
        state.limiter.commit_peer(peer_addr, now);
    }

    Ok(handle)
}

fn rate_limited(message: &str) -> BridgeError {
    BridgeError::RateLimited {
        help: RateLimitHelp {
            message: message.to_string(),
            retry_after_seconds: None,
        },
    }
}

fn well_known_agent_card_url(state: &AppState) -> String {
    format!(
        "http://{}:{}/.well-known/agent.json",
        state.config.args.host, state.config.args.port
    )
}
