use bridge_collab::truncate_output;
use bridge_core::{CompletedRecord, TaskStatus};
use bridge_state::PendingHandle;

use crate::state::SharedState;

/// C4: dispatch an admitted task to the executor and, on its terminal
/// result, fold the outcome back into every dependent subsystem (§4.4).
/// Meant to be driven via `tokio::spawn` so the caller's sync-wait (if any)
/// runs concurrently with executor invocation.
pub async fn dispatch_and_complete(state: SharedState, handle: PendingHandle) {
    let Some(submission) = state.registry.get_submission(&handle.task_id) else {
        return;
    };

    let result = match state.executor.execute(&submission).await {
        Ok(result) => result,
        Err(err) => {
            tracing::error!(task_id = %submission.task_id, %err, "executor invocation failed");
            bridge_collab::ExecutionResult {
                status: TaskStatus::Failed,
                output: None,
                error: Some("executor invocation failed".to_string()),
                duration_ms: 0,
            }
        }
    };

    let now = bridge_state::now_unix();
    let tier = state.trust_store.tier_for(&submission.client_identity, now);
    let output = truncate_output(result.output, tier.output_cap());

    let record = CompletedRecord {
        task_id: submission.task_id.clone(),
        status: result.status,
        output,
        error: result.error,
        duration_ms: result.duration_ms,
        expires_at: now + state.config.args.completed_ttl_seconds,
    };

    state.registry.complete(&submission.task_id, record.clone());
    state.ws_hub.broadcast_result(&record);
    state
        .trust_store
        .record_outcome(&submission.client_identity, result.status == TaskStatus::Completed, now);

    if result.status == TaskStatus::Completed {
        if let Some(escrow_ref) = submission.escrow_ref.clone() {
            if state.config.escrow_configured {
                let output_hash = record
                    .output
                    .as_deref()
                    .map(|s| bridge_crypto::blake3_hash_hex(s.as_bytes()))
                    .unwrap_or_default();
                let escrow = state.escrow.clone();
                tokio::spawn(async move {
                    if let Err(err) = escrow.confirm_delivery(&escrow_ref, &output_hash).await {
                        tracing::warn!(%err, "escrow delivery confirmation ultimately failed");
                    }
                });
            }
        }
    }
}
