use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use bridge_core::{CompletedRecord, TaskSubmission};

use crate::notifier::Notifier;

struct Pending {
    submission: TaskSubmission,
    admitted_at: i64,
    notifier: Arc<Notifier>,
}

/// Handle returned by `admit`: the caller dispatches the task and then may
/// wait on `notifier` for the sync path (§4.10).
#[derive(Clone)]
pub struct PendingHandle {
    pub task_id: String,
    pub notifier: Arc<Notifier>,
}

#[derive(Debug, Clone)]
pub enum LookupOutcome {
    Running,
    Completed(CompletedRecord),
    Forbidden,
    NotFound,
}

/// The bounded task registry (C3, §3, §4.3). Holds the three record families
/// and enforces their size invariants. No method here performs I/O other than
/// in-memory map access; collaborators (executor, escrow) are invoked by the
/// caller, never while a lock is conceptually "held" (DashMap shards lock
/// briefly per-operation only).
pub struct TaskRegistry {
    pending: DashMap<String, Pending>,
    completed: DashMap<String, CompletedRecord>,
    owner: DashMap<String, String>,
    pending_count: AtomicUsize,
    max_pending: usize,
    max_completed: usize,
    default_ttl_seconds: i64,
}

impl TaskRegistry {
    pub fn new(max_pending: usize, max_completed: usize, default_ttl_seconds: i64) -> Self {
        Self {
            pending: DashMap::new(),
            completed: DashMap::new(),
            owner: DashMap::new(),
            pending_count: AtomicUsize::new(0),
            max_pending,
            max_completed,
            default_ttl_seconds,
        }
    }

    /// Admit a validated, not-yet-dispatched submission (§4.2 step 8, §4.3).
    /// Returns `None` if the pending set is already at capacity — the caller
    /// maps this to a `503 Capacity` error without mutating any state.
    pub fn admit(&self, submission: TaskSubmission, owner_identity: &str) -> Option<PendingHandle> {
        loop {
            let current = self.pending_count.load(Ordering::SeqCst);
            if current >= self.max_pending {
                return None;
            }
            if self
                .pending_count
                .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                break;
            }
        }

        let task_id = submission.task_id.clone();
        let notifier = Notifier::new();
        let now = crate::now_unix();

        self.owner.insert(task_id.clone(), owner_identity.to_string());
        self.pending.insert(
            task_id.clone(),
            Pending {
                submission,
                admitted_at: now,
                notifier: notifier.clone(),
            },
        );

        Some(PendingHandle { task_id, notifier })
    }

    pub fn get_submission(&self, task_id: &str) -> Option<TaskSubmission> {
        self.pending.get(task_id).map(|p| p.submission.clone())
    }

    /// Fetch a completed record without the owner gate — used by callers
    /// (the sync-wait path) that already know they own the task because
    /// they just admitted it themselves.
    pub fn lookup_completed(&self, task_id: &str) -> Option<CompletedRecord> {
        self.completed.get(task_id).map(|r| r.clone())
    }

    /// Record a terminal outcome (§4.3). Evicts the eldest completed record
    /// by `expires_at` if this insertion pushes the set over capacity.
    pub fn complete(&self, task_id: &str, mut record: CompletedRecord) {
        if let Some((_, pending)) = self.pending.remove(task_id) {
            self.pending_count.fetch_sub(1, Ordering::SeqCst);
            pending.notifier.fire();
        }

        if record.expires_at == 0 {
            record.expires_at = crate::now_unix() + self.default_ttl_seconds;
        }

        self.completed.insert(task_id.to_string(), record);
        self.evict_over_capacity();
    }

    pub fn lookup(&self, task_id: &str, requester_identity: &str) -> LookupOutcome {
        let Some(owner) = self.owner.get(task_id).map(|o| o.clone()) else {
            return LookupOutcome::NotFound;
        };
        if owner != requester_identity {
            return LookupOutcome::Forbidden;
        }
        if let Some(record) = self.completed.get(task_id) {
            return LookupOutcome::Completed(record.clone());
        }
        if self.pending.contains_key(task_id) {
            return LookupOutcome::Running;
        }
        LookupOutcome::NotFound
    }

    /// Owner-gated cancel check (§4.3, §5). Returns `true` only if the task
    /// exists, is still pending, and `requester_identity` is the owner — the
    /// caller is then responsible for invoking the executor's cancel and,
    /// on confirmation, calling `complete` with a `Cancelled` record.
    pub fn can_cancel(&self, task_id: &str, requester_identity: &str) -> CancelCheck {
        let Some(owner) = self.owner.get(task_id).map(|o| o.clone()) else {
            return CancelCheck::NotFound;
        };
        if owner != requester_identity {
            return CancelCheck::Forbidden;
        }
        if self.pending.contains_key(task_id) {
            CancelCheck::Ok
        } else {
            CancelCheck::NotCancellable
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending_count.load(Ordering::SeqCst)
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    fn evict_over_capacity(&self) {
        while self.completed.len() > self.max_completed {
            let eldest = self
                .completed
                .iter()
                .min_by_key(|e| e.value().expires_at)
                .map(|e| e.key().clone());
            if let Some(key) = eldest {
                self.completed.remove(&key);
                self.owner.remove(&key);
            } else {
                break;
            }
        }
    }

    /// Periodic sweep (§4.3): remove expired completed records and their
    /// owner entries. Intended to be driven by a `tokio::time::interval`
    /// loop in the binary (default every 60s, §4.3).
    pub fn sweep_expired(&self, now: i64) -> usize {
        let expired: Vec<String> = self
            .completed
            .iter()
            .filter(|e| e.value().expires_at <= now)
            .map(|e| e.key().clone())
            .collect();
        let count = expired.len();
        for key in &expired {
            self.completed.remove(key);
            self.owner.remove(key);
        }
        if count > 0 {
            debug!(count, "swept expired completed records");
        }
        count
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCheck {
    Ok,
    Forbidden,
    NotFound,
    NotCancellable,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_core::{TaskKind, TaskStatus};

    fn submission(id: &str) -> TaskSubmission {
        TaskSubmission {
            task_id: id.to_string(),
            kind: TaskKind::Prompt,
            prompt: "hi".into(),
            client_identity: "owner1".into(),
            context: None,
            timeout_seconds: 60,
            escrow_ref: None,
        }
    }

    fn completed(id: &str, expires_at: i64) -> CompletedRecord {
        CompletedRecord {
            task_id: id.to_string(),
            status: TaskStatus::Completed,
            output: Some("hello".into()),
            error: None,
            duration_ms: 5,
            expires_at,
        }
    }

    #[test]
    fn admit_then_lookup_is_running() {
        let reg = TaskRegistry::new(10, 10, 3600);
        reg.admit(submission("t1"), "owner1").unwrap();
        assert!(matches!(reg.lookup("t1", "owner1"), LookupOutcome::Running));
    }

    #[test]
    fn owner_gate_forbids_other_identity() {
        let reg = TaskRegistry::new(10, 10, 3600);
        reg.admit(submission("t1"), "owner1").unwrap();
        assert!(matches!(
            reg.lookup("t1", "someone-else"),
            LookupOutcome::Forbidden
        ));
    }

    #[test]
    fn unknown_task_is_notfound() {
        let reg = TaskRegistry::new(10, 10, 3600);
        assert!(matches!(reg.lookup("nope", "owner1"), LookupOutcome::NotFound));
    }

    #[test]
    fn capacity_is_enforced_and_rejected_admission_has_no_side_effects() {
        let reg = TaskRegistry::new(1, 10, 3600);
        assert!(reg.admit(submission("t1"), "owner1").is_some());
        assert!(reg.admit(submission("t2"), "owner1").is_none());
        assert_eq!(reg.pending_count(), 1);
        assert!(matches!(reg.lookup("t2", "owner1"), LookupOutcome::NotFound));
    }

    #[test]
    fn complete_moves_task_out_of_pending() {
        let reg = TaskRegistry::new(10, 10, 3600);
        reg.admit(submission("t1"), "owner1").unwrap();
        reg.complete("t1", completed("t1", crate::now_unix() + 3600));
        assert_eq!(reg.pending_count(), 0);
        assert!(matches!(
            reg.lookup("t1", "owner1"),
            LookupOutcome::Completed(_)
        ));
    }

    #[test]
    fn completed_cap_evicts_eldest() {
        let reg = TaskRegistry::new(10, 2, 3600);
        let now = crate::now_unix();
        reg.admit(submission("a"), "owner1").unwrap();
        reg.complete("a", completed("a", now + 10));
        reg.admit(submission("b"), "owner1").unwrap();
        reg.complete("b", completed("b", now + 20));
        reg.admit(submission("c"), "owner1").unwrap();
        reg.complete("c", completed("c", now + 30));

        assert_eq!(reg.completed_count(), 2);
        assert!(matches!(reg.lookup("a", "owner1"), LookupOutcome::NotFound));
    }

    #[test]
    fn ttl_sweep_removes_expired_only() {
        let reg = TaskRegistry::new(10, 10, 3600);
        let now = crate::now_unix();
        reg.admit(submission("t1"), "owner1").unwrap();
        reg.complete("t1", completed("t1", now - 1));
        reg.admit(submission("t2"), "owner1").unwrap();
        reg.complete("t2", completed("t2", now + 3600));

        let swept = reg.sweep_expired(now);
        assert_eq!(swept, 1);
        assert!(matches!(reg.lookup("t1", "owner1"), LookupOutcome::NotFound));
        assert!(matches!(
            reg.lookup("t2", "owner1"),
            LookupOutcome::Completed(_)
        ));
    }

    #[test]
    fn cancel_check_owner_gated() {
        let reg = TaskRegistry::new(10, 10, 3600);
        reg.admit(submission("t1"), "owner1").unwrap();
        assert_eq!(reg.can_cancel("t1", "owner1"), CancelCheck::Ok);
        assert_eq!(reg.can_cancel("t1", "other"), CancelCheck::Forbidden);
        reg.complete("t1", completed("t1", crate::now_unix() + 3600));
        assert_eq!(reg.can_cancel("t1", "owner1"), CancelCheck::NotCancellable);
        assert_eq!(reg.can_cancel("missing", "owner1"), CancelCheck::NotFound);
    }
}
