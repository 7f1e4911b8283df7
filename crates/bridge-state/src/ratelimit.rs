use std::path::Path;

use dashmap::DashMap;
use tracing::warn;

use bridge_core::{RateCounter, RateScope};

/// Dual per-identity / per-peer-address daily limiter for free-tier requests
/// (§4.6). Each scope is tracked independently: a request must pass both
/// checks. Counters persist across restarts via `snapshot`/`restore` (§4.8).
pub struct FreeTierLimiter {
    identity: DashMap<String, RateCounter>,
    peer: DashMap<String, RateCounter>,
}

pub enum Admit {
    Allowed,
    Exceeded,
}

impl FreeTierLimiter {
    pub fn new() -> Self {
        Self {
            identity: DashMap::new(),
            peer: DashMap::new(),
        }
    }

    /// Peek at the identity-scoped counter against `cap` without
    /// incrementing it (§4.2: admission steps must have no observable side
    /// effects until the whole pipeline is known to succeed).
    pub fn peek_identity(&self, identity: &str, cap: u32, now: i64) -> Admit {
        Self::peek_scope(&self.identity, identity, RateScope::Identity, cap, now)
    }

    /// Peek at the peer-address-scoped counter against `cap` without
    /// incrementing it.
    pub fn peek_peer(&self, peer_addr: &str, cap: u32, now: i64) -> Admit {
        Self::peek_scope(&self.peer, peer_addr, RateScope::PeerAddress, cap, now)
    }

    /// Unconditionally increment the identity-scoped counter. Callers must
    /// already have confirmed (via `peek_identity`) that the request is
    /// under cap; this only runs once the whole admission pipeline has
    /// succeeded (§4.6: both scopes are incremented as one step tied to the
    /// pipeline's overall outcome, not to each scope's own check).
    pub fn commit_identity(&self, identity: &str, now: i64) {
        Self::commit_scope(&self.identity, identity, RateScope::Identity, now);
    }

    /// Unconditionally increment the peer-address-scoped counter.
    pub fn commit_peer(&self, peer_addr: &str, now: i64) {
        Self::commit_scope(&self.peer, peer_addr, RateScope::PeerAddress, now);
    }

    fn peek_scope(
        map: &DashMap<String, RateCounter>,
        key: &str,
        scope: RateScope,
        cap: u32,
        now: i64,
    ) -> Admit {
        let mut entry = map
            .entry(key.to_string())
            .or_insert_with(|| RateCounter::new(key, scope, now));

        if entry.effective_count(now) >= cap {
            Admit::Exceeded
        } else {
            Admit::Allowed
        }
    }

    fn commit_scope(map: &DashMap<String, RateCounter>, key: &str, scope: RateScope, now: i64) {
        let mut entry = map
            .entry(key.to_string())
            .or_insert_with(|| RateCounter::new(key, scope, now));
        entry.increment(now);
    }

    /// Drop counters that rolled over more than a day ago, keeping the maps
    /// from growing unbounded across long-lived identities that stop calling.
    pub fn sweep_expired(&self, now: i64) {
        self.identity.retain(|_, c| !c.is_expired(now));
        self.peer.retain(|_, c| !c.is_expired(now));
    }

    pub fn snapshot(&self) -> Vec<RateCounter> {
        self.identity
            .iter()
            .map(|e| e.value().clone())
            .chain(self.peer.iter().map(|e| e.value().clone()))
            .collect()
    }

    pub fn restore(&self, counters: Vec<RateCounter>) {
        for counter in counters {
            match counter.scope {
                RateScope::Identity => {
                    self.identity.insert(counter.key.clone(), counter);
                }
                RateScope::PeerAddress => {
                    self.peer.insert(counter.key.clone(), counter);
                }
            }
        }
    }

    /// Persist the current counters to `path` as JSON with owner-only
    /// permissions (§4.8). Best-effort: failures are logged, not fatal, since
    /// the in-memory state remains authoritative until the next restart.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        let snapshot = self.snapshot();
        let json = serde_json::to_vec_pretty(&snapshot)?;
        crate::persist::write_private_file(path, &json)
    }

    pub fn load_from(path: &Path) -> Self {
        let limiter = Self::new();
        match std::fs::read(path) {
            Ok(bytes) => match serde_json::from_slice::<Vec<RateCounter>>(&bytes) {
                Ok(counters) => limiter.restore(counters),
                Err(err) => warn!(%err, path = %path.display(), "rate limit store corrupt, starting empty"),
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(%err, path = %path.display(), "failed to read rate limit store"),
        }
        limiter
    }
}

impl Default for FreeTierLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_cap_then_rejects() {
        let limiter = FreeTierLimiter::new();
        for _ in 0..3 {
            assert!(matches!(
                limiter.peek_identity("id1", 3, 1_000),
                Admit::Allowed
            ));
            limiter.commit_identity("id1", 1_000);
        }
        assert!(matches!(
            limiter.peek_identity("id1", 3, 1_000),
            Admit::Exceeded
        ));
    }

    #[test]
    fn peek_does_not_mutate_the_count() {
        let limiter = FreeTierLimiter::new();
        for _ in 0..5 {
            assert!(matches!(
                limiter.peek_identity("id1", 1, 1_000),
                Admit::Allowed
            ));
        }
        assert!(matches!(
            limiter.peek_identity("id1", 1, 1_000),
            Admit::Allowed
        ));
    }

    #[test]
    fn identity_and_peer_scopes_are_independent() {
        let limiter = FreeTierLimiter::new();
        for _ in 0..2 {
            limiter.commit_identity("id1", 1_000);
        }
        assert!(matches!(
            limiter.peek_identity("id1", 2, 1_000),
            Admit::Exceeded
        ));
        assert!(matches!(
            limiter.peek_peer("1.2.3.4", 2, 1_000),
            Admit::Allowed
        ));
    }

    #[test]
    fn resets_after_midnight() {
        let limiter = FreeTierLimiter::new();
        limiter.commit_identity("id1", 10);
        assert!(matches!(
            limiter.peek_identity("id1", 1, 10),
            Admit::Exceeded
        ));
        let tomorrow = bridge_core::trust::next_utc_midnight(10);
        assert!(matches!(
            limiter.peek_identity("id1", 1, tomorrow),
            Admit::Allowed
        ));
    }

    #[test]
    fn snapshot_round_trips_into_a_fresh_limiter() {
        let limiter = FreeTierLimiter::new();
        limiter.commit_identity("id1", 1_000);
        limiter.commit_peer("5.6.7.8", 1_000);

        let snapshot = limiter.snapshot();
        let restored = FreeTierLimiter::new();
        restored.restore(snapshot);

        assert!(matches!(
            restored.peek_identity("id1", 1, 1_000),
            Admit::Exceeded
        ));
        assert!(matches!(
            restored.peek_peer("5.6.7.8", 1, 1_000),
            Admit::Exceeded
        ));
    }
}
