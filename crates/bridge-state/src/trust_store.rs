use std::path::{Path, PathBuf};

use dashmap::DashMap;
use tracing::warn;

use bridge_core::{TrustProfile, TrustTier};

/// Bounded, file-persisted store of per-identity reputation records (§3,
/// §4.7, §4.9). Eviction is LRU by `last_activity_unix` when the profile
/// count would exceed `max_profiles`; a corrupt or missing store file is
/// tolerated and starts the store empty rather than failing node startup.
pub struct TrustStore {
    profiles: DashMap<String, TrustProfile>,
    max_profiles: usize,
    path: Option<PathBuf>,
}

impl TrustStore {
    pub fn new(max_profiles: usize) -> Self {
        Self {
            profiles: DashMap::new(),
            max_profiles,
            path: None,
        }
    }

    /// Load from `path` if present, tolerating a missing or corrupt file.
    pub fn load(path: impl Into<PathBuf>, max_profiles: usize) -> Self {
        let path = path.into();
        let store = Self::new(max_profiles);
        match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Vec<TrustProfile>>(&bytes) {
                Ok(profiles) => {
                    for profile in profiles {
                        store.profiles.insert(profile.identity.clone(), profile);
                    }
                }
                Err(err) => {
                    warn!(%err, path = %path.display(), "trust store corrupt, starting empty");
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(%err, path = %path.display(), "failed to read trust store"),
        }
        Self {
            path: Some(path),
            ..store
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        self.save_to(path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        let snapshot: Vec<TrustProfile> = self.profiles.iter().map(|e| e.value().clone()).collect();
        let json = serde_json::to_vec_pretty(&snapshot)?;
        crate::persist::write_private_file(path, &json)
    }

    /// Tier for `identity` as of `now`, creating a fresh NEW-tier profile on
    /// first contact (§4.7). Re-evaluated on every call, never cached.
    pub fn tier_for(&self, identity: &str, now: i64) -> TrustTier {
        self.profiles
            .entry(identity.to_string())
            .or_insert_with(|| TrustProfile::new(identity, now))
            .current_tier(now)
    }

    /// Record a completion outcome, creating the profile if absent, and
    /// evicting the least-recently-active profile if this insertion would
    /// exceed `max_profiles`.
    pub fn record_outcome(&self, identity: &str, completed: bool, now: i64) {
        {
            let mut entry = self
                .profiles
                .entry(identity.to_string())
                .or_insert_with(|| TrustProfile::new(identity, now));
            entry.record_outcome(completed, now);
        }
        self.evict_over_capacity();
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    fn evict_over_capacity(&self) {
        while self.profiles.len() > self.max_profiles {
            let lru = self
                .profiles
                .iter()
                .min_by_key(|e| e.value().last_activity_unix)
                .map(|e| e.key().clone());
            match lru {
                Some(key) => {
                    self.profiles.remove(&key);
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_contact_is_new_tier() {
        let store = TrustStore::new(100);
        assert_eq!(store.tier_for("id1", 1_000), TrustTier::New);
    }

    #[test]
    fn lru_eviction_keeps_store_bounded() {
        let store = TrustStore::new(2);
        store.record_outcome("a", true, 100);
        store.record_outcome("b", true, 200);
        store.record_outcome("c", true, 300);
        assert_eq!(store.len(), 2);
        assert_eq!(store.tier_for("a", 300), TrustTier::New);
        assert!(store.len() <= 2);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trust.json");

        let store = TrustStore::new(100);
        store.record_outcome("id1", true, 1_000);
        store.save_to(&path).unwrap();

        let reloaded = TrustStore::load(&path, 100);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.tier_for("id1", 1_000), TrustTier::New);
    }

    #[test]
    fn missing_file_loads_empty_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.json");
        let store = TrustStore::load(&path, 100);
        assert!(store.is_empty());
    }
}
