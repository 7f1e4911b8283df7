use serde::{Deserialize, Serialize};

use crate::constants::{TIER_ESTABLISHED, TIER_FAMILIAR, TIER_NEW, TIER_TRUSTED, TierRequirement};

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrustTier {
    New,
    Familiar,
    Established,
    Trusted,
}

impl TrustTier {
    fn requirement(&self) -> &'static TierRequirement {
        match self {
            TrustTier::New => &TIER_NEW,
            TrustTier::Familiar => &TIER_FAMILIAR,
            TrustTier::Established => &TIER_ESTABLISHED,
            TrustTier::Trusted => &TIER_TRUSTED,
        }
    }

    pub fn daily_cap(&self) -> u32 {
        self.requirement().daily_cap
    }

    pub fn output_cap(&self) -> usize {
        self.requirement().output_cap
    }
}

/// Per-identity reputation record (§3). Promotion is re-evaluated on every
/// read (`current_tier`), not cached, so it is always consistent with the
/// latest counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustProfile {
    pub identity: String,
    pub first_seen_unix: i64,
    #[serde(default)]
    pub completed_count: u64,
    #[serde(default)]
    pub failed_count: u64,
    pub last_activity_unix: i64,
}

impl TrustProfile {
    pub fn new(identity: impl Into<String>, now: i64) -> Self {
        Self {
            identity: identity.into(),
            first_seen_unix: now,
            completed_count: 0,
            failed_count: 0,
            last_activity_unix: now,
        }
    }

    fn failure_rate(&self) -> f64 {
        let denom = self.completed_count + self.failed_count;
        if denom == 0 {
            0.0
        } else {
            self.failed_count as f64 / denom as f64
        }
    }

    fn age_days(&self, now: i64) -> i64 {
        (now - self.first_seen_unix).max(0) / SECONDS_PER_DAY
    }

    /// Re-evaluate this profile's tier as of `now` (§4.7 table).
    pub fn current_tier(&self, now: i64) -> TrustTier {
        let age = self.age_days(now);
        let rate = self.failure_rate();

        if self.completed_count >= TIER_TRUSTED.min_completed
            && age >= TIER_TRUSTED.min_age_days
            && rate < TIER_TRUSTED.max_failure_rate
        {
            return TrustTier::Trusted;
        }
        if self.completed_count >= TIER_ESTABLISHED.min_completed
            && age >= TIER_ESTABLISHED.min_age_days
            && rate < TIER_ESTABLISHED.max_failure_rate
        {
            return TrustTier::Established;
        }
        if self.completed_count >= TIER_FAMILIAR.min_completed && age >= TIER_FAMILIAR.min_age_days
        {
            return TrustTier::Familiar;
        }
        TrustTier::New
    }

    /// Record the outcome of a completed call (§4.7).
    pub fn record_outcome(&mut self, completed: bool, now: i64) {
        if completed {
            self.completed_count += 1;
        } else {
            self.failed_count += 1;
        }
        self.last_activity_unix = now;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateScope {
    Identity,
    PeerAddress,
}

/// A single daily counter, reset at the next UTC midnight boundary (§3, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateCounter {
    pub key: String,
    pub scope: RateScope,
    pub count: u32,
    pub reset_at: i64,
}

impl RateCounter {
    pub fn new(key: impl Into<String>, scope: RateScope, now: i64) -> Self {
        Self {
            key: key.into(),
            scope,
            count: 0,
            reset_at: next_utc_midnight(now),
        }
    }

    /// Read-and-possibly-reset: if `now >= reset_at`, the counter is treated
    /// as 0 and `reset_at` advances (§4.6). Returns the effective count.
    pub fn effective_count(&mut self, now: i64) -> u32 {
        if now >= self.reset_at {
            self.count = 0;
            self.reset_at = next_utc_midnight(now);
        }
        self.count
    }

    pub fn increment(&mut self, now: i64) {
        self.effective_count(now);
        self.count += 1;
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.reset_at + SECONDS_PER_DAY
    }
}

/// Next UTC midnight strictly after `now` (epoch seconds).
pub fn next_utc_midnight(now: i64) -> i64 {
    let days = now.div_euclid(SECONDS_PER_DAY);
    (days + 1) * SECONDS_PER_DAY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_profile_is_new_tier() {
        let p = TrustProfile::new("id1", 1_000);
        assert_eq!(p.current_tier(1_000), TrustTier::New);
    }

    #[test]
    fn promotion_monotonicity() {
        let mut p = TrustProfile::new("id1", 0);
        let day = SECONDS_PER_DAY;
        for _ in 0..5 {
            p.record_outcome(true, 7 * day);
        }
        let tier_at_7d = p.current_tier(7 * day);
        assert!(tier_at_7d >= TrustTier::Familiar);
        // Same profile, later read, never mutated: tier must not regress.
        let tier_later = p.current_tier(30 * day);
        assert!(tier_later >= tier_at_7d);
    }

    #[test]
    fn failure_rate_zero_when_no_calls() {
        let p = TrustProfile::new("id1", 0);
        assert_eq!(p.failure_rate(), 0.0);
    }

    #[test]
    fn counter_resets_at_midnight() {
        let mut c = RateCounter::new("k", RateScope::Identity, 10);
        c.increment(10);
        assert_eq!(c.count, 1);
        let after_midnight = c.reset_at + 1;
        assert_eq!(c.effective_count(after_midnight), 0);
    }
}
