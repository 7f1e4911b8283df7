//! Tunable bounds from spec §3 and §6. All are overridable via `bridge-gateway::config::Config`;
//! these are the documented defaults.

/// Default cap on simultaneously-pending tasks.
pub const DEFAULT_MAX_PENDING: usize = 500;
/// Default cap on retained completed-task records.
pub const DEFAULT_MAX_COMPLETED: usize = 1000;
/// Default cap on retained trust profiles.
pub const DEFAULT_MAX_PROFILES: usize = 10_000;

/// Default TTL for a completed record, in seconds.
pub const DEFAULT_COMPLETED_TTL_SECONDS: i64 = 3600;

/// Default and bounds for `timeout_seconds`.
pub const DEFAULT_TIMEOUT_SECONDS: u32 = 300;
pub const MIN_TIMEOUT_SECONDS: u32 = 1;
pub const MAX_TIMEOUT_SECONDS: u32 = 3600;

/// Default body-size limit, in bytes (1 MiB).
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Prompt length bound (bytes, UTF-8).
pub const MAX_PROMPT_BYTES: usize = 100_000;

/// Maximum length of a `task_id`.
pub const MAX_TASK_ID_LEN: usize = 128;

/// Maximum number of files in `Context::files`.
pub const MAX_CONTEXT_FILES: usize = 100;

/// Free-tier daily caps (§4.6).
pub const DEFAULT_FREE_TIER_IDENTITY_DAILY_CAP: u32 = 10;
pub const FREE_TIER_PEER_DAILY_CAP: u32 = 20;

/// Sandbox trial endpoint limits (`/sandbox`, §4.1).
pub const SANDBOX_MAX_CHARS: usize = 500;
pub const SANDBOX_HOURLY_CAP_PER_PEER: u32 = 3;

/// Sync/async resolver default deadline (§4.10).
pub const DEFAULT_SYNC_TIMEOUT_SECONDS: u64 = 60;

/// WS heartbeat interval and missed-pong tolerance (§4.9).
pub const WS_HEARTBEAT_INTERVAL_SECONDS: u64 = 30;
pub const WS_MISSED_HEARTBEATS_BEFORE_DROP: u32 = 2;

/// Escrow delivery-confirmation retry policy (§4.4).
pub const ESCROW_CONFIRM_BASE_BACKOFF_SECONDS: u64 = 1;
pub const ESCROW_CONFIRM_BACKOFF_MULTIPLIER: u64 = 2;
pub const ESCROW_CONFIRM_MAX_ATTEMPTS: u32 = 5;

/// DID signature freshness window (§4.5): [now - 300s, now + 30s].
pub const DID_TIMESTAMP_MAX_AGE_SECONDS: i64 = 300;
pub const DID_TIMESTAMP_MAX_SKEW_SECONDS: i64 = 30;

/// Tier thresholds (§4.7). `usize::MAX` chars models an unbounded output cap.
pub const UNBOUNDED_OUTPUT_CAP: usize = usize::MAX;

pub struct TierRequirement {
    pub min_completed: u64,
    pub min_age_days: i64,
    pub max_failure_rate: f64,
    pub daily_cap: u32,
    pub output_cap: usize,
}

pub const TIER_NEW: TierRequirement = TierRequirement {
    min_completed: 0,
    min_age_days: 0,
    max_failure_rate: 1.0,
    daily_cap: 10,
    output_cap: 2_000,
};
pub const TIER_FAMILIAR: TierRequirement = TierRequirement {
    min_completed: 5,
    min_age_days: 7,
    max_failure_rate: 1.0,
    daily_cap: 25,
    output_cap: 5_000,
};
pub const TIER_ESTABLISHED: TierRequirement = TierRequirement {
    min_completed: 20,
    min_age_days: 30,
    max_failure_rate: 0.20,
    daily_cap: 50,
    output_cap: UNBOUNDED_OUTPUT_CAP,
};
pub const TIER_TRUSTED: TierRequirement = TierRequirement {
    min_completed: 50,
    min_age_days: 90,
    max_failure_rate: 0.10,
    daily_cap: 100,
    output_cap: UNBOUNDED_OUTPUT_CAP,
};
