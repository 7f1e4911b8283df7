pub mod notifier;
pub mod persist;
pub mod ratelimit;
pub mod registry;
pub mod trust_store;

pub use notifier::Notifier;
pub use ratelimit::FreeTierLimiter;
pub use registry::{LookupOutcome, PendingHandle, TaskRegistry};
pub use trust_store::TrustStore;

/// Current unix time in seconds. Centralized so tests can reason about it
/// without reaching for `std::time` in every module.
pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}
