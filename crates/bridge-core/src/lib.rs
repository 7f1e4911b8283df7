pub mod constants;
pub mod error;
pub mod task;
pub mod trust;

pub use error::{AuthHelp, BridgeError, RateLimitHelp};
pub use task::{
    CompletedRecord, Context as TaskContext, EscrowRef, TaskKind, TaskStatus, TaskSubmission,
};
pub use trust::{RateCounter, RateScope, TrustProfile, TrustTier};
