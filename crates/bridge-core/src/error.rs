use thiserror::Error;

/// Help payload attached to `Unauthorized` and `RateLimited` responses (§4.2, §4.5, §4.6).
#[derive(Debug, Clone, serde::Serialize)]
pub struct AuthHelp {
    pub auth_methods: Vec<String>,
    pub agent_card: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RateLimitHelp {
    pub message: String,
    pub retry_after_seconds: Option<i64>,
}

/// The error kinds of §7, one variant per row of the table there.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("validation error at {path}: {reason}")]
    Validation { path: String, reason: String },

    #[error("unauthorized")]
    Unauthorized { help: AuthHelp },

    #[error("payment required: {reason}")]
    PaymentRequired { reason: String },

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("task not cancellable")]
    NotCancellable,

    #[error("request body too large")]
    BodyTooLarge,

    #[error("rate limited")]
    RateLimited { help: RateLimitHelp },

    #[error("admission capacity exceeded")]
    Capacity,

    #[error("upstream directory service returned an error")]
    BadGateway,

    #[error("upstream directory service unreachable")]
    Unavailable,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BridgeError {
    pub fn validation(path: impl Into<String>, reason: impl Into<String>) -> Self {
        BridgeError::Validation {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn unauthorized(agent_card: impl Into<String>) -> Self {
        BridgeError::Unauthorized {
            help: AuthHelp {
                auth_methods: vec!["Bearer".into(), "DID".into(), "FreeTier".into()],
                agent_card: agent_card.into(),
            },
        }
    }
}
