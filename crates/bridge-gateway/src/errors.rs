use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use bridge_core::BridgeError;

/// REST surfacing of §7's error table. Every variant returns a small JSON
/// body with at least a `code` and `message`; richer variants add `help`.
impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            BridgeError::Validation { path, reason } => (
                StatusCode::BAD_REQUEST,
                json!({ "code": "VALIDATION_ERROR", "path": path, "reason": reason }),
            ),
            BridgeError::Unauthorized { help } => (
                StatusCode::UNAUTHORIZED,
                json!({ "code": "UNAUTHORIZED", "help": {
                    "authMethods": help.auth_methods,
                    "agentCard": help.agent_card,
                }}),
            ),
            BridgeError::PaymentRequired { reason } => (
                StatusCode::PAYMENT_REQUIRED,
                json!({ "code": "PAYMENT_REQUIRED", "reason": reason }),
            ),
            BridgeError::Forbidden => (
                StatusCode::FORBIDDEN,
                json!({ "code": "FORBIDDEN" }),
            ),
            BridgeError::NotFound => (
                StatusCode::NOT_FOUND,
                json!({ "code": "NOT_FOUND" }),
            ),
            BridgeError::NotCancellable => (
                StatusCode::NOT_FOUND,
                json!({ "code": "NOT_CANCELLABLE" }),
            ),
            BridgeError::BodyTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                json!({ "code": "BODY_TOO_LARGE" }),
            ),
            BridgeError::RateLimited { help } => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({ "code": "RATE_LIMITED", "help": {
                    "message": help.message,
                    "retryAfterSeconds": help.retry_after_seconds,
                }}),
            ),
            BridgeError::Capacity => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "code": "CAPACITY_EXCEEDED" }),
            ),
            BridgeError::BadGateway => (
                StatusCode::BAD_GATEWAY,
                json!({ "code": "BAD_GATEWAY" }),
            ),
            BridgeError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "code": "UNAVAILABLE" }),
            ),
            BridgeError::Internal(err) => {
                tracing::error!(%err, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "code": "INTERNAL_ERROR" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

/// JSON-RPC 2.0 error codes (§6.2, §7). REST and RPC share `BridgeError`;
/// this converts it into the `{code, message, data?}` triple RPC responses
/// carry inside a 200-status envelope.
pub fn to_jsonrpc_error(err: &BridgeError) -> (i64, String, Option<serde_json::Value>) {
    match err {
        BridgeError::Validation { path, reason } => (
            -32602,
            "Invalid params".to_string(),
            Some(json!({ "path": path, "reason": reason })),
        ),
        BridgeError::NotFound => (-32000, "TaskNotFound".to_string(), None),
        BridgeError::NotCancellable => (-32001, "TaskNotCancellable".to_string(), None),
        BridgeError::Unauthorized { help } => (
            -32002,
            "Unauthorized".to_string(),
            Some(json!({ "authMethods": help.auth_methods, "agentCard": help.agent_card })),
        ),
        BridgeError::Forbidden => (-32003, "Forbidden".to_string(), None),
        BridgeError::PaymentRequired { reason } => {
            (-32004, "PaymentRequired".to_string(), Some(json!({ "reason": reason })))
        }
        BridgeError::RateLimited { help } => (
            -32005,
            "RateLimited".to_string(),
            Some(json!({ "message": help.message })),
        ),
        BridgeError::Capacity => (-32006, "Capacity exceeded".to_string(), None),
        BridgeError::BadGateway => (-32007, "Bad gateway".to_string(), None),
        BridgeError::Unavailable => (-32008, "Unavailable".to_string(), None),
        BridgeError::BodyTooLarge => (-32009, "Body too large".to_string(), None),
        BridgeError::Internal(err) => {
            tracing::error!(%err, "internal error");
            (-32603, "Internal error".to_string(), None)
        }
    }
}
