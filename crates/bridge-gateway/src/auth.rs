use axum::http::HeaderMap;

use bridge_core::BridgeError;
use bridge_crypto::{constant_time_eq, verify_did_signature};

/// Outcome of resolving the `Authorization` header (§4.5). `is_free_tier`
/// marks the identity as subject to both quota gates (§4.6); DID and Bearer
/// identities are only subject to the identity-scoped gate with a tier-based
/// cap (§4.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub identity: String,
    pub is_free_tier: bool,
}

const FREE_TIER_PREFIX: &str = "FreeTier ";
const BEARER_PREFIX: &str = "Bearer ";
const DID_PREFIX: &str = "DID ";

fn is_valid_free_tier_identifier(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}

/// Resolve the caller's identity from the `Authorization` header, trying
/// Bearer, then DID, then FreeTier (first match wins, §4.5). `now` is used
/// for DID timestamp freshness. Returns `Ok(None)` when no header is present
/// or none of the schemes match — callers apply `require_auth` policy.
pub fn resolve_identity(
    headers: &HeaderMap,
    bearer_token: Option<&str>,
    method: &str,
    path: &str,
    now: i64,
) -> Result<Option<ResolvedIdentity>, BridgeError> {
    let Some(raw) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };
    let Ok(value) = raw.to_str() else {
        return Ok(None);
    };

    if let Some(token) = value.strip_prefix(BEARER_PREFIX) {
        let Some(expected) = bearer_token else {
            return Ok(None);
        };
        if constant_time_eq(expected.as_bytes(), token.as_bytes()) {
            return Ok(Some(ResolvedIdentity {
                identity: format!("bearer:{expected}"),
                is_free_tier: false,
            }));
        }
        return Ok(None);
    }

    if let Some(header_value) = value.strip_prefix(DID_PREFIX) {
        return match verify_did_signature(header_value, method, path, now) {
            Ok(did) => Ok(Some(ResolvedIdentity {
                identity: did,
                is_free_tier: false,
            })),
            Err(_) => Ok(None),
        };
    }

    if let Some(identifier) = value.strip_prefix(FREE_TIER_PREFIX) {
        if is_valid_free_tier_identifier(identifier) {
            return Ok(Some(ResolvedIdentity {
                identity: format!("freetier:{identifier}"),
                is_free_tier: true,
            }));
        }
        return Ok(None);
    }

    Ok(None)
}

/// Stable anonymous identity derived from the peer address (§4.2
/// "submission identity precedence"), used when the caller is
/// unauthenticated and supplied no usable `client_identity`.
pub fn anonymous_identity(peer_addr: &str) -> String {
    format!("anon:{peer_addr}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn bearer_matches_configured_token() {
        let headers = headers_with("Bearer secret-token");
        let resolved = resolve_identity(&headers, Some("secret-token"), "GET", "/task/t1", 1000)
            .unwrap()
            .unwrap();
        assert!(!resolved.is_free_tier);
    }

    #[test]
    fn bearer_mismatch_yields_none() {
        let headers = headers_with("Bearer wrong-token");
        let resolved = resolve_identity(&headers, Some("secret-token"), "GET", "/task/t1", 1000).unwrap();
        assert!(resolved.is_none());
    }

    #[test]
    fn free_tier_identifier_must_match_pattern() {
        let headers = headers_with("FreeTier client one");
        let resolved = resolve_identity(&headers, None, "GET", "/task/t1", 1000).unwrap();
        assert!(resolved.is_none());

        let headers = headers_with("FreeTier client-one");
        let resolved = resolve_identity(&headers, None, "GET", "/task/t1", 1000)
            .unwrap()
            .unwrap();
        assert!(resolved.is_free_tier);
    }

    #[test]
    fn no_header_returns_none() {
        let headers = HeaderMap::new();
        assert!(resolve_identity(&headers, Some("x"), "GET", "/", 1000).unwrap().is_none());
    }
}
