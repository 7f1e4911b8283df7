//! Cryptographic-DID authentication scheme (§4.5): `DID <did>:<unix-ts>:<base64url-sig>`.
//!
//! Only the key-embedding method (`did:key:z...`, multicodec-prefixed Ed25519)
//! is supported, per spec.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ed25519_dalek::{Signature, VerifyingKey};
use thiserror::Error;

use bridge_core::constants::{DID_TIMESTAMP_MAX_AGE_SECONDS, DID_TIMESTAMP_MAX_SKEW_SECONDS};

const ED25519_MULTICODEC_PREFIX: [u8; 2] = [0xED, 0x01];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DidError {
    #[error("unsupported DID method")]
    UnsupportedMethod,
    #[error("malformed did:key identifier")]
    MalformedKey,
    #[error("unsupported key type (only Ed25519 is accepted)")]
    UnsupportedKeyType,
    #[error("malformed DID header")]
    MalformedHeader,
    #[error("timestamp outside the acceptable window")]
    TimestampOutOfRange,
    #[error("signature verification failed")]
    BadSignature,
}

/// Parse a `did:key:z...` identifier and return the embedded Ed25519 public key.
pub fn parse_did_key(did: &str) -> Result<VerifyingKey, DidError> {
    let rest = did.strip_prefix("did:key:").ok_or(DidError::UnsupportedMethod)?;
    let multibase = rest.strip_prefix('z').ok_or(DidError::MalformedKey)?;
    let decoded = bs58::decode(multibase)
        .into_vec()
        .map_err(|_| DidError::MalformedKey)?;
    if decoded.len() != 2 + 32 || decoded[0..2] != ED25519_MULTICODEC_PREFIX {
        return Err(DidError::UnsupportedKeyType);
    }
    let mut key_bytes = [0u8; 32];
    key_bytes.copy_from_slice(&decoded[2..]);
    VerifyingKey::from_bytes(&key_bytes).map_err(|_| DidError::UnsupportedKeyType)
}

/// Parsed `DID <did>:<ts>:<sig>` header.
pub struct ParsedDidHeader {
    pub did: String,
    pub timestamp: i64,
    pub signature: Signature,
}

/// Parse the raw header value (without the leading `DID ` scheme token).
pub fn parse_did_header(value: &str) -> Result<ParsedDidHeader, DidError> {
    let mut parts = value.rsplitn(3, ':');
    let sig_b64 = parts.next().ok_or(DidError::MalformedHeader)?;
    let ts_str = parts.next().ok_or(DidError::MalformedHeader)?;
    let did = parts.next().ok_or(DidError::MalformedHeader)?;

    let timestamp: i64 = ts_str.parse().map_err(|_| DidError::MalformedHeader)?;
    let sig_bytes = URL_SAFE_NO_PAD
        .decode(sig_b64)
        .map_err(|_| DidError::MalformedHeader)?;
    let sig_array: [u8; 64] = sig_bytes
        .as_slice()
        .try_into()
        .map_err(|_| DidError::MalformedHeader)?;
    let signature = Signature::from_bytes(&sig_array);

    Ok(ParsedDidHeader {
        did: did.to_string(),
        timestamp,
        signature,
    })
}

/// Verify a `DID` auth header end-to-end. `method` and `path` are the HTTP
/// method/path the signature is scoped to; `now` is the current unix time.
pub fn verify_did_signature(
    header_value: &str,
    method: &str,
    path: &str,
    now: i64,
) -> Result<String, DidError> {
    let parsed = parse_did_header(header_value)?;

    if parsed.timestamp < now - DID_TIMESTAMP_MAX_AGE_SECONDS
        || parsed.timestamp > now + DID_TIMESTAMP_MAX_SKEW_SECONDS
    {
        return Err(DidError::TimestampOutOfRange);
    }

    let key = parse_did_key(&parsed.did)?;
    let message = format!("{}:{}:{}", parsed.timestamp, method, path);

    use ed25519_dalek::Verifier;
    key.verify(message.as_bytes(), &parsed.signature)
        .map_err(|_| DidError::BadSignature)?;

    Ok(parsed.did)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use rand_core_for_tests::OsRng;

    mod rand_core_for_tests {
        pub use ed25519_dalek::rand_core::OsRng;
    }

    fn make_did_key(vk: &VerifyingKey) -> String {
        let mut bytes = ED25519_MULTICODEC_PREFIX.to_vec();
        bytes.extend_from_slice(vk.as_bytes());
        format!("did:key:z{}", bs58::encode(bytes).into_string())
    }

    #[test]
    fn round_trip_sign_and_verify() {
        let sk = SigningKey::generate(&mut OsRng);
        let vk = sk.verifying_key();
        let did = make_did_key(&vk);

        let now = 1_700_000_000i64;
        let message = format!("{now}:POST:/task");
        let sig = sk.sign(message.as_bytes());
        let sig_b64 = URL_SAFE_NO_PAD.encode(sig.to_bytes());
        let header = format!("{did}:{now}:{sig_b64}");

        let verified = verify_did_signature(&header, "POST", "/task", now).unwrap();
        assert_eq!(verified, did);
    }

    #[test]
    fn rejects_stale_timestamp() {
        let sk = SigningKey::generate(&mut OsRng);
        let vk = sk.verifying_key();
        let did = make_did_key(&vk);

        let ts = 1_000i64;
        let now = ts + DID_TIMESTAMP_MAX_AGE_SECONDS + 1;
        let message = format!("{ts}:POST:/task");
        let sig = sk.sign(message.as_bytes());
        let sig_b64 = URL_SAFE_NO_PAD.encode(sig.to_bytes());
        let header = format!("{did}:{ts}:{sig_b64}");

        assert_eq!(
            verify_did_signature(&header, "POST", "/task", now),
            Err(DidError::TimestampOutOfRange)
        );
    }

    #[test]
    fn rejects_tampered_signature() {
        let sk = SigningKey::generate(&mut OsRng);
        let vk = sk.verifying_key();
        let did = make_did_key(&vk);

        let now = 1_700_000_000i64;
        let message = format!("{now}:POST:/task");
        let sig = sk.sign(message.as_bytes());
        let mut sig_bytes = sig.to_bytes();
        sig_bytes[0] ^= 0xFF;
        let sig_b64 = URL_SAFE_NO_PAD.encode(sig_bytes);
        let header = format!("{did}:{now}:{sig_b64}");

        assert_eq!(
            verify_did_signature(&header, "POST", "/task", now),
            Err(DidError::BadSignature)
        );
    }
}
