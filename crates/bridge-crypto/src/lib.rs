pub mod constcmp;
pub mod did;
pub mod hash;

pub use constcmp::constant_time_eq;
pub use did::{verify_did_signature, DidError};
pub use hash::{blake3_hash, blake3_hash_hex};
