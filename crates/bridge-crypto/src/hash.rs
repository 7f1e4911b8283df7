/// Compute the BLAKE3 hash of arbitrary bytes. Used for the escrow
/// delivery-confirmation hash (§4.4): `confirm_delivery(escrow_ref, hash(output))`.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

pub fn blake3_hash_hex(data: &[u8]) -> String {
    hex::encode(blake3_hash(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(blake3_hash(b"hello"), blake3_hash(b"hello"));
        assert_ne!(blake3_hash(b"hello"), blake3_hash(b"world"));
    }
}
