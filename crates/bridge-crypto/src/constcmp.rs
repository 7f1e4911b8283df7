/// Length-oblivious constant-time byte comparison (§4.5, §8).
///
/// On a length mismatch, a dummy constant-time compare is still performed
/// against `received.len()` bytes of the expected side (wrapping/zero-padded)
/// so the comparator's running time does not depend on whether the lengths
/// matched before returning `false`.
pub fn constant_time_eq(expected: &[u8], received: &[u8]) -> bool {
    if expected.len() == received.len() {
        let mut diff: u8 = 0;
        for (a, b) in expected.iter().zip(received.iter()) {
            diff |= a ^ b;
        }
        diff == 0
    } else {
        let mut diff: u8 = 0;
        for i in 0..received.len() {
            let e = expected.get(i % expected.len().max(1)).copied().unwrap_or(0);
            diff |= e ^ received[i];
        }
        let _ = diff; // running time only; result is always false on length mismatch.
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_slices_match() {
        assert!(constant_time_eq(b"secret-token", b"secret-token"));
    }

    #[test]
    fn differing_content_same_length_fails() {
        assert!(!constant_time_eq(b"secret-token", b"xxxxxx-token"));
    }

    #[test]
    fn differing_length_fails_without_early_return_panic() {
        assert!(!constant_time_eq(b"short", b"a much longer candidate string"));
        assert!(!constant_time_eq(b"a much longer expected string", b"short"));
    }

    #[test]
    fn empty_expected_does_not_panic() {
        assert!(!constant_time_eq(b"", b"anything"));
    }
}
