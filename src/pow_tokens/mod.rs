//! # Proof-of-Work Tokens
//!
//! The client searches for an authenticator that makes the SHA-512 digest of
//! the whole token start with a number of zero bits chosen by the origin. The
//! difficulty is encoded in the issuer name of the challenge and recorded by
//! the origin under the challenge digest.

use sha2::{Digest, Sha512};
use typenum::{U0, U192};

use crate::{Serialize, auth::authorize::Token};

pub mod client;
pub mod server;

/// Proof-of-Work Token alias
pub type PowToken = Token<U0, U192>;

/// Size of the authenticator
pub const NK: usize = 192;

/// Size of a serialized token
pub const TOKEN_LEN: usize = 2 + 32 + 32 + NK;

/// Suffix of the issuer name of proof-of-work challenges.
pub const POW_ISSUER_SUFFIX: &str = "pow.privacypass.arpa";

/// Smallest supported difficulty in bits.
pub const MIN_DIFFICULTY: u32 = 1;

/// Largest supported difficulty in bits.
pub const MAX_DIFFICULTY: u32 = 32;

/// Returns the issuer name `_difficulty-<d>._alg-0.pow.privacypass.arpa`.
#[must_use]
pub fn issuer_name(difficulty: u32) -> String {
    format!("_difficulty-{difficulty}._alg-0.{POW_ISSUER_SUFFIX}")
}

/// Returns `true` if `difficulty` is within the supported range.
#[must_use]
pub const fn is_valid_difficulty(difficulty: u32) -> bool {
    difficulty >= MIN_DIFFICULTY && difficulty <= MAX_DIFFICULTY
}

/// Returns `true` if the first `difficulty` bits of `digest`, most
/// significant bit first, are zero.
#[must_use]
pub fn has_leading_zero_bits(digest: &[u8], difficulty: u32) -> bool {
    let full_bytes = (difficulty / 8) as usize;
    let remaining_bits = difficulty % 8;
    if digest.len() < full_bytes + usize::from(remaining_bits > 0) {
        return false;
    }

    for byte in &digest[..full_bytes] {
        if *byte != 0 {
            return false;
        }
    }
    if remaining_bits == 0 {
        return true;
    }
    let mask = 0xffu8 << (8 - remaining_bits);
    digest[full_bytes] & mask == 0
}

impl PowToken {
    /// Returns `true` if the SHA-512 digest of the serialized token has
    /// `difficulty` leading zero bits.
    #[must_use]
    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        self.tls_serialize_detached()
            .map(|bytes| has_leading_zero_bits(&Sha512::digest(bytes), difficulty))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest_with_prefix(prefix: &[u8]) -> [u8; 64] {
        let mut digest = [0xffu8; 64];
        digest[..prefix.len()].copy_from_slice(prefix);
        digest
    }

    #[test]
    fn partial_byte_boundaries() {
        // 7 bits: 0x01 has exactly seven leading zeros
        let digest = digest_with_prefix(&[0x01]);
        assert!(has_leading_zero_bits(&digest, 7));
        assert!(!has_leading_zero_bits(&digest, 8));

        let digest = digest_with_prefix(&[0x00]);
        assert!(has_leading_zero_bits(&digest, 8));
        assert!(!has_leading_zero_bits(&digest, 9));

        let digest = digest_with_prefix(&[0x00, 0x7f]);
        assert!(has_leading_zero_bits(&digest, 9));
        assert!(!has_leading_zero_bits(&digest, 10));

        let digest = digest_with_prefix(&[0x00, 0x00]);
        assert!(has_leading_zero_bits(&digest, 16));
        assert!(!has_leading_zero_bits(&digest, 17));

        let digest = digest_with_prefix(&[0x00, 0x00, 0x7f]);
        assert!(has_leading_zero_bits(&digest, 17));
        assert!(!has_leading_zero_bits(&digest, 18));
    }

    #[test]
    fn all_bits_inspected() {
        // a set bit anywhere inside the prefix fails the check
        for bit in 0..32u32 {
            let mut digest = [0u8; 64];
            digest[(bit / 8) as usize] = 0x80 >> (bit % 8);
            assert!(!has_leading_zero_bits(&digest, 32), "bit {bit}");
            assert!(has_leading_zero_bits(&digest, bit), "bit {bit}");
        }
    }

    #[test]
    fn short_digest() {
        assert!(!has_leading_zero_bits(&[0u8; 2], 17));
        assert!(has_leading_zero_bits(&[0u8; 2], 16));
    }

    #[test]
    fn difficulty_range() {
        assert!(!is_valid_difficulty(0));
        assert!(is_valid_difficulty(1));
        assert!(is_valid_difficulty(32));
        assert!(!is_valid_difficulty(33));
        assert_eq!(
            issuer_name(16),
            "_difficulty-16._alg-0.pow.privacypass.arpa"
        );
    }
}
