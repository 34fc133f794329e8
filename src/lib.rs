//! # Privacy Pass redemption
//!
//! Origin-side components of the Privacy Pass HTTP authentication scheme as
//! specified in Privacy Pass IETF WG
//! [documents](https://datatracker.ietf.org/wg/privacypass/documents/).
//!
//! The library builds `WWW-Authenticate` challenges and redeems the tokens
//! presented in `Authorization` headers for the following token types:
//!
//!  - Proof-of-work tokens (`0x5750`)
//!  - Publicly verifiable (blind RSA) tokens (`0x0002`)
//!
//! Challenges are bound to the state needed for redemption through a
//! caller-provided [`TransientStore`], keyed by the SHA-256 digest of the
//! challenge.

#![warn(missing_docs)]
#![deny(unreachable_pub)]
#![deny(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod auth;
pub mod common;
pub mod pow_tokens;
pub mod public_tokens;
#[cfg(feature = "test-utils")]
pub mod test_utils;

use async_trait::async_trait;
use tls_codec_derive::{TlsDeserialize, TlsSerialize, TlsSize};

pub use tls_codec::{Deserialize, Serialize};

/// Token type
#[derive(TlsSize, TlsSerialize, TlsDeserialize, Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum TokenType {
    /// Public (blind RSA) token
    Public = 2,
    /// Proof-of-work token
    Pow = 0x5750,
}

impl From<TokenType> for u16 {
    fn from(token_type: TokenType) -> Self {
        token_type as u16
    }
}

impl TryFrom<u16> for TokenType {
    type Error = common::errors::SerializationError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(TokenType::Public),
            0x5750 => Ok(TokenType::Pow),
            _ => Err(common::errors::SerializationError::InvalidData),
        }
    }
}

/// Token key ID
pub type TokenKeyId = [u8; 32];
/// Nonce
pub type Nonce = [u8; 32];
/// Challenge digest
pub type ChallengeDigest = [u8; 32];

/// Transient store that binds an issued challenge to the state needed to
/// redeem it.
///
/// Entries are keyed by the SHA-256 digest of the serialized
/// `TokenChallenge`. The value is the decimal difficulty for proof-of-work
/// challenges and the base64url token key for publicly verifiable challenges.
///
/// # Lifecycle
///
/// Entries are written when a challenge is issued, read once when a token is
/// redeemed, and deleted after redemption. Expiry of unredeemed entries is the
/// store's own policy.
///
/// # Concurrency
///
/// Redemption calls [`get`](TransientStore::get) and
/// [`delete`](TransientStore::delete) in sequence without any compare-and-swap.
/// Two concurrent redemptions of the same challenge can both observe the
/// entry. Implementations that need strict single use must make the
/// read-then-delete sequence atomic themselves.
///
/// The store requires interior mutability.
#[async_trait]
pub trait TransientStore: Send + Sync {
    /// Returns the value recorded for a challenge digest.
    async fn get(&self, challenge_digest: &ChallengeDigest) -> Option<String>;

    /// Records a value for a challenge digest, replacing any previous value.
    async fn put(&self, challenge_digest: ChallengeDigest, value: String);

    /// Removes the value recorded for a challenge digest. Absent digests are
    /// a no-op.
    async fn delete(&self, challenge_digest: &ChallengeDigest);
}

#[derive(Debug)]
pub(crate) struct TokenInput {
    token_type: TokenType,
    nonce: Nonce,
    challenge_digest: ChallengeDigest,
    token_key_id: TokenKeyId,
}

impl TokenInput {
    pub(crate) const fn new(
        token_type: TokenType,
        nonce: Nonce,
        challenge_digest: ChallengeDigest,
        token_key_id: TokenKeyId,
    ) -> Self {
        Self {
            token_type,
            nonce,
            challenge_digest,
            token_key_id,
        }
    }

    pub(crate) fn serialize(&self) -> Vec<u8> {
        // token_input = concat(0x0002, nonce, challenge_digest, token_key_id)
        let mut token_input: Vec<u8> = Vec::new();
        token_input.extend_from_slice((self.token_type as u16).to_be_bytes().as_slice());
        token_input.extend_from_slice(self.nonce.as_slice());
        token_input.extend_from_slice(self.challenge_digest.as_slice());
        token_input.extend_from_slice(self.token_key_id.as_slice());
        token_input
    }
}
