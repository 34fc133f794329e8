//! Client-side implementation of the Proof-of-Work Token protocol.

use generic_array::GenericArray;
use rand::{CryptoRng, RngCore};
use thiserror::Error;
use typenum::U192;

use crate::{Nonce, TokenType, auth::authenticate::TokenChallenge};

use super::{NK, PowToken, is_valid_difficulty};

/// Errors that can occur when solving a challenge.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SolveError {
    #[error("Invalid difficulty: {0}")]
    /// Difficulty outside of the supported range
    InvalidDifficulty(u32),
    #[error("Invalid TokenChallenge")]
    /// The challenge cannot be serialized
    InvalidTokenChallenge,
}

impl PowToken {
    /// Searches for a token that solves `challenge` at `difficulty`.
    ///
    /// The nonce and authenticator start out random. Only the first
    /// `ceil(difficulty / 4)` bytes of the authenticator are redrawn while
    /// searching.
    ///
    /// # Errors
    /// Returns an error if the difficulty is outside of `1..=32` or the
    /// challenge cannot be serialized.
    pub fn solve<R: RngCore + CryptoRng>(
        rng: &mut R,
        challenge: &TokenChallenge,
        difficulty: u32,
    ) -> Result<Self, SolveError> {
        if !is_valid_difficulty(difficulty) {
            return Err(SolveError::InvalidDifficulty(difficulty));
        }
        let challenge_digest = challenge
            .digest()
            .map_err(|_| SolveError::InvalidTokenChallenge)?;

        let mut nonce: Nonce = [0u8; 32];
        rng.fill_bytes(&mut nonce);
        let mut authenticator = GenericArray::<u8, U192>::default();
        rng.fill_bytes(&mut authenticator);

        let window = (difficulty.div_ceil(4) as usize).min(NK);
        loop {
            let token = Self::new(
                TokenType::Pow,
                nonce,
                challenge_digest,
                GenericArray::default(),
                authenticator,
            );
            if token.meets_difficulty(difficulty) {
                return Ok(token);
            }
            rng.fill_bytes(&mut authenticator[..window]);
        }
    }
}
