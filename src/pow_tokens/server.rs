//! Origin-side implementation of the Proof-of-Work Token protocol.

use http::{HeaderValue, header::HeaderName};
use log::debug;
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};

use crate::{
    ChallengeDigest, TokenType, TransientStore,
    auth::{
        authenticate::{BuildError, build_token_challenge, build_www_authenticate_header},
        authorize::{decode_token, parse_token_value},
    },
    common::errors::RedeemTokenError,
};

use super::{PowToken, is_valid_difficulty, issuer_name};

/// A proof-of-work challenge ready to be sent to a client.
#[derive(Debug, Clone)]
pub struct PowChallenge {
    header_name: HeaderName,
    header_value: HeaderValue,
    challenge: Vec<u8>,
    challenge_digest: ChallengeDigest,
}

impl PowChallenge {
    /// Returns the `WWW-Authenticate` header name.
    pub const fn header_name(&self) -> &HeaderName {
        &self.header_name
    }

    /// Returns the `WWW-Authenticate` header value.
    pub const fn header_value(&self) -> &HeaderValue {
        &self.header_value
    }

    /// Returns the serialized `TokenChallenge`.
    pub fn challenge(&self) -> &[u8] {
        &self.challenge
    }

    /// Returns the digest under which the difficulty must be recorded.
    pub const fn challenge_digest(&self) -> &ChallengeDigest {
        &self.challenge_digest
    }

    /// Consumes the challenge and returns the header.
    pub fn into_header(self) -> (HeaderName, HeaderValue) {
        (self.header_name, self.header_value)
    }
}

/// Origin-side implementation of the Proof-of-Work Token protocol.
#[derive(Default, Debug)]
pub struct Server {}

impl Server {
    /// Creates a new server.
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Builds a proof-of-work challenge of the given difficulty for `origin`.
    ///
    /// The header value has the form `PrivateToken challenge="..."`. Nothing
    /// is recorded; the caller stores the difficulty under
    /// [`PowChallenge::challenge_digest`] or uses
    /// [`issue_challenge`](Self::issue_challenge).
    ///
    /// # Errors
    /// Returns an error if the difficulty is outside of `1..=32` or the
    /// redemption context is neither empty nor 32 bytes long.
    pub fn build_challenge<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        origin: &str,
        difficulty: u32,
        redemption_context: Option<&[u8]>,
    ) -> Result<PowChallenge, BuildError> {
        if !is_valid_difficulty(difficulty) {
            return Err(BuildError::InvalidDifficulty(difficulty));
        }
        let (challenge, challenge_text) = build_token_challenge(
            rng,
            TokenType::Pow,
            &issuer_name(difficulty),
            origin,
            redemption_context,
        )?;
        let (header_name, header_value) = build_www_authenticate_header(&challenge_text, None)?;
        let challenge_digest = Sha256::digest(&challenge).into();
        Ok(PowChallenge {
            header_name,
            header_value,
            challenge,
            challenge_digest,
        })
    }

    /// Builds a proof-of-work challenge and records its difficulty in
    /// `store`.
    ///
    /// # Errors
    /// Same as [`build_challenge`](Self::build_challenge). Nothing is stored
    /// on error.
    pub async fn issue_challenge<S, R>(
        &self,
        store: &S,
        rng: &mut R,
        origin: &str,
        difficulty: u32,
        redemption_context: Option<&[u8]>,
    ) -> Result<(HeaderName, HeaderValue), BuildError>
    where
        S: TransientStore,
        R: RngCore + CryptoRng,
    {
        let challenge = self.build_challenge(rng, origin, difficulty, redemption_context)?;
        store
            .put(*challenge.challenge_digest(), difficulty.to_string())
            .await;
        Ok(challenge.into_header())
    }

    /// Redeems the token carried in an `Authorization` header value.
    ///
    /// Returns `true` only if the token solves a challenge recorded in
    /// `store`. The reason of a rejection is logged and not returned.
    pub async fn redeem_authorization_header<S: TransientStore>(
        &self,
        store: &S,
        header_value: &HeaderValue,
    ) -> bool {
        let result = match header_value.to_str() {
            Ok(value) => match parse_token_value(value, TokenType::Pow) {
                Ok(token) => self.redeem(store, &token).await,
                Err(e) => Err(e.into()),
            },
            Err(_) => Err(RedeemTokenError::InvalidHeader),
        };
        accepted(result)
    }

    /// Redeems a base64url encoded token. See
    /// [`redeem_authorization_header`](Self::redeem_authorization_header).
    pub async fn redeem_token<S: TransientStore>(&self, store: &S, token_value: &str) -> bool {
        let result = match decode_token(token_value, TokenType::Pow) {
            Ok(token) => self.redeem(store, &token).await,
            Err(e) => Err(e.into()),
        };
        accepted(result)
    }

    /// Redeems a decoded token.
    ///
    /// The challenge entry is deleted only when the token is accepted.
    ///
    /// # Errors
    /// Returns the reason the token was rejected.
    pub async fn redeem<S: TransientStore>(
        &self,
        store: &S,
        token: &PowToken,
    ) -> Result<(), RedeemTokenError> {
        let challenge_digest = token.challenge_digest();
        let stored = store
            .get(challenge_digest)
            .await
            .ok_or(RedeemTokenError::MissingChallenge)?;
        let difficulty = parse_difficulty(&stored)?;

        if !token.meets_difficulty(difficulty) {
            return Err(RedeemTokenError::DifficultyNotMet);
        }

        store.delete(challenge_digest).await;
        Ok(())
    }
}

fn accepted(result: Result<(), RedeemTokenError>) -> bool {
    result
        .inspect_err(|e| debug!(reason:% = e; "Rejected proof-of-work token"))
        .is_ok()
}

/// Decimal digits only, surrounding whitespace allowed.
fn parse_difficulty(value: &str) -> Result<u32, RedeemTokenError> {
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RedeemTokenError::InvalidDifficulty);
    }
    value
        .parse::<u32>()
        .ok()
        .filter(|d| is_valid_difficulty(*d))
        .ok_or(RedeemTokenError::InvalidDifficulty)
}
