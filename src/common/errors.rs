//! Common error types

use thiserror::Error;

/// Serialization error
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SerializationError {
    #[error("Invalid serialized data")]
    /// Invalid serialized data
    InvalidData,
}

/// Errors that can occur when redeeming a token.
///
/// Redemption only reports accept or reject to the token presenter; these
/// reasons are logged and never returned across the redemption boundary.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RedeemTokenError {
    #[error("Malformed authorization header")]
    /// The header does not follow the `PrivateToken token=...` grammar.
    InvalidHeader,
    #[error("The token is invalid")]
    /// The token has the wrong length or encoding.
    InvalidToken,
    #[error("Invalid token type")]
    /// The token type does not match the redeemer.
    InvalidTokenType,
    #[error("No challenge recorded for the challenge digest")]
    /// The transient store holds no entry for the challenge digest.
    MissingChallenge,
    #[error("Invalid difficulty")]
    /// The stored difficulty is not an integer in the supported range.
    InvalidDifficulty,
    #[error("The proof of work does not meet the difficulty")]
    /// The token digest has too few leading zero bits.
    DifficultyNotMet,
    #[error("Invalid token key")]
    /// The stored token key cannot be decoded or imported.
    InvalidTokenKey,
    #[error("Token key ID mismatch")]
    /// The token key ID does not match the digest of the stored key.
    KeyIdMismatch,
    #[error("Invalid signature")]
    /// The authenticator is not a valid signature.
    InvalidSignature,
}

impl From<crate::auth::authorize::ParseError> for RedeemTokenError {
    fn from(error: crate::auth::authorize::ParseError) -> Self {
        use crate::auth::authorize::ParseError;

        match error {
            ParseError::InvalidInput => RedeemTokenError::InvalidHeader,
            ParseError::InvalidToken => RedeemTokenError::InvalidToken,
            ParseError::InvalidTokenType => RedeemTokenError::InvalidTokenType,
        }
    }
}
