//! # Publicly Verifiable Tokens
//!
//! Tokens carrying an RSA-PSS signature (RSABSSA-SHA384) by the issuer over
//! the token input. The origin learns the issuer's token key from the
//! issuer directory and verifies the signature on redemption.

use base64::Engine as _;
use rsa::{RsaPublicKey, pkcs8::EncodePublicKey};
use sha2::{Digest, Sha256};
use typenum::{U32, U256};

use crate::{TokenKeyId, auth::BASE64URL, auth::authorize::Token};

pub mod directory;
pub mod server;
pub mod spki;

use self::spki::SpkiError;

/// Publicly Verifiable Token alias
pub type PublicToken = Token<U32, U256>;

/// Size of the authenticator
pub const NK: usize = 256;

/// Size of a serialized token
pub const TOKEN_LEN: usize = 2 + 32 + 32 + 32 + NK;

/// Index of the character in the base64url token key that selects the
/// RSA-PSS salt length.
pub const SALT_LENGTH_SELECTOR_INDEX: usize = 88;

/// Salt length of keys published with `saltLength 48`.
pub const SALT_LENGTH: usize = 0x30;

/// Serializes an RSA public key into the `id-RSASSA-PSS` SPKI that issuers
/// publish.
///
/// # Errors
/// Returns an error if the key is not an RSA-2048 key.
pub fn serialize_public_key(public_key: &RsaPublicKey) -> Result<Vec<u8>, SpkiError> {
    let document = public_key
        .to_public_key_der()
        .map_err(|_| SpkiError::InvalidKey)?;
    spki::to_new_encoding(document.as_bytes())
}

/// Encodes an RSA public key as the base64url token key text found in issuer
/// directories and `WWW-Authenticate` headers.
///
/// # Errors
/// Returns an error if the key is not an RSA-2048 key.
pub fn public_key_to_token_key(public_key: &RsaPublicKey) -> Result<String, SpkiError> {
    Ok(BASE64URL.encode(serialize_public_key(public_key)?))
}

/// Converts a serialized token key to a token key ID
#[must_use]
pub fn token_key_to_token_key_id(token_key: &[u8]) -> TokenKeyId {
    Sha256::digest(token_key).into()
}

/// Picks the RSA-PSS salt length for signatures under `token_key`.
///
/// Deployed keys either carry `saltLength 48` or `saltLength 0` in their
/// RSASSA-PSS parameters. In the base64url text of an RSA-2048 key the
/// character at index 88 encodes that parameter, and is `M` for 48. The
/// decision is made on the text alone; a key published with any other
/// parameter layout is verified with a salt length of 0.
#[must_use]
pub fn salt_length_for_token_key(token_key: &str) -> usize {
    match token_key.as_bytes().get(SALT_LENGTH_SELECTOR_INDEX) {
        Some(b'M') => SALT_LENGTH,
        _ => 0,
    }
}
