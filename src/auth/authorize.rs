//! This module contains the authorization logic for redemption phase of the
//! protocol.

use base64::Engine as _;
use generic_array::{ArrayLength, GenericArray};
use http::{HeaderValue, header::HeaderName};
use nom::{
    IResult, Parser,
    bytes::complete::tag_no_case,
    combinator::eof,
    sequence::{preceded, terminated},
};
use std::io::{Read, Write};
use thiserror::Error;
use tls_codec::{Deserialize, Error, Serialize, Size};

use crate::{ChallengeDigest, Nonce, TokenType};

use super::{BASE64URL, PRIVATE_TOKEN_SCHEME, is_base64url_char, param_value, spaces};

/// A Token as defined in The Privacy Pass HTTP Authentication Scheme:
///
/// ```text
/// struct {
///     uint16_t token_type;
///     uint8_t nonce[32];
///     uint8_t challenge_digest[32];
///     uint8_t token_key_id[Nid];
///     uint8_t authenticator[Nk];
/// } Token;
/// ```
///
/// `Nid` is 0 for proof-of-work tokens and 32 for publicly verifiable tokens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<Nid: ArrayLength<u8>, Nk: ArrayLength<u8>> {
    token_type: TokenType,
    nonce: Nonce,
    challenge_digest: ChallengeDigest,
    token_key_id: GenericArray<u8, Nid>,
    authenticator: GenericArray<u8, Nk>,
}

impl<Nid: ArrayLength<u8>, Nk: ArrayLength<u8>> Size for Token<Nid, Nk> {
    fn tls_serialized_len(&self) -> usize {
        self.token_type.tls_serialized_len()
            + self.nonce.tls_serialized_len()
            + self.challenge_digest.tls_serialized_len()
            + Nid::to_usize()
            + Nk::to_usize()
    }
}

impl<Nid: ArrayLength<u8>, Nk: ArrayLength<u8>> Serialize for Token<Nid, Nk> {
    fn tls_serialize<W: Write>(&self, writer: &mut W) -> Result<usize, Error> {
        let written = self.token_type.tls_serialize(writer)?
            + self.nonce.tls_serialize(writer)?
            + self.challenge_digest.tls_serialize(writer)?;
        writer.write_all(&self.token_key_id[..])?;
        writer.write_all(&self.authenticator[..])?;
        Ok(written + Nid::to_usize() + Nk::to_usize())
    }
}

impl<Nid: ArrayLength<u8>, Nk: ArrayLength<u8>> Deserialize for Token<Nid, Nk> {
    fn tls_deserialize<R: Read>(bytes: &mut R) -> Result<Self, Error>
    where
        Self: Sized,
    {
        let token_type = TokenType::tls_deserialize(bytes)?;
        let nonce = Nonce::tls_deserialize(bytes)?;
        let challenge_digest = ChallengeDigest::tls_deserialize(bytes)?;
        let mut token_key_id = GenericArray::<u8, Nid>::default();
        bytes
            .read_exact(token_key_id.as_mut_slice())
            .map_err(|_| Error::EndOfStream)?;
        let mut authenticator = GenericArray::<u8, Nk>::default();
        bytes
            .read_exact(authenticator.as_mut_slice())
            .map_err(|_| Error::EndOfStream)?;
        Ok(Self {
            token_type,
            nonce,
            challenge_digest,
            token_key_id,
            authenticator,
        })
    }
}

impl<Nid: ArrayLength<u8>, Nk: ArrayLength<u8>> Token<Nid, Nk> {
    /// Creates a new Token.
    pub const fn new(
        token_type: TokenType,
        nonce: Nonce,
        challenge_digest: ChallengeDigest,
        token_key_id: GenericArray<u8, Nid>,
        authenticator: GenericArray<u8, Nk>,
    ) -> Self {
        Self {
            token_type,
            nonce,
            challenge_digest,
            token_key_id,
            authenticator,
        }
    }

    /// Size of the serialized token in bytes.
    #[must_use]
    pub fn size() -> usize {
        2 + 32 + 32 + Nid::to_usize() + Nk::to_usize()
    }

    /// Returns the token type.
    pub const fn token_type(&self) -> TokenType {
        self.token_type
    }

    /// Returns the nonce.
    pub const fn nonce(&self) -> Nonce {
        self.nonce
    }

    /// Returns the challenge digest.
    pub const fn challenge_digest(&self) -> &ChallengeDigest {
        &self.challenge_digest
    }

    /// Returns the token key ID.
    pub fn token_key_id(&self) -> &[u8] {
        self.token_key_id.as_ref()
    }

    /// Returns the authenticator.
    pub fn authenticator(&self) -> &[u8] {
        self.authenticator.as_ref()
    }

    /// Deserializes a token from exactly [`Token::size`] bytes.
    ///
    /// # Errors
    /// Returns an error on a length mismatch or an unknown token type.
    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() != Self::size() {
            return Err(ParseError::InvalidToken);
        }
        Self::tls_deserialize(&mut bytes).map_err(|_| ParseError::InvalidToken)
    }
}

/// Builds a `Authorize` header according to the following scheme:
///
/// `PrivateToken token="..."`
///
/// # Errors
/// Returns an error if the token is not valid.
pub fn build_authorization_header<Nid: ArrayLength<u8>, Nk: ArrayLength<u8>>(
    token: &Token<Nid, Nk>,
) -> Result<(HeaderName, HeaderValue), BuildError> {
    let value = format!(
        "{PRIVATE_TOKEN_SCHEME} token=\"{}\"",
        BASE64URL.encode(
            token
                .tls_serialize_detached()
                .map_err(|_| BuildError::InvalidToken)?
        ),
    );
    let header_name = http::header::AUTHORIZATION;
    let header_value = HeaderValue::from_str(&value).map_err(|_| BuildError::InvalidToken)?;
    Ok((header_name, header_value))
}

/// Building error for the `Authorization` header values
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Invalid token")]
    /// Invalid token
    InvalidToken,
}

/// Parses an `Authorization` header according to the following scheme:
///
/// `PrivateToken token=...`
///
/// The scheme is matched case-insensitively and the token may be quoted.
/// Before decoding, the token text must have the exact base64url length of a
/// `Token<Nid, Nk>` and start with the characters that encode
/// `expected_type`.
///
/// # Errors
/// Returns an error if the header value is not valid.
pub fn parse_authorization_header<Nid: ArrayLength<u8>, Nk: ArrayLength<u8>>(
    value: &HeaderValue,
    expected_type: TokenType,
) -> Result<Token<Nid, Nk>, ParseError> {
    let s = value.to_str().map_err(|_| ParseError::InvalidInput)?;
    parse_token_value(s, expected_type)
}

/// Parses the header value text. See [`parse_authorization_header`].
///
/// # Errors
/// Returns an error if the header value is not valid.
pub fn parse_token_value<Nid: ArrayLength<u8>, Nk: ArrayLength<u8>>(
    input: &str,
    expected_type: TokenType,
) -> Result<Token<Nid, Nk>, ParseError> {
    let (_, token_value) = parse_private_token(input).map_err(|_| ParseError::InvalidInput)?;
    decode_token(token_value, expected_type)
}

/// Gates, decodes and type-checks a base64url encoded token.
///
/// # Errors
/// Returns an error if the text does not encode a token of `expected_type`.
pub fn decode_token<Nid: ArrayLength<u8>, Nk: ArrayLength<u8>>(
    token_value: &str,
    expected_type: TokenType,
) -> Result<Token<Nid, Nk>, ParseError> {
    let expected_len = base64::encoded_len(Token::<Nid, Nk>::size(), false);
    if Some(token_value.len()) != expected_len || !token_value.chars().all(is_base64url_char) {
        return Err(ParseError::InvalidToken);
    }
    if !has_token_type_prefix(token_value, expected_type) {
        return Err(ParseError::InvalidTokenType);
    }
    let bytes = BASE64URL
        .decode(token_value)
        .map_err(|_| ParseError::InvalidToken)?;
    let token = Token::from_bytes(&bytes)?;
    if token.token_type() != expected_type {
        return Err(ParseError::InvalidTokenType);
    }
    Ok(token)
}

/// Parsing error for the `Authorization` header values
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid token")]
    /// Invalid token
    InvalidToken,
    #[error("Invalid token type")]
    /// The token does not have the expected token type
    InvalidTokenType,
    #[error("Invalid input string")]
    /// Invalid input string
    InvalidInput,
}

const BASE64URL_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

fn sextet(c: u8) -> Option<u8> {
    BASE64URL_ALPHABET
        .iter()
        .position(|&a| a == c)
        .and_then(|p| u8::try_from(p).ok())
}

/// The first two characters of an encoded token depend only on the high 12
/// bits of the token type. The third carries the low four bits in its top
/// four bits, its bottom two bits come from the nonce.
fn has_token_type_prefix(token_value: &str, token_type: TokenType) -> bool {
    let prefix = BASE64URL.encode(u16::from(token_type).to_be_bytes());
    let (token_bytes, prefix_bytes) = (token_value.as_bytes(), prefix.as_bytes());
    if token_bytes.len() < 3 || token_bytes[..2] != prefix_bytes[..2] {
        return false;
    }
    match (sextet(token_bytes[2]), sextet(prefix_bytes[2])) {
        (Some(t), Some(p)) => t >> 2 == p >> 2,
        _ => false,
    }
}

fn parse_private_token(input: &str) -> IResult<&str, &str> {
    terminated(
        preceded(
            (tag_no_case(PRIVATE_TOKEN_SCHEME), spaces, tag_no_case("token=")),
            param_value,
        ),
        eof,
    )
    .parse(input)
}
