//! This module contains the authentication logic for the challenge phase of the
//! protocol.

use base64::Engine as _;
use http::{HeaderValue, header::HeaderName};
use nom::{
    IResult, Parser,
    bytes::complete::{tag, tag_no_case},
    combinator::eof,
    multi::separated_list1,
    sequence::{preceded, separated_pair, terminated},
};
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tls_codec::{Deserialize, Serialize, TlsByteVecU8, TlsByteVecU16};
use tls_codec_derive::{TlsDeserialize, TlsSerialize, TlsSize};

use crate::ChallengeDigest;

use super::{BASE64URL, PRIVATE_TOKEN_SCHEME, key_name, opt_spaces, param_value, spaces};

/// Redemption context field of a `TokenChallenge`
pub type RedemptionContext = [u8; 32];

/// Size of a non-empty redemption context
pub const REDEMPTION_CONTEXT_LEN: usize = 32;

/// A `TokenChallenge`, as defined in The Privacy Pass HTTP Authentication Scheme:
///
/// ```text
/// struct {
///     uint16_t token_type;
///     opaque issuer_name<1..2^16-1>;
///     opaque redemption_context<0..32>;
///     opaque origin_info<0..2^16-1>;
/// } TokenChallenge;
/// ```
///
/// The token type is kept as a raw `u16` so that challenges for token types
/// this crate does not redeem still round-trip.
#[derive(Clone, Debug, PartialEq, Eq, TlsSize, TlsDeserialize, TlsSerialize)]
pub struct TokenChallenge {
    token_type: u16,
    issuer_name: TlsByteVecU16,
    redemption_context: TlsByteVecU8,
    origin_info: TlsByteVecU16,
}

impl TokenChallenge {
    /// Creates a new `TokenChallenge`. A `None` redemption context is encoded
    /// as an empty context.
    #[must_use]
    pub fn new(
        token_type: impl Into<u16>,
        issuer_name: &str,
        redemption_context: Option<RedemptionContext>,
        origin_info: &str,
    ) -> Self {
        Self {
            token_type: token_type.into(),
            issuer_name: issuer_name.as_bytes().into(),
            redemption_context: redemption_context
                .map(|rc| rc.to_vec().into())
                .unwrap_or_default(),
            origin_info: origin_info.as_bytes().into(),
        }
    }

    /// Returns the raw token type.
    #[must_use]
    pub const fn token_type(&self) -> u16 {
        self.token_type
    }

    /// Returns the issuer name bytes.
    #[must_use]
    pub fn issuer_name(&self) -> &[u8] {
        self.issuer_name.as_slice()
    }

    /// Returns the redemption context, either empty or 32 bytes.
    #[must_use]
    pub fn redemption_context(&self) -> &[u8] {
        self.redemption_context.as_slice()
    }

    /// Returns the origin info bytes.
    #[must_use]
    pub fn origin_info(&self) -> &[u8] {
        self.origin_info.as_slice()
    }

    /// Serializes the `TokenChallenge`.
    ///
    /// # Errors
    /// Returns an error if a field exceeds its length prefix.
    pub fn serialize(&self) -> Result<Vec<u8>, SerializationError> {
        self.tls_serialize_detached()
            .map_err(|_| SerializationError::InvalidTokenChallenge)
    }

    /// Deserializes the `TokenChallenge`.
    ///
    /// # Errors
    /// Returns an error if the data is truncated, carries trailing bytes, or
    /// has a redemption context that is neither empty nor 32 bytes long.
    pub fn deserialize(mut data: &[u8]) -> Result<Self, SerializationError> {
        let challenge = Self::tls_deserialize(&mut data)
            .map_err(|_| SerializationError::InvalidTokenChallenge)?;
        if !data.is_empty() {
            return Err(SerializationError::InvalidTokenChallenge);
        }
        match challenge.redemption_context.as_slice().len() {
            0 | REDEMPTION_CONTEXT_LEN => Ok(challenge),
            _ => Err(SerializationError::InvalidTokenChallenge),
        }
    }

    /// Serializes the `TokenChallenge` as a base64url encoded string.
    ///
    /// # Errors
    /// Returns an error if the `TokenChallenge` cannot be serialized.
    pub fn to_base64(&self) -> Result<String, SerializationError> {
        Ok(BASE64URL.encode(self.serialize()?))
    }

    /// Deserializes a `TokenChallenge` from a base64url encoded string.
    ///
    /// # Errors
    /// Returns an error if the `TokenChallenge` cannot be deserialized.
    pub fn from_base64(s: &str) -> Result<Self, SerializationError> {
        BASE64URL
            .decode(s)
            .map_err(|_| SerializationError::InvalidTokenChallenge)
            .and_then(|data| Self::deserialize(&data))
    }

    /// Serializes and hashes the `TokenChallenge` with SHA256.
    ///
    /// # Errors
    /// Returns an error if the `TokenChallenge` cannot be serialized.
    pub fn digest(&self) -> Result<ChallengeDigest, SerializationError> {
        Ok(Sha256::digest(self.serialize()?).into())
    }
}

/// An error that occurred during serialization or deserialization.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SerializationError {
    #[error("Invalid TokenChallenge")]
    /// Invalid TokenChallenge
    InvalidTokenChallenge,
}

/// Errors that can occur when building a `TokenChallenge`.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ChallengeError {
    #[error("Invalid redemption context length: {0}")]
    /// The caller-supplied redemption context is neither empty nor 32 bytes.
    InvalidRedemptionContextLength(usize),
    #[error("Invalid TokenChallenge")]
    /// A field exceeds its length prefix.
    InvalidTokenChallenge,
}

/// Builds a serialized `TokenChallenge` and its base64url form.
///
/// A `None` redemption context is replaced by 32 bytes drawn from `rng`. A
/// supplied context must be empty or exactly 32 bytes long.
///
/// # Errors
/// Returns [`ChallengeError::InvalidRedemptionContextLength`] for any other
/// context length.
pub fn build_token_challenge<R: RngCore + CryptoRng>(
    rng: &mut R,
    token_type: impl Into<u16>,
    issuer_name: &str,
    origin_info: &str,
    redemption_context: Option<&[u8]>,
) -> Result<(Vec<u8>, String), ChallengeError> {
    let redemption_context = match redemption_context {
        None => {
            let mut context: RedemptionContext = [0u8; REDEMPTION_CONTEXT_LEN];
            rng.fill_bytes(&mut context);
            Some(context)
        }
        Some([]) => None,
        Some(context) => Some(
            RedemptionContext::try_from(context)
                .map_err(|_| ChallengeError::InvalidRedemptionContextLength(context.len()))?,
        ),
    };

    let challenge = TokenChallenge::new(token_type, issuer_name, redemption_context, origin_info);
    let bytes = challenge
        .serialize()
        .map_err(|_| ChallengeError::InvalidTokenChallenge)?;
    let text = BASE64URL.encode(&bytes);
    Ok((bytes, text))
}

/// Builds a `WWW-Authenticate` header according to the following scheme:
///
/// `PrivateToken challenge="..."[, token-key="..."]`
///
/// `challenge` is the base64url encoded `TokenChallenge`, `token_key` the
/// base64url encoded issuer key as published by the issuer.
///
/// # Errors
/// Returns an error if the result is not a valid header value.
pub fn build_www_authenticate_header(
    challenge: &str,
    token_key: Option<&str>,
) -> Result<(HeaderName, HeaderValue), BuildError> {
    let token_key_string =
        token_key.map_or_else(String::new, |token_key| format!(", token-key=\"{token_key}\""));
    let value = format!("{PRIVATE_TOKEN_SCHEME} challenge=\"{challenge}\"{token_key_string}");
    let header_name = http::header::WWW_AUTHENTICATE;
    let header_value =
        HeaderValue::from_str(&value).map_err(|_| BuildError::InvalidTokenChallenge)?;
    Ok((header_name, header_value))
}

/// Building error for the `WWW-Authenticate` header values
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BuildError {
    #[error("Invalid TokenChallenge")]
    /// Invalid TokenChallenge
    InvalidTokenChallenge,
    #[error("Invalid difficulty: {0}")]
    /// Proof-of-work difficulty outside of the supported range
    InvalidDifficulty(u32),
    #[error(transparent)]
    /// The challenge could not be built
    Challenge(#[from] ChallengeError),
}

/// Parses a `WWW-Authenticate` header according to the following scheme:
///
/// `PrivateToken challenge=...[, token-key=...][, max-age=...]`
///
/// Several challenges may be listed, separated by commas.
///
/// # Errors
/// Returns an error if the `WWW-Authenticate` header cannot be parsed.
pub fn parse_www_authenticate_header(value: &HeaderValue) -> Result<Vec<Challenge>, ParseError> {
    let s = value.to_str().map_err(|_| ParseError::InvalidInput)?;
    parse_header_value(s)
}

/// Decoded challenge from a `WWW-Authenticate` header
#[derive(Debug, PartialEq, Eq)]
pub struct Challenge {
    challenge: TokenChallenge,
    token_key: Option<String>,
    max_age: Option<usize>,
}

impl Challenge {
    /// Returns the token challenge
    #[must_use]
    pub const fn token_challenge(&self) -> &TokenChallenge {
        &self.challenge
    }

    /// Returns the base64url encoded token key, if present
    #[must_use]
    pub fn token_key(&self) -> Option<&str> {
        self.token_key.as_deref()
    }

    /// Returns the optional max-age
    #[must_use]
    pub const fn max_age(&self) -> Option<usize> {
        self.max_age
    }
}

/// Parsing error for the `WWW-Authenticate` header values
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid challenge")]
    /// Invalid challenge
    InvalidChallenge,
    #[error("Invalid token key")]
    /// Invalid token key
    InvalidTokenKey,
    #[error("Invalid max age")]
    /// Invalid max-age
    InvalidMaxAge,
    #[error("Invalid input string")]
    /// Invalid input string
    InvalidInput,
}

fn parse_key_value(input: &str) -> IResult<&str, (&str, &str)> {
    preceded(opt_spaces, separated_pair(key_name, tag("="), param_value)).parse(input)
}

fn parse_private_token(input: &str) -> IResult<&str, Vec<(&str, &str)>> {
    preceded(
        (opt_spaces, tag_no_case(PRIVATE_TOKEN_SCHEME), spaces),
        separated_list1(tag(","), parse_key_value),
    )
    .parse(input)
}

fn parse_private_tokens(input: &str) -> IResult<&str, Vec<Vec<(&str, &str)>>> {
    terminated(
        separated_list1(tag(","), parse_private_token),
        preceded(opt_spaces, eof),
    )
    .parse(input)
}

fn parse_header_value(input: &str) -> Result<Vec<Challenge>, ParseError> {
    let (_, challenges) = parse_private_tokens(input).map_err(|_| ParseError::InvalidInput)?;
    challenges.into_iter().map(challenge_from_params).collect()
}

fn challenge_from_params(params: Vec<(&str, &str)>) -> Result<Challenge, ParseError> {
    let mut challenge = None;
    let mut token_key = None;
    let mut max_age = None;

    for (key, value) in params {
        match key.to_ascii_lowercase().as_str() {
            "challenge" => {
                if challenge.is_some() {
                    return Err(ParseError::InvalidChallenge);
                }
                challenge = Some(
                    TokenChallenge::from_base64(value).map_err(|_| ParseError::InvalidChallenge)?,
                );
            }
            "token-key" => {
                if token_key.is_some() {
                    return Err(ParseError::InvalidTokenKey);
                }
                BASE64URL
                    .decode(value)
                    .map_err(|_| ParseError::InvalidTokenKey)?;
                token_key = Some(value.to_string());
            }
            "max-age" => {
                if max_age.is_some() {
                    return Err(ParseError::InvalidMaxAge);
                }
                max_age = Some(
                    value
                        .parse::<usize>()
                        .map_err(|_| ParseError::InvalidMaxAge)?,
                );
            }
            // Unknown parameters are ignored
            _ => {}
        }
    }

    Ok(Challenge {
        challenge: challenge.ok_or(ParseError::InvalidChallenge)?,
        token_key,
        max_age,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn challenge_layout() {
        let context = [7u8; 32];
        let (bytes, text) = build_token_challenge(
            &mut OsRng,
            0xabbau16,
            "issuer.example.net",
            "origin.example.org",
            Some(&context[..]),
        )
        .unwrap();

        assert_eq!(bytes.len(), 4 + 18 + 1 + 32 + 2 + 18);
        assert_eq!(&bytes[0..2], &[0xab, 0xba]);
        assert_eq!(&bytes[2..4], &[0, 18]);
        assert_eq!(&bytes[4..22], b"issuer.example.net");
        assert_eq!(bytes[22], 32);
        assert_eq!(&bytes[23..55], &context);
        assert_eq!(&bytes[55..57], &[0, 18]);
        assert_eq!(&bytes[57..], b"origin.example.org");
        assert_eq!(text, BASE64URL.encode(&bytes));
    }

    #[test]
    fn empty_redemption_context() {
        let (bytes, _) = build_token_challenge(
            &mut OsRng,
            0xcafeu16,
            "issuer.example.net",
            "",
            Some(&[][..]),
        )
        .unwrap();

        assert_eq!(bytes.len(), 4 + 18 + 1 + 2);
        assert_eq!(bytes[22], 0);
        assert_eq!(&bytes[23..], &[0, 0]);
    }

    #[test]
    fn random_redemption_context() {
        let (first, _) =
            build_token_challenge(&mut OsRng, 2u16, "issuer", "origin", None).unwrap();
        let (second, _) =
            build_token_challenge(&mut OsRng, 2u16, "issuer", "origin", None).unwrap();

        assert_eq!(first[4 + 6], 32);
        assert_eq!(first.len(), second.len());
        assert_ne!(first, second);
    }

    #[test]
    fn invalid_redemption_context() {
        for len in [1usize, 5, 31, 33, 64] {
            let context = vec![0u8; len];
            assert_eq!(
                build_token_challenge(&mut OsRng, 2u16, "issuer", "origin", Some(&context[..])),
                Err(ChallengeError::InvalidRedemptionContextLength(len))
            );
        }
    }

    #[test]
    fn deserialize_rejects_malformed_challenges() {
        let challenge = TokenChallenge::new(2u16, "issuer", Some([1u8; 32]), "origin");
        let bytes = challenge.serialize().unwrap();
        assert_eq!(TokenChallenge::deserialize(&bytes).unwrap(), challenge);

        // Truncated
        assert!(TokenChallenge::deserialize(&bytes[..bytes.len() - 1]).is_err());

        // Trailing data
        let mut trailing = bytes.clone();
        trailing.push(0);
        assert!(TokenChallenge::deserialize(&trailing).is_err());

        // Redemption context of 5 bytes
        let mut odd_context = vec![0, 2, 0, 6];
        odd_context.extend_from_slice(b"issuer");
        odd_context.push(5);
        odd_context.extend_from_slice(&[9u8; 5]);
        odd_context.extend_from_slice(&[0, 6]);
        odd_context.extend_from_slice(b"origin");
        assert_eq!(
            TokenChallenge::deserialize(&odd_context),
            Err(SerializationError::InvalidTokenChallenge)
        );
    }

    #[test]
    fn builder_test() {
        let (_, challenge) =
            build_token_challenge(&mut OsRng, 2u16, "issuer", "origin", None).unwrap();

        let (header_name, header_value) =
            build_www_authenticate_header(&challenge, Some("a2V5")).unwrap();

        assert_eq!(header_name, http::header::WWW_AUTHENTICATE);
        assert_eq!(
            header_value.to_str().unwrap(),
            format!("PrivateToken challenge=\"{challenge}\", token-key=\"a2V5\"")
        );

        let (_, header_value) = build_www_authenticate_header(&challenge, None).unwrap();
        assert_eq!(
            header_value.to_str().unwrap(),
            format!("PrivateToken challenge=\"{challenge}\"")
        );
    }

    #[test]
    fn parser_test() {
        let challenge1 = TokenChallenge::new(2u16, "issuer1", None, "origin1");
        let challenge2 = TokenChallenge::new(0x5750u16, "issuer2", Some([3u8; 32]), "origin2");

        let input = HeaderValue::from_str(&format!(
            "privatetoken challenge=\"{}\", token-key=\"a2V5MQ==\", max-age=10, PrivateToken challenge={}",
            challenge1.to_base64().unwrap(),
            challenge2.to_base64().unwrap(),
        ))
        .unwrap();

        let challenge_list = parse_www_authenticate_header(&input).unwrap();

        assert_eq!(
            challenge_list,
            vec![
                Challenge {
                    challenge: challenge1,
                    token_key: Some("a2V5MQ==".to_string()),
                    max_age: Some(10),
                },
                Challenge {
                    challenge: challenge2,
                    token_key: None,
                    max_age: None,
                }
            ]
        );
    }

    #[test]
    fn parser_rejects_malformed_headers() {
        let challenge = TokenChallenge::new(2u16, "issuer", None, "origin")
            .to_base64()
            .unwrap();

        for value in [
            format!("Basic challenge=\"{challenge}\""),
            format!("PrivateToken challenge=\"{challenge}"),
            format!("PrivateToken token-key=\"{challenge}\""),
            format!("PrivateToken challenge=\"{challenge}\", max-age=ten"),
            "PrivateToken challenge=\"AAAA\"".to_string(),
        ] {
            let header_value = HeaderValue::from_str(&value).unwrap();
            assert!(parse_www_authenticate_header(&header_value).is_err(), "{value}");
        }
    }
}
