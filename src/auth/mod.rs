//! Authentication scheme: the `TokenChallenge` carried in `WWW-Authenticate`
//! and the `Token` carried in `Authorization`.

pub mod authenticate;
pub mod authorize;

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::char,
    sequence::delimited,
};

/// Base64url engine used for all header payloads.
///
/// Encoding emits padding, decoding accepts both padded and unpadded input.
pub const BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Authentication scheme name shared by both headers.
pub const PRIVATE_TOKEN_SCHEME: &str = "PrivateToken";

pub(crate) fn is_base64url_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Returns `true` if `value` is base64url text with at most two trailing `=`.
pub(crate) fn is_padded_base64url(value: &str) -> bool {
    let data = value.trim_end_matches('=');
    !data.is_empty() && value.len() - data.len() <= 2 && data.chars().all(is_base64url_char)
}

fn base64_value(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| is_base64url_char(c) || c == '=').parse(input)
}

/// A parameter value, either bare or wrapped in a pair of double quotes.
pub(crate) fn param_value(input: &str) -> IResult<&str, &str> {
    alt((delimited(char('"'), base64_value, char('"')), base64_value)).parse(input)
}

pub(crate) fn key_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '-').parse(input)
}

pub(crate) fn opt_spaces(input: &str) -> IResult<&str, &str> {
    take_while(|c: char| c == ' ').parse(input)
}

pub(crate) fn spaces(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c == ' ').parse(input)
}
