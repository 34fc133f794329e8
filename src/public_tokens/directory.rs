//! Token issuer directory discovery.

use async_trait::async_trait;
use http::{Response, StatusCode, Uri};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{TokenType, auth::is_padded_base64url};

/// Well-known path of the token issuer directory.
pub const TOKEN_ISSUER_DIRECTORY_PATH: &str = "/.well-known/token-issuer-directory";

/// Base64url prefix shared by all RSA-2048 `id-RSASSA-PSS` SPKI token keys.
pub const PSS_TOKEN_KEY_PREFIX: &str = "MIIBUjA9";

/// Error returned by a [`DirectoryFetcher`].
pub type FetchError = Box<dyn std::error::Error + Send + Sync>;

/// Minimal HTTP client used to retrieve the issuer directory.
#[async_trait]
pub trait DirectoryFetcher: Send + Sync {
    /// Performs a GET request for `uri` and returns the response.
    async fn fetch(&self, uri: &Uri) -> Result<Response<Vec<u8>>, FetchError>;
}

/// Errors that can occur when discovering an issuer's token key.
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Invalid issuer name")]
    /// The issuer name is not a valid URI authority.
    InvalidIssuer,
    #[error("Directory fetch failed: {0}")]
    /// The fetcher returned an error.
    Fetch(String),
    #[error("Directory request returned status {0}")]
    /// The response status is not 2xx.
    Status(StatusCode),
    #[error("Invalid directory document: {0}")]
    /// The body does not follow the directory schema.
    InvalidDocument(#[from] serde_json::Error),
    #[error("No usable token key in directory")]
    /// The directory lists no RSA-PSS key for publicly verifiable tokens.
    NoTokenKey,
}

/// A single entry of the `token-keys` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenKeyEntry {
    /// Token type the key is used for
    #[serde(rename = "token-type")]
    pub token_type: u16,
    /// Base64url encoded token key
    #[serde(rename = "token-key")]
    pub token_key: String,
    /// Key version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    /// Unix timestamp before which the key is not in use
    #[serde(rename = "not-before", default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<u64>,
}

/// Token issuer directory document.
///
/// ```text
/// {
///   "issuer-request-uri": "https://issuer.example.net/token-request",
///   "token-keys": [ { "token-type": 2, "token-key": "MIIBUjA9..." } ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenIssuerDirectory {
    /// Token keys published by the issuer
    #[serde(rename = "token-keys")]
    pub token_keys: Vec<TokenKeyEntry>,
    /// Issuance endpoint
    #[serde(
        rename = "issuer-request-uri",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub issuer_request_uri: Option<String>,
    /// Endpoint of the issuer's request encapsulation key
    #[serde(
        rename = "issuer-request-key-uri",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub issuer_request_key_uri: Option<String>,
}

impl TokenIssuerDirectory {
    /// Decodes a directory document.
    ///
    /// # Errors
    /// Returns an error if the document does not follow the schema.
    pub fn from_slice(body: &[u8]) -> Result<Self, DirectoryError> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Returns the first key usable for publicly verifiable tokens.
    ///
    /// Entries of other token types are skipped, as are keys whose text is
    /// not a padded base64url RSA-PSS SPKI.
    #[must_use]
    pub fn public_token_key(&self) -> Option<&TokenKeyEntry> {
        self.token_keys.iter().find(|entry| {
            entry.token_type == u16::from(TokenType::Public)
                && is_pss_token_key_text(&entry.token_key)
        })
    }
}

fn is_pss_token_key_text(token_key: &str) -> bool {
    token_key.len() > PSS_TOKEN_KEY_PREFIX.len()
        && token_key.starts_with(PSS_TOKEN_KEY_PREFIX)
        && is_padded_base64url(token_key)
}

/// Returns `https://<issuer>/.well-known/token-issuer-directory`.
///
/// # Errors
/// Returns an error if `issuer` is not a valid authority.
pub fn directory_uri(issuer: &str) -> Result<Uri, DirectoryError> {
    Uri::builder()
        .scheme("https")
        .authority(issuer)
        .path_and_query(TOKEN_ISSUER_DIRECTORY_PATH)
        .build()
        .map_err(|_| DirectoryError::InvalidIssuer)
}

/// Fetches the issuer directory and returns the text of its publicly
/// verifiable token key.
///
/// # Errors
/// Returns an error if the directory cannot be fetched or decoded, or lists
/// no usable key.
pub async fn fetch_token_key<F: DirectoryFetcher>(
    fetcher: &F,
    issuer: &str,
) -> Result<String, DirectoryError> {
    let uri = directory_uri(issuer)?;
    let response = fetcher
        .fetch(&uri)
        .await
        .map_err(|e| DirectoryError::Fetch(e.to_string()))?;
    if !response.status().is_success() {
        return Err(DirectoryError::Status(response.status()));
    }
    let directory = TokenIssuerDirectory::from_slice(response.body())?;
    directory
        .public_token_key()
        .map(|entry| entry.token_key.clone())
        .ok_or(DirectoryError::NoTokenKey)
}
