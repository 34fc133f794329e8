//! Directory fetcher for testing purposes.
use async_trait::async_trait;
use http::{Response, StatusCode, Uri};
use std::sync::Mutex;

use crate::public_tokens::directory::{DirectoryFetcher, FetchError};

/// Fetcher that answers every request with the same response.
#[derive(Debug)]
pub struct StaticDirectoryFetcher {
    response: Option<(StatusCode, Vec<u8>)>,
    requests: Mutex<Vec<Uri>>,
}

impl StaticDirectoryFetcher {
    /// Answers with `status` and `body`.
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            response: Some((status, body.into())),
            requests: Mutex::default(),
        }
    }

    /// Answers with a `200 OK` directory listing the given
    /// `(token-type, token-key)` pairs.
    pub fn with_token_keys<'a>(keys: impl IntoIterator<Item = (u16, &'a str)>) -> Self {
        let token_keys = keys
            .into_iter()
            .map(|(token_type, token_key)| {
                serde_json::json!({ "token-type": token_type, "token-key": token_key })
            })
            .collect::<Vec<_>>();
        let body = serde_json::json!({ "token-keys": token_keys }).to_string();
        Self::new(StatusCode::OK, body)
    }

    /// Fails every request.
    pub fn failing() -> Self {
        Self {
            response: None,
            requests: Mutex::default(),
        }
    }

    /// Returns the URIs requested so far.
    pub fn requests(&self) -> Vec<Uri> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DirectoryFetcher for StaticDirectoryFetcher {
    async fn fetch(&self, uri: &Uri) -> Result<Response<Vec<u8>>, FetchError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(uri.clone());
        }
        let (status, body) = self.response.clone().ok_or("connection refused")?;
        Ok(Response::builder().status(status).body(body)?)
    }
}
