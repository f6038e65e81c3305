//! Single-GET token client.

use quickchat_core::Credentials;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use thiserror::Error;

use crate::TokenUrl;

/// Token retrieval error.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token endpoint URL: {0}")]
    InvalidUrl(String),
    #[error("token request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("token endpoint returned {0}")]
    Status(StatusCode),
    #[error("token endpoint returned a malformed response")]
    MalformedResponse,
}

/// Raw token endpoint response.
///
/// `identity` is optional: servers keyed by device ID assign one, servers
/// keyed by identity usually echo the caller's choice or omit it.
#[derive(Debug, Clone)]
pub struct TokenResponse {
    pub token: String,
    pub identity: Option<String>,
}

/// Client for the token endpoint. One GET per fetch, no retry; transport
/// timeouts are the `reqwest` defaults.
#[derive(Debug, Clone)]
pub struct TokenFetcher {
    client: Client,
    url: TokenUrl,
}

impl TokenFetcher {
    /// Create a fetcher for the configured endpoint.
    #[must_use]
    pub fn new(url: TokenUrl) -> Self {
        Self::with_client(Client::new(), url)
    }

    /// Create a fetcher reusing an existing HTTP client.
    #[must_use]
    pub fn with_client(client: Client, url: TokenUrl) -> Self {
        Self { client, url }
    }

    /// Fetch credentials for a caller-chosen identity.
    ///
    /// If the server omits `identity` in its response, the requested
    /// identity is used.
    ///
    /// # Errors
    /// See [`TokenError`].
    pub async fn fetch_for_identity(&self, identity: &str) -> Result<Credentials, TokenError> {
        let response = self.fetch(self.url.for_identity(identity)).await?;
        Ok(Credentials {
            token: response.token,
            identity: response.identity.unwrap_or_else(|| identity.to_owned()),
        })
    }

    /// Fetch credentials keyed by device ID; the server assigns the identity.
    ///
    /// # Errors
    /// [`TokenError::MalformedResponse`] if the server omits `identity`.
    pub async fn fetch_for_device(&self, device_id: &str) -> Result<Credentials, TokenError> {
        let response = self.fetch(self.url.for_device(device_id)).await?;
        let identity = response.identity.ok_or(TokenError::MalformedResponse)?;
        Ok(Credentials {
            token: response.token,
            identity,
        })
    }

    /// Issue a single GET against a fully-formed request URL.
    ///
    /// # Errors
    /// [`TokenError::Network`] on transport failure, [`TokenError::Status`]
    /// on a non-success status, [`TokenError::MalformedResponse`] when the
    /// body is not a JSON object with a string `token` field.
    pub async fn fetch(&self, url: Url) -> Result<TokenResponse, TokenError> {
        tracing::debug!(%url, "fetching access token");
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TokenError::Status(status));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|_| TokenError::MalformedResponse)?;
        let object = body.as_object().ok_or(TokenError::MalformedResponse)?;

        let token = object
            .get("token")
            .and_then(Value::as_str)
            .ok_or(TokenError::MalformedResponse)?
            .to_owned();
        let identity = object
            .get("identity")
            .and_then(Value::as_str)
            .map(str::to_owned);

        Ok(TokenResponse { token, identity })
    }
}
