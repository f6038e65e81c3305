//! Token endpoint configuration.

use reqwest::Url;

use crate::fetch::TokenError;

/// Base URL of the token endpoint, configured once at startup.
///
/// The endpoint must be protected in production and actually check whether
/// the caller may be granted access to the chat service.
#[derive(Debug, Clone)]
pub struct TokenUrl {
    base: Url,
}

impl TokenUrl {
    /// Parse a base endpoint URL.
    ///
    /// # Errors
    /// Returns [`TokenError::InvalidUrl`] if the string is not an absolute URL.
    pub fn parse(input: &str) -> Result<Self, TokenError> {
        let base = Url::parse(input).map_err(|e| TokenError::InvalidUrl(e.to_string()))?;
        Ok(Self { base })
    }

    /// Request URL with the caller-chosen identity as a query parameter.
    #[must_use]
    pub fn for_identity(&self, identity: &str) -> Url {
        let mut url = self.base.clone();
        url.query_pairs_mut().append_pair("identity", identity);
        url
    }

    /// Request URL keyed by device ID, for servers that assign the identity.
    #[must_use]
    pub fn for_device(&self, device_id: &str) -> Url {
        let mut url = self.base.clone();
        url.query_pairs_mut().append_pair("device", device_id);
        url
    }
}

impl std::str::FromStr for TokenUrl {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
