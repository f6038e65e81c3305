//! Access token retrieval for chat sessions.
//!
//! A chat session starts by fetching a short-lived bearer token from an
//! app-controlled HTTP endpoint: one GET returning a JSON object with a
//! `token` field and, depending on the server, an `identity` field.
//!
//! - `TokenUrl` - Configured endpoint plus query-parameter variants
//! - `TokenFetcher` - The single-GET client

pub mod fetch;
pub mod url;

pub use fetch::{TokenError, TokenFetcher, TokenResponse};
pub use url::TokenUrl;
