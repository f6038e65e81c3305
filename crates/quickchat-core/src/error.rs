//! Vendor-side error type.

use thiserror::Error;

/// Failure reported by the chat service or one of its handles.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("token rejected by the chat service")]
    AuthFailure,
    #[error("channel lookup failed: {0}")]
    ChannelLookup(String),
    #[error("channel creation failed: {0}")]
    ChannelCreate(String),
    #[error("channel join failed: {0}")]
    Join(String),
    #[error("message send failed: {0}")]
    Send(String),
    #[error("transport error: {0}")]
    Transport(String),
}
