//! Capability seam for the vendor chat service.
//!
//! The coordinator treats the chat backend as a black box behind these
//! object-safe traits: connect with a token, look up or create one channel,
//! join it, send text, and receive pushed [`ChatEvent`]s. Real backends and
//! the in-memory test service implement the same seam.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{ChannelDescriptor, JoinStatus, ServiceError};

/// Event pushed by the service on its own tasks.
///
/// The consumer is responsible for marshalling these onto its own delivery
/// context before touching shared state.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// The client finished synchronizing with server-side state and is
    /// ready for channel operations.
    SynchronizationCompleted,
    /// A message arrived on a joined channel.
    MessageAdded {
        /// Identity of the sender.
        author: String,
        /// Message text.
        body: String,
    },
    /// The session token is about to expire and should be refreshed.
    TokenExpiring,
}

/// Entry point for a chat backend.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Initialize a client with a bearer token.
    ///
    /// Pushed events are delivered on `events` until the client is shut
    /// down or the receiver is dropped.
    ///
    /// # Errors
    /// Returns [`ServiceError::AuthFailure`] if the token is rejected.
    async fn connect(
        &self,
        token: &str,
        events: mpsc::Sender<ChatEvent>,
    ) -> Result<Arc<dyn ChatClient>, ServiceError>;
}

/// A connected chat client.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Look up a channel by its unique name.
    ///
    /// # Errors
    /// Returns an error only on transport failure; an absent channel is
    /// `Ok(None)`.
    async fn channel_by_unique_name(
        &self,
        name: &str,
    ) -> Result<Option<Arc<dyn ChannelHandle>>, ServiceError>;

    /// Create a channel from a descriptor.
    ///
    /// # Errors
    /// Returns [`ServiceError::ChannelCreate`] on rejection.
    async fn create_channel(
        &self,
        descriptor: &ChannelDescriptor,
    ) -> Result<Arc<dyn ChannelHandle>, ServiceError>;

    /// Replace the session token after a refresh.
    ///
    /// # Errors
    /// Returns [`ServiceError::AuthFailure`] if the new token is rejected.
    async fn update_token(&self, token: &str) -> Result<(), ServiceError>;

    /// Detach from the service. Idempotent; no events are delivered after
    /// this returns.
    async fn shutdown(&self);
}

/// A channel obtained from a [`ChatClient`].
#[async_trait]
pub trait ChannelHandle: Send + Sync {
    /// Stable lookup key.
    fn unique_name(&self) -> String;

    /// Human-readable display name.
    fn friendly_name(&self) -> String;

    /// Current membership status.
    fn join_status(&self) -> JoinStatus;

    /// Establish membership. Joining an already-joined channel must
    /// succeed without side effects.
    ///
    /// # Errors
    /// Returns [`ServiceError::Join`] on rejection.
    async fn join(&self) -> Result<(), ServiceError>;

    /// Send a message body to the channel.
    ///
    /// # Errors
    /// Returns [`ServiceError::Send`] on failure.
    async fn send(&self, body: &str) -> Result<(), ServiceError>;
}
