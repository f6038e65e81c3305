//! Session configuration.

use quickchat_core::ChannelDescriptor;
use quickchat_token::TokenUrl;

/// Unique name of the default channel every session tracks.
pub const DEFAULT_CHANNEL_UNIQUE_NAME: &str = "general";

/// Friendly name used when the default channel has to be created.
pub const DEFAULT_CHANNEL_FRIENDLY_NAME: &str = "General Chat Channel";

/// Configuration for one coordinator instance, set once at construction.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Token endpoint the session authenticates against.
    pub token_url: TokenUrl,
    /// The single channel this session tracks.
    pub channel: ChannelDescriptor,
}

impl SessionConfig {
    /// Configuration tracking the public "general" channel.
    #[must_use]
    pub fn new(token_url: TokenUrl) -> Self {
        Self {
            token_url,
            channel: ChannelDescriptor::public(
                DEFAULT_CHANNEL_UNIQUE_NAME,
                DEFAULT_CHANNEL_FRIENDLY_NAME,
            ),
        }
    }

    /// Track a different channel.
    #[must_use]
    pub fn with_channel(mut self, channel: ChannelDescriptor) -> Self {
        self.channel = channel;
        self
    }
}
