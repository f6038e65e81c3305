//! Shared data types for chat sessions.

use serde::{Deserialize, Serialize};

/// A received chat message.
///
/// Immutable once received; the `sequence_index` is assigned by the
/// [`crate::MessageStore`] in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Identity of the sender.
    pub author: String,
    /// Message text.
    pub body: String,
    /// Strictly increasing, gap-free index assigned on arrival.
    pub sequence_index: u64,
}

/// Channel visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelVisibility {
    /// Anyone may discover and join.
    Public,
    /// Invite-only.
    Private,
}

/// Membership status for the tracked channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinStatus {
    /// Not yet a member.
    NotJoined,
    /// Membership established.
    Joined,
}

/// Identity and creation options for the channel a session tracks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    /// Stable lookup key for the channel.
    pub unique_name: String,
    /// Human-readable display name.
    pub friendly_name: String,
    /// Visibility used when the channel has to be created.
    pub visibility: ChannelVisibility,
}

impl ChannelDescriptor {
    /// Describe a public channel.
    #[must_use]
    pub fn public(unique_name: impl Into<String>, friendly_name: impl Into<String>) -> Self {
        Self {
            unique_name: unique_name.into(),
            friendly_name: friendly_name.into(),
            visibility: ChannelVisibility::Public,
        }
    }
}

/// Token endpoint response pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Bearer token for the chat service.
    pub token: String,
    /// Identity the token was minted for.
    pub identity: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_serialization() {
        let json = serde_json::to_string(&ChannelVisibility::Public).unwrap();
        assert_eq!(json, "\"public\"");

        let parsed: ChannelVisibility = serde_json::from_str("\"private\"").unwrap();
        assert_eq!(parsed, ChannelVisibility::Private);
    }

    #[test]
    fn test_public_descriptor() {
        let desc = ChannelDescriptor::public("general", "General Chat Channel");
        assert_eq!(desc.unique_name, "general");
        assert_eq!(desc.visibility, ChannelVisibility::Public);
    }
}
