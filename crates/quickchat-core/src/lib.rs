//! Core abstractions for single-channel chat session management.
//!
//! This crate provides the fundamental building blocks:
//! - `MessageStore` - Append-only history with live broadcast
//! - `ChatService` / `ChatClient` / `ChannelHandle` - Vendor SDK seam
//! - `SessionListener` - Notification sink for the view layer

pub mod error;
pub mod listener;
pub mod service;
pub mod store;
pub mod types;

pub use error::ServiceError;
pub use listener::{NullListener, SessionListener};
pub use service::{ChannelHandle, ChatClient, ChatEvent, ChatService};
pub use store::MessageStore;
pub use types::{ChannelDescriptor, ChannelVisibility, Credentials, JoinStatus, Message};
