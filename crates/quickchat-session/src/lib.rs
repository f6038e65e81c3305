//! Session coordination for a single chat channel.
//!
//! Provides:
//! - `ChatSessionCoordinator` - Login, channel resolution, send, shutdown
//! - `SessionConfig` - Token endpoint and channel configuration
//! - `MemoryChatService` - In-memory chat backend for tests and demos

pub mod config;
pub mod coordinator;
pub mod service;

pub use config::SessionConfig;
pub use coordinator::{ChatSessionCoordinator, Phase, SessionError};
pub use service::memory::MemoryChatService;
