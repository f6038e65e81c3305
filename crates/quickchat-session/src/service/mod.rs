//! Chat service implementations.

pub mod memory;

pub use memory::MemoryChatService;
