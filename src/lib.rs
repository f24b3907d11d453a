pub mod chat;
pub mod config;
pub mod models;
pub mod session;
pub mod transport;

// Re-export main types for convenience
pub use chat::{ChatError, ChatState, ChatStore, Notice, RetrySummary, Subscription};
pub use models::*;
