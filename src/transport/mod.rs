// Request/response transport used by the chat store
// The store only depends on the ChatTransport trait; HttpTransport talks to the real backend

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{MessageRecord, OutgoingMessage, User};

pub mod http;

pub use http::HttpTransport;

/// Errors raised by a transport request
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    /// Server answered with a non-success status
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Request never produced a response
    #[error("Network error: {0}")]
    Network(String),

    /// Response body could not be decoded
    #[error("Invalid response: {0}")]
    Decode(String),

    /// Transport could not be built from the given configuration
    #[error("Invalid transport configuration: {0}")]
    Config(String),
}

impl TransportError {
    /// Text suitable for a user-facing notice; prefers what the server said.
    pub fn user_message(&self) -> String {
        match self {
            TransportError::Status { message, .. } if !message.is_empty() => message.clone(),
            other => other.to_string(),
        }
    }
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// `GET /messages/users`
    async fn fetch_users(&self) -> Result<Vec<User>, TransportError>;

    /// `GET /messages/{peer_id}`
    async fn fetch_messages(&self, peer_id: &str) -> Result<Vec<MessageRecord>, TransportError>;

    /// `POST /messages/send/{peer_id}`; the response echoes `tempId`
    async fn send_message(
        &self,
        peer_id: &str,
        outgoing: &OutgoingMessage,
    ) -> Result<MessageRecord, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_prefers_server_text() {
        let err = TransportError::Status {
            status: 401,
            message: "Unauthorized - No Token Provided".to_string(),
        };
        assert_eq!(err.user_message(), "Unauthorized - No Token Provided");

        let empty = TransportError::Status { status: 500, message: String::new() };
        assert_eq!(empty.user_message(), "Server returned 500: ");

        let net = TransportError::Network("connection refused".to_string());
        assert_eq!(net.user_message(), "Network error: connection refused");
    }
}
