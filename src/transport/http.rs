// HTTP transport for the chat backend (JSON over reqwest)

use async_trait::async_trait;
use log::{debug, error};
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::{ChatTransport, TransportError};
use crate::config::ChatConfig;
use crate::models::{MessageRecord, OutgoingMessage, User};

pub struct HttpTransport {
    client: reqwest::Client,
    api_url: Url,
}

impl HttpTransport {
    pub fn new(config: &ChatConfig) -> Result<Self, TransportError> {
        let api_url = Url::parse(&config.api_url).map_err(|e| {
            TransportError::Config(format!("Invalid API URL {}: {}", config.api_url, e))
        })?;
        if api_url.cannot_be_a_base() {
            return Err(TransportError::Config(format!(
                "API URL cannot carry a path: {}",
                config.api_url
            )));
        }

        let mut headers = HeaderMap::new();
        if let Some(token) = &config.auth_token {
            let cookie = HeaderValue::from_str(&format!("jwt={}", token))
                .map_err(|e| TransportError::Config(format!("Invalid auth token: {}", e)))?;
            headers.insert(COOKIE, cookie);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| TransportError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(HttpTransport { client, api_url })
    }

    /// Append `segments` to the API base, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                TransportError::Config(format!("API URL cannot carry a path: {}", self.api_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, TransportError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message_from_body(&body).unwrap_or_else(|| {
                status.canonical_reason().unwrap_or("Request failed").to_string()
            });
            error!("Request failed with {}: {}", status, message);
            return Err(TransportError::Status {
                status: status.as_u16(),
                message,
            });
        }
        response.json::<T>().await.map_err(TransportError::from)
    }
}

/// Pull `message` out of an error body like `{"message": "..."}`.
pub(crate) fn error_message_from_body(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    json.get("message")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            TransportError::Decode(e.to_string())
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn fetch_users(&self) -> Result<Vec<User>, TransportError> {
        debug!("GET messages/users");
        let url = self.endpoint(&["messages", "users"])?;
        let response = self.client.get(url).send().await?;
        Self::decode(response).await
    }

    async fn fetch_messages(&self, peer_id: &str) -> Result<Vec<MessageRecord>, TransportError> {
        debug!("GET messages/{}", peer_id);
        let url = self.endpoint(&["messages", peer_id])?;
        let response = self.client.get(url).send().await?;
        Self::decode(response).await
    }

    async fn send_message(
        &self,
        peer_id: &str,
        outgoing: &OutgoingMessage,
    ) -> Result<MessageRecord, TransportError> {
        debug!("POST messages/send/{} (tempId {})", peer_id, outgoing.temp_id);
        let url = self.endpoint(&["messages", "send", peer_id])?;
        let response = self.client.post(url).json(outgoing).send().await?;
        Self::decode(response).await
    }
}
