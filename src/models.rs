use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A chat-eligible peer as returned by the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub profile_pic: String,
}

impl User {
    pub fn new(id: &str, full_name: &str) -> Self {
        User {
            id: id.to_string(),
            full_name: full_name.to_string(),
            email: String::new(),
            profile_pic: String::new(),
        }
    }
}

/// Locally allocated identifier carried by a message until the server confirms it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TempId(pub String);

impl TempId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TempId {
    fn from(s: &str) -> Self {
        TempId(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageId {
    /// Not yet acknowledged by the server
    Provisional(TempId),
    /// Server-assigned id, plus the temporary id it replaced (if it was sent from here)
    Confirmed { id: String, temp_id: Option<TempId> },
}

impl MessageId {
    /// The id the message is currently known by
    pub fn key(&self) -> &str {
        match self {
            MessageId::Provisional(temp_id) => temp_id.as_str(),
            MessageId::Confirmed { id, .. } => id,
        }
    }

    pub fn temp_id(&self) -> Option<&TempId> {
        match self {
            MessageId::Provisional(temp_id) => Some(temp_id),
            MessageId::Confirmed { temp_id, .. } => temp_id.as_ref(),
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, MessageId::Confirmed { .. })
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DeliveryStatus {
    Sending, // Provisional, request outstanding
    Sent,    // Confirmed by the server
    Failed,  // Request failed; eligible for retry
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub text: Option<String>,
    pub attachment: Option<String>,
    pub sender_id: String,
    pub receiver_id: String,
    pub status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Build the optimistic copy shown before the server has seen the message.
    pub fn provisional(
        temp_id: TempId,
        draft: &MessageDraft,
        sender_id: &str,
        receiver_id: &str,
    ) -> Self {
        Message {
            id: MessageId::Provisional(temp_id),
            text: draft.text.clone(),
            attachment: draft.image.clone(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            status: DeliveryStatus::Sending,
            created_at: Utc::now(),
        }
    }

    pub fn is_unsent(&self) -> bool {
        matches!(self.status, DeliveryStatus::Sending | DeliveryStatus::Failed)
    }
}

/// Message record as it travels over the wire, both in responses and push events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_id: Option<TempId>,
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        Message {
            id: MessageId::Confirmed {
                id: record.id,
                temp_id: record.temp_id,
            },
            text: record.text,
            attachment: record.image,
            sender_id: record.sender_id,
            receiver_id: record.receiver_id,
            status: DeliveryStatus::Sent,
            created_at: record.created_at,
        }
    }
}

/// Content typed into the composer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageDraft {
    pub text: Option<String>,
    pub image: Option<String>,
}

impl MessageDraft {
    pub fn text(text: &str) -> Self {
        MessageDraft {
            text: Some(text.to_string()),
            image: None,
        }
    }

    pub fn with_image(mut self, image: &str) -> Self {
        self.image = Some(image.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        let no_text = self.text.as_deref().map_or(true, |t| t.trim().is_empty());
        no_text && self.image.is_none()
    }
}

/// Request body for `POST /messages/send/{peer}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub text: Option<String>,
    pub image: Option<String>,
    pub temp_id: TempId,
}

impl OutgoingMessage {
    pub fn from_message(message: &Message, temp_id: TempId) -> Self {
        OutgoingMessage {
            text: message.text.clone(),
            image: message.attachment.clone(),
            temp_id,
        }
    }
}
