use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::types::{RecordId, SurrealValue};

/// Sender id carried by synthetic verification messages. Never a real
/// participant.
pub const AI_SENDER_ID: &str = "ai-system";

/// One chat entry. Append-only, ordered by created_at ascending within
/// a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    #[serde(skip_serializing)]
    pub id: Option<RecordId>,
    pub conversation: RecordId,
    pub sender_id: String,
    pub message: String,
    pub message_type: MessageType,
    pub ai_analysis: Option<AiAnalysis>,
    pub is_ai_flagged: bool,
    pub created_at: DateTime<Utc>,
    /// Joined from the profile table at read time; never stored here.
    #[serde(skip_serializing)]
    pub sender_profile: Option<Profile>,
}

impl ChatMessage {
    /// Whether this entry was produced by the scorer rather than a
    /// human participant.
    pub fn is_verification(&self) -> bool {
        self.sender_id == AI_SENDER_ID && self.message_type == MessageType::Verification
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Image,
    Location,
    Verification,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::Location => "location",
            MessageType::Verification => "verification",
        }
    }

    pub fn parse(s: &str) -> Option<MessageType> {
        match s {
            "text" => Some(MessageType::Text),
            "image" => Some(MessageType::Image),
            "location" => Some(MessageType::Location),
            "verification" => Some(MessageType::Verification),
            _ => None,
        }
    }
}

/// Score attached to a verification message. confidence is always
/// score / 10. Crosses the store boundary directly, so it converts
/// both ways.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, SurrealValue)]
pub struct AiAnalysis {
    pub score: f64,
    pub confidence: f64,
}

/// Display profile joined onto access logs and chat history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, SurrealValue)]
pub struct Profile {
    pub full_name: String,
    pub avatar_url: Option<String>,
}
