use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::types::RecordId;

use super::Profile;

/// One recorded instance of a user viewing, contacting, or starting a
/// chat about a reported item. Append-only; rows are never edited.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessEvent {
    #[serde(skip_serializing)]
    pub id: Option<RecordId>,
    pub lost_item_id: String,
    pub access_type: AccessType,
    pub accessor_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Joined from the profile table at read time; never stored here.
    #[serde(skip_serializing)]
    pub accessor_profile: Option<Profile>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    View,
    Contact,
    ChatInit,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::View => "view",
            AccessType::Contact => "contact",
            AccessType::ChatInit => "chat_init",
        }
    }

    pub fn parse(s: &str) -> Option<AccessType> {
        match s {
            "view" => Some(AccessType::View),
            "contact" => Some(AccessType::Contact),
            "chat_init" => Some(AccessType::ChatInit),
            _ => None,
        }
    }
}
