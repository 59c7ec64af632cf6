use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::types::RecordId;

/// The single verification chat channel between an item's reporter and
/// one finder. At most one row exists per
/// (lost_item_id, reporter_id, finder_id) triple.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    #[serde(skip_serializing)]
    pub id: Option<RecordId>,
    pub lost_item_id: String,
    pub reporter_id: String,
    pub finder_id: String,
    pub created_at: DateTime<Utc>,
}
