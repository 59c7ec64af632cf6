use surrealdb::types::{RecordId, SurrealValue};
use thiserror::Error;
use tracing::debug;

use crate::db::DbHandle;

/// Raw id projection from a conversation lookup or create.
#[derive(Debug, Clone, SurrealValue)]
struct IdRow {
	id: RecordId,
}

#[derive(Debug, Error)]
pub enum ConversationInitError {
	#[error("conversation lookup failed: {0}")]
	Lookup(String),

	#[error("conversation create failed: {0}")]
	Create(String),
}

/// Find the conversation for (item, caller), or create it on a
/// finder's first contact.
///
/// Owners never originate a conversation; when none exists for them
/// yet, Ok(None) is returned and the caller shows an empty state.
/// Lookup always runs before create so repeated calls converge on the
/// same row instead of inserting blindly.
pub async fn resolve(
	db: &DbHandle,
	item_id: &str,
	owner_id: &str,
	user_id: &str,
	user_is_owner: bool,
) -> Result<Option<RecordId>, ConversationInitError> {
	if let Some(existing) = lookup(db, item_id, user_id, user_is_owner).await? {
		return Ok(Some(existing));
	}

	if user_is_owner {
		return Ok(None);
	}

	let id = create(db, item_id, owner_id, user_id).await?;
	debug!(item_id, finder_id = user_id, "conversation created on first contact");
	Ok(Some(id))
}

/// Look up by the caller's role column: owners appear as reporter,
/// everyone else as finder.
async fn lookup(
	db: &DbHandle,
	item_id: &str,
	user_id: &str,
	user_is_owner: bool,
) -> Result<Option<RecordId>, ConversationInitError> {
	let query = if user_is_owner {
		"SELECT id FROM conversation WHERE lost_item_id = $item AND reporter_id = $user LIMIT 1"
	} else {
		"SELECT id FROM conversation WHERE lost_item_id = $item AND finder_id = $user LIMIT 1"
	};

	let mut response = db
		.db
		.query(query)
		.bind(("item", item_id.to_string()))
		.bind(("user", user_id.to_string()))
		.await
		.map_err(|e| ConversationInitError::Lookup(e.to_string()))?;

	let row: Option<IdRow> = response
		.take(0)
		.map_err(|e| ConversationInitError::Lookup(e.to_string()))?;

	Ok(row.map(|r| r.id))
}

async fn create(
	db: &DbHandle,
	item_id: &str,
	owner_id: &str,
	finder_id: &str,
) -> Result<RecordId, ConversationInitError> {
	let mut response = db
		.db
		.query(
			"CREATE conversation CONTENT {
				lost_item_id: $item,
				reporter_id: $reporter,
				finder_id: $finder,
				created_at: time::now(),
			} RETURN id",
		)
		.bind(("item", item_id.to_string()))
		.bind(("reporter", owner_id.to_string()))
		.bind(("finder", finder_id.to_string()))
		.await
		.map_err(|e| ConversationInitError::Create(e.to_string()))?;

	let row: Option<IdRow> = response
		.take(0)
		.map_err(|e| ConversationInitError::Create(e.to_string()))?;

	row.map(|r| r.id)
		.ok_or_else(|| ConversationInitError::Create("created row missing".into()))
}
