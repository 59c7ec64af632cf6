use std::collections::HashSet;

use surrealdb::types::{Datetime, RecordId, SurrealValue};
use thiserror::Error;
use tracing::warn;

use crate::db::DbHandle;
use crate::models::{AccessEvent, AccessType, Profile};

/// Most recent events considered when summarizing an item's activity.
/// A display window, not an all-time total: items with more history
/// report windowed counts.
pub const ACCESS_LOG_WINDOW: usize = 50;

#[derive(Debug, Error)]
pub enum AccessLogError {
	#[error("database error: {0}")]
	DbError(String),
}

/// Per-item activity counts over the fetched window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessStats {
	pub total_views: u64,
	pub total_contacts: u64,
	pub total_chats: u64,
	pub unique_users: u64,
}

#[derive(Debug, Clone, Default)]
pub struct AccessSummary {
	pub logs: Vec<AccessEvent>,
	pub stats: AccessStats,
}

/// Append one access event for an item. Called by the collaborators
/// that serve item views, contact reveals, and chat openings; this
/// subsystem itself never mutates events after the append.
pub async fn record_access(
	db: &DbHandle,
	item_id: &str,
	access_type: AccessType,
	accessor_id: Option<&str>,
	ip_address: Option<&str>,
	user_agent: Option<&str>,
) -> Result<(), AccessLogError> {
	db.db
		.query(
			"CREATE access_event CONTENT {
				lost_item_id: $item,
				access_type: $type,
				accessor_id: $accessor,
				ip_address: $ip,
				user_agent: $ua,
				created_at: time::now(),
			}",
		)
		.bind(("item", item_id.to_string()))
		.bind(("type", access_type.as_str().to_string()))
		.bind(("accessor", accessor_id.map(|s| s.to_string())))
		.bind(("ip", ip_address.map(|s| s.to_string())))
		.bind(("ua", user_agent.map(|s| s.to_string())))
		.await
		.map_err(|e| AccessLogError::DbError(e.to_string()))?
		.check()
		.map_err(|e| AccessLogError::DbError(e.to_string()))?;

	Ok(())
}

/// Fetch the most recent events for an item (newest first) and reduce
/// them to stats. Pure read; a fetch error logs a warning and yields an
/// empty summary rather than propagating.
pub async fn summarize(db: &DbHandle, item_id: &str) -> AccessSummary {
	match fetch_window(db, item_id).await {
		Ok(logs) => {
			let stats = reduce(&logs);
			AccessSummary { logs, stats }
		}
		Err(e) => {
			warn!(item_id, error = %e, "access log fetch failed; reporting empty summary");
			AccessSummary::default()
		}
	}
}

async fn fetch_window(db: &DbHandle, item_id: &str) -> Result<Vec<AccessEvent>, AccessLogError> {
	let mut response = db
		.db
		.query(
			"SELECT *,
				(SELECT full_name, avatar_url FROM profile
					WHERE user_id = $parent.accessor_id LIMIT 1)[0] AS accessor_profile
			FROM access_event
			WHERE lost_item_id = $item
			ORDER BY created_at DESC
			LIMIT $limit",
		)
		.bind(("item", item_id.to_string()))
		.bind(("limit", ACCESS_LOG_WINDOW as i64))
		.await
		.map_err(|e| AccessLogError::DbError(e.to_string()))?;

	let rows: Vec<EventRow> = response
		.take(0)
		.map_err(|e| AccessLogError::DbError(e.to_string()))?;

	let mut logs = Vec::with_capacity(rows.len());
	for row in rows {
		match map_event(row) {
			Some(event) => logs.push(event),
			None => continue, // already logged by map_event
		}
	}

	Ok(logs)
}

/// Raw access_event row as the store returns it, including the joined
/// accessor profile.
#[derive(Debug, Clone, SurrealValue)]
struct EventRow {
	id: RecordId,
	lost_item_id: String,
	access_type: String,
	accessor_id: Option<String>,
	ip_address: Option<String>,
	user_agent: Option<String>,
	created_at: Datetime,
	accessor_profile: Option<Profile>,
}

fn map_event(row: EventRow) -> Option<AccessEvent> {
	let Some(access_type) = AccessType::parse(&row.access_type) else {
		warn!(access_type = %row.access_type, "skipping access_event row with unrecognized type");
		return None;
	};
	let created_at = row.created_at.into_inner();

	Some(AccessEvent {
		id: Some(row.id),
		lost_item_id: row.lost_item_id,
		access_type,
		accessor_id: row.accessor_id,
		ip_address: row.ip_address,
		user_agent: row.user_agent,
		created_at,
		accessor_profile: row.accessor_profile,
	})
}

/// Exact counts within the window; unique_users over distinct non-null
/// accessor ids.
fn reduce(logs: &[AccessEvent]) -> AccessStats {
	let mut stats = AccessStats::default();
	let mut seen: HashSet<&str> = HashSet::new();

	for log in logs {
		match log.access_type {
			AccessType::View => stats.total_views += 1,
			AccessType::Contact => stats.total_contacts += 1,
			AccessType::ChatInit => stats.total_chats += 1,
		}
		if let Some(accessor) = log.accessor_id.as_deref() {
			seen.insert(accessor);
		}
	}

	stats.unique_users = seen.len() as u64;
	stats
}

/// Coarse device label for a raw user agent string.
pub fn describe_user_agent(user_agent: &str) -> &'static str {
	if user_agent.is_empty() {
		return "Unknown Device";
	}
	if user_agent.contains("Mobile") {
		return "Mobile Device";
	}
	if user_agent.contains("Chrome") {
		return "Chrome Browser";
	}
	if user_agent.contains("Firefox") {
		return "Firefox Browser";
	}
	if user_agent.contains("Safari") {
		return "Safari Browser";
	}
	"Desktop Browser"
}
