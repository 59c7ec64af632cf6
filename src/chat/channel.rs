use std::sync::Arc;

use surrealdb::types::{Datetime, RecordId, SurrealValue};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::warn;

use crate::chat::scorer::VerificationScorer;
use crate::db::DbHandle;
use crate::models::{AiAnalysis, ChatMessage, MessageType, Profile};

/// Buffered live-feed slots per process. A subscriber that falls this
/// far behind skips ahead; delivery is at-least-once and consumers
/// dedupe by message id.
const FEED_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum ChannelError {
	#[error("message history load failed: {0}")]
	History(String),
}

#[derive(Debug, Error)]
pub enum SendError {
	#[error("message text is empty")]
	EmptyMessage,

	#[error("message insert failed: {0}")]
	Store(String),
}

/// Orders, persists, and streams the messages of verification chats.
///
/// One channel exists per process and is cloned into each conversation
/// view; all clones share the same store handle and notification bus,
/// so every viewer of a conversation observes inserts in the same
/// order.
#[derive(Clone)]
pub struct MessageChannel {
	publisher: MessagePublisher,
	scorer: Arc<VerificationScorer>,
}

impl MessageChannel {
	pub fn new(db: DbHandle, scorer: VerificationScorer) -> Self {
		let (bus, _) = broadcast::channel(FEED_CAPACITY);
		MessageChannel {
			publisher: MessagePublisher {
				db,
				bus,
				append_lock: Arc::new(Mutex::new(())),
			},
			scorer: Arc::new(scorer),
		}
	}

	/// Load the full history of a conversation (ascending by
	/// created_at) and open a live feed scoped to it.
	///
	/// The feed is subscribed before the history read, so a message
	/// inserted in between shows up in both; callers keep rendering
	/// idempotent by message id.
	pub async fn open(
		&self,
		conversation_id: &RecordId,
	) -> Result<(Vec<ChatMessage>, MessageFeed), ChannelError> {
		let feed = MessageFeed {
			conversation_id: conversation_id.clone(),
			rx: self.publisher.bus.subscribe(),
		};

		let history = self.load_history(conversation_id).await?;

		Ok((history, feed))
	}

	/// Persist a text message from a human sender. The sender's own
	/// copy arrives back through the live feed; nothing is echoed
	/// locally, so visible latency is the feed's, not this call's.
	pub async fn send(
		&self,
		conversation_id: &RecordId,
		sender_id: &str,
		text: &str,
	) -> Result<(), SendError> {
		let text = text.trim();
		if text.is_empty() {
			return Err(SendError::EmptyMessage);
		}

		self.publisher
			.append(conversation_id, sender_id, text, MessageType::Text, None, false)
			.await?;

		if VerificationScorer::is_trigger(text) {
			self.scorer.spawn_scoring(
				self.publisher.clone(),
				conversation_id.clone(),
				text.to_string(),
			);
		}

		Ok(())
	}

	/// Persist a shared position as a location message ("lat,lng"
	/// body). Location shares never trigger scoring.
	pub async fn send_location(
		&self,
		conversation_id: &RecordId,
		sender_id: &str,
		latitude: f64,
		longitude: f64,
	) -> Result<(), SendError> {
		let body = format!("{latitude},{longitude}");
		self.publisher
			.append(conversation_id, sender_id, &body, MessageType::Location, None, false)
			.await?;
		Ok(())
	}

	async fn load_history(
		&self,
		conversation_id: &RecordId,
	) -> Result<Vec<ChatMessage>, ChannelError> {
		let mut response = self
			.publisher
			.db
			.db
			.query(
				"SELECT *,
					(SELECT full_name, avatar_url FROM profile
						WHERE user_id = $parent.sender_id LIMIT 1)[0] AS sender_profile
				FROM chat_message
				WHERE conversation = $conversation
				ORDER BY created_at ASC",
			)
			.bind(("conversation", conversation_id.clone()))
			.await
			.map_err(|e| ChannelError::History(e.to_string()))?;

		let rows: Vec<HistoryRow> = response
			.take(0)
			.map_err(|e| ChannelError::History(e.to_string()))?;

		let mut history = Vec::with_capacity(rows.len());
		for row in rows {
			let (row, sender_profile) = row.split();
			match map_message(row, sender_profile) {
				Some(message) => history.push(message),
				None => continue, // already logged by map_message
			}
		}

		Ok(history)
	}
}

/// Live subscription to one conversation. Dropping it (or calling
/// cancel) releases the subscription; feeds must not outlive their
/// conversation view.
pub struct MessageFeed {
	conversation_id: RecordId,
	rx: broadcast::Receiver<ChatMessage>,
}

impl MessageFeed {
	/// Next message for this conversation, in insertion order. Returns
	/// None once the owning channel is gone.
	pub async fn next(&mut self) -> Option<ChatMessage> {
		loop {
			match self.rx.recv().await {
				Ok(message) if message.conversation == self.conversation_id => {
					return Some(message);
				}
				Ok(_) => continue, // different conversation
				Err(broadcast::error::RecvError::Lagged(missed)) => {
					warn!(missed, "live feed lagged; continuing from current position");
					continue;
				}
				Err(broadcast::error::RecvError::Closed) => return None,
			}
		}
	}

	pub fn cancel(self) {}
}

/// Store handle plus notification bus, shared by human sends and the
/// scorer's synthetic appends. The append lock holds insert and
/// publish together, so bus order always equals persisted insertion
/// order even under concurrent sends.
#[derive(Clone)]
pub(crate) struct MessagePublisher {
	db: DbHandle,
	bus: broadcast::Sender<ChatMessage>,
	append_lock: Arc<Mutex<()>>,
}

impl MessagePublisher {
	/// Insert one chat message and publish it on the notification bus.
	pub(crate) async fn append(
		&self,
		conversation_id: &RecordId,
		sender_id: &str,
		message: &str,
		message_type: MessageType,
		ai_analysis: Option<AiAnalysis>,
		is_ai_flagged: bool,
	) -> Result<ChatMessage, SendError> {
		let _ordering = self.append_lock.lock().await;

		let mut response = self
			.db
			.db
			.query(
				"CREATE chat_message CONTENT {
					conversation: $conversation,
					sender_id: $sender,
					message: $message,
					message_type: $mtype,
					ai_analysis: $analysis,
					is_ai_flagged: $flagged,
					created_at: time::now(),
				}",
			)
			.bind(("conversation", conversation_id.clone()))
			.bind(("sender", sender_id.to_string()))
			.bind(("message", message.to_string()))
			.bind(("mtype", message_type.as_str().to_string()))
			.bind(("analysis", ai_analysis))
			.bind(("flagged", is_ai_flagged))
			.await
			.map_err(|e| SendError::Store(e.to_string()))?;

		let row: Option<MessageRow> = response
			.take(0)
			.map_err(|e| SendError::Store(e.to_string()))?;

		let row = row.ok_or_else(|| SendError::Store("created row missing".into()))?;
		let message =
			map_message(row, None).ok_or_else(|| SendError::Store("created row malformed".into()))?;

		// No receiver is fine; subscription is optional on the send path
		let _ = self.bus.send(message.clone());

		Ok(message)
	}
}

/// Raw chat_message row as a CREATE returns it.
#[derive(Debug, Clone, SurrealValue)]
struct MessageRow {
	id: RecordId,
	conversation: RecordId,
	sender_id: String,
	message: String,
	message_type: String,
	ai_analysis: Option<AiAnalysis>,
	is_ai_flagged: bool,
	created_at: Datetime,
}

/// History row: same fields plus the joined sender profile.
#[derive(Debug, Clone, SurrealValue)]
struct HistoryRow {
	id: RecordId,
	conversation: RecordId,
	sender_id: String,
	message: String,
	message_type: String,
	ai_analysis: Option<AiAnalysis>,
	is_ai_flagged: bool,
	created_at: Datetime,
	sender_profile: Option<Profile>,
}

impl HistoryRow {
	fn split(self) -> (MessageRow, Option<Profile>) {
		(
			MessageRow {
				id: self.id,
				conversation: self.conversation,
				sender_id: self.sender_id,
				message: self.message,
				message_type: self.message_type,
				ai_analysis: self.ai_analysis,
				is_ai_flagged: self.is_ai_flagged,
				created_at: self.created_at,
			},
			self.sender_profile,
		)
	}
}

fn map_message(row: MessageRow, sender_profile: Option<Profile>) -> Option<ChatMessage> {
	let Some(message_type) = MessageType::parse(&row.message_type) else {
		warn!(message_type = %row.message_type, "skipping chat_message row with unrecognized type");
		return None;
	};
	let created_at = row.created_at.into_inner();

	Some(ChatMessage {
		id: Some(row.id),
		conversation: row.conversation,
		sender_id: row.sender_id,
		message: row.message,
		message_type,
		ai_analysis: row.ai_analysis,
		is_ai_flagged: row.is_ai_flagged,
		created_at,
		sender_profile,
	})
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;
	use crate::chat::resolver;
	use crate::db;

	async fn test_channel(db: &DbHandle) -> (MessageChannel, RecordId) {
		let conversation = resolver::resolve(db, "item-1", "owner-1", "finder-1", false)
			.await
			.unwrap()
			.unwrap();
		let channel = MessageChannel::new(db.clone(), VerificationScorer::default());
		(channel, conversation)
	}

	#[tokio::test]
	async fn empty_text_is_rejected_before_any_insert() {
		let db = db::init_in_memory().await.unwrap();
		let (channel, conversation) = test_channel(&db).await;

		let err = channel.send(&conversation, "finder-1", "   ").await.unwrap_err();
		assert!(matches!(err, SendError::EmptyMessage));

		let (history, feed) = channel.open(&conversation).await.unwrap();
		assert!(history.is_empty());
		feed.cancel();
	}

	#[tokio::test]
	async fn history_preserves_send_order() {
		let db = db::init_in_memory().await.unwrap();
		let (channel, conversation) = test_channel(&db).await;

		for i in 0..5 {
			channel
				.send(&conversation, "finder-1", &format!("message {i}"))
				.await
				.unwrap();
			tokio::time::sleep(Duration::from_millis(2)).await;
		}

		let (history, feed) = channel.open(&conversation).await.unwrap();
		assert_eq!(history.len(), 5);
		for (i, message) in history.iter().enumerate() {
			assert_eq!(message.message, format!("message {i}"));
		}
		for pair in history.windows(2) {
			assert!(pair[0].created_at < pair[1].created_at);
		}
		feed.cancel();
	}

	#[tokio::test]
	async fn feed_delivers_in_insertion_order() {
		let db = db::init_in_memory().await.unwrap();
		let (channel, conversation) = test_channel(&db).await;

		let (_, mut feed) = channel.open(&conversation).await.unwrap();

		for i in 0..3 {
			channel
				.send(&conversation, "finder-1", &format!("live {i}"))
				.await
				.unwrap();
		}

		for i in 0..3 {
			let message = feed.next().await.expect("feed still open");
			assert_eq!(message.message, format!("live {i}"));
			assert_eq!(message.sender_id, "finder-1");
		}
	}

	#[tokio::test]
	async fn concurrent_sends_publish_in_insertion_order() {
		let db = db::init_in_memory().await.unwrap();
		let (channel, conversation) = test_channel(&db).await;

		let (_, mut feed) = channel.open(&conversation).await.unwrap();

		let mut handles = Vec::new();
		for i in 0..10 {
			let channel = channel.clone();
			let conversation = conversation.clone();
			handles.push(tokio::spawn(async move {
				channel
					.send(&conversation, "finder-1", &format!("burst {i}"))
					.await
					.unwrap();
			}));
		}
		for handle in handles {
			handle.await.unwrap();
		}

		let mut feed_ids = Vec::new();
		for _ in 0..10 {
			feed_ids.push(feed.next().await.expect("feed still open").id);
		}

		// Every subscriber must see bus order equal to persisted order
		let (history, feed2) = channel.open(&conversation).await.unwrap();
		let history_ids: Vec<_> = history.iter().map(|m| m.id.clone()).collect();
		assert_eq!(feed_ids, history_ids);
		feed2.cancel();
	}

	#[tokio::test]
	async fn canceled_feed_stops_delivery_and_closed_channel_ends_feeds() {
		let db = db::init_in_memory().await.unwrap();
		let (channel, conversation) = test_channel(&db).await;

		let (_, feed_a) = channel.open(&conversation).await.unwrap();
		let (_, mut feed_b) = channel.open(&conversation).await.unwrap();

		// cancel consumes the feed, releasing its bus subscription;
		// later inserts can only reach the surviving feed
		feed_a.cancel();

		channel
			.send(&conversation, "finder-1", "after cancel")
			.await
			.unwrap();
		assert_eq!(feed_b.next().await.expect("feed b open").message, "after cancel");

		// Dropping the last channel clone closes the bus; live feeds end
		drop(channel);
		assert!(feed_b.next().await.is_none());
	}

	#[tokio::test]
	async fn feed_is_scoped_to_its_conversation() {
		let db = db::init_in_memory().await.unwrap();
		let (channel, conversation) = test_channel(&db).await;
		let other = resolver::resolve(&db, "item-2", "owner-1", "finder-2", false)
			.await
			.unwrap()
			.unwrap();

		let (_, mut feed) = channel.open(&conversation).await.unwrap();

		channel.send(&other, "finder-2", "elsewhere").await.unwrap();
		channel.send(&conversation, "finder-1", "here").await.unwrap();

		let message = feed.next().await.expect("feed still open");
		assert_eq!(message.message, "here");
	}

	#[tokio::test]
	async fn location_message_carries_coordinates() {
		let db = db::init_in_memory().await.unwrap();
		let (channel, conversation) = test_channel(&db).await;

		channel
			.send_location(&conversation, "finder-1", -6.2088, 106.8456)
			.await
			.unwrap();

		let (history, feed) = channel.open(&conversation).await.unwrap();
		assert_eq!(history.len(), 1);
		assert_eq!(history[0].message_type, MessageType::Location);
		assert_eq!(history[0].message, "-6.2088,106.8456");
		feed.cancel();
	}

	#[tokio::test]
	async fn sender_profile_is_joined_into_history() {
		let db = db::init_in_memory().await.unwrap();
		db::upsert_profile(&db, "finder-1", "Fia Finder", Some("https://example/avatar.png"))
			.await
			.unwrap();
		let (channel, conversation) = test_channel(&db).await;

		channel.send(&conversation, "finder-1", "hello").await.unwrap();

		let (history, feed) = channel.open(&conversation).await.unwrap();
		let profile = history[0].sender_profile.as_ref().expect("profile joined");
		assert_eq!(profile.full_name, "Fia Finder");
		feed.cancel();
	}
}
