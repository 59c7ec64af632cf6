use std::time::Duration;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use findback::audit;
use findback::chat::channel::MessageChannel;
use findback::chat::resolver;
use findback::chat::scorer::VerificationScorer;
use findback::db;
use findback::models::AccessType;

/// Walks one verification chat end to end against a local database:
/// a finder opens a conversation, claims the find, and the scorer's
/// verdict arrives over the live feed. Useful as a smoke run while the
/// real frontend is wired up elsewhere.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    let path = std::env::var("FINDBACK_DB").unwrap_or_else(|_| "findback.db".into());
    let db = db::init(&path).await?;
    info!(%path, "store ready");

    db::upsert_profile(&db, "owner-demo", "Olivia Owner", None).await?;
    db::upsert_profile(&db, "finder-demo", "Frank Finder", None).await?;

    audit::record_access(&db, "item-demo", AccessType::View, Some("finder-demo"), None, None).await?;
    audit::record_access(&db, "item-demo", AccessType::ChatInit, Some("finder-demo"), None, None).await?;

    let conversation = resolver::resolve(&db, "item-demo", "owner-demo", "finder-demo", false)
        .await?
        .expect("finder contact always yields a conversation");

    let channel = MessageChannel::new(db.clone(), VerificationScorer::default());
    let (history, mut feed) = channel.open(&conversation).await?;
    info!(messages = history.len(), "conversation opened");

    channel
        .send(&conversation, "finder-demo", "I found it near the north gate")
        .await?;

    // Text echo plus the delayed verdict
    for _ in 0..2 {
        match tokio::time::timeout(Duration::from_secs(10), feed.next()).await {
            Ok(Some(message)) => {
                info!(sender = %message.sender_id, body = %message.message, "feed");
            }
            _ => break,
        }
    }
    feed.cancel();

    let summary = audit::summarize(&db, "item-demo").await;
    info!(
        views = summary.stats.total_views,
        chats = summary.stats.total_chats,
        unique_users = summary.stats.unique_users,
        "access summary"
    );

    Ok(())
}
