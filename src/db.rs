use std::path::Path;

use surrealdb::engine::local::{Db, Mem, SurrealKv};
use surrealdb::Surreal;

/// Wrapper around the SurrealDB handle.
/// Clone is cheap (Arc internally).
#[derive(Clone)]
pub struct DbHandle {
    pub db: Surreal<Db>,
}

impl PartialEq for DbHandle {
    fn eq(&self, _other: &Self) -> bool {
        true // Single global instance
    }
}

/// Initialize the on-disk database: connect, select ns/db, run migrations.
pub async fn init(path: impl AsRef<Path>) -> Result<DbHandle, Box<dyn std::error::Error>> {
    let db = Surreal::new::<SurrealKv>(path.as_ref().to_path_buf()).await?;
    db.use_ns("findback").use_db("findback").await?;

    run_migrations(&db).await?;

    Ok(DbHandle { db })
}

/// Initialize an in-memory database. Used by tests and throwaway runs.
pub async fn init_in_memory() -> Result<DbHandle, Box<dyn std::error::Error>> {
    let db = Surreal::new::<Mem>(()).await?;
    db.use_ns("findback").use_db("findback").await?;

    run_migrations(&db).await?;

    Ok(DbHandle { db })
}

/// Run schema migrations. DEFINE statements are idempotent.
async fn run_migrations(db: &Surreal<Db>) -> Result<(), Box<dyn std::error::Error>> {
    db.query(SCHEMA_V1).await?.check()?;
    Ok(())
}

/// Create/refresh the display profile for a user id.
///
/// Profiles are owned by the identity provider; this is the sync point
/// where its records land so access logs and chat history can join
/// display names.
pub async fn upsert_profile(
    db: &DbHandle,
    user_id: &str,
    full_name: &str,
    avatar_url: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    db.db
        .query(
            "UPSERT type::record('profile', $user) CONTENT {
                user_id: $user,
                full_name: $name,
                avatar_url: $avatar,
            }",
        )
        .bind(("user", user_id.to_string()))
        .bind(("name", full_name.to_string()))
        .bind(("avatar", avatar_url.map(|s| s.to_string())))
        .await?
        .check()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn on_disk_store_round_trips_profiles() {
        let tmp = tempfile::tempdir().unwrap();
        let db = init(tmp.path().join("findback.db")).await.unwrap();

        upsert_profile(&db, "u1", "User One", None).await.unwrap();
        // Upsert replaces rather than duplicating
        upsert_profile(&db, "u1", "User One Renamed", Some("https://example/a.png"))
            .await
            .unwrap();

        let mut response = db.db.query("SELECT full_name FROM profile").await.unwrap();
        let rows: Vec<serde_json::Value> = response.take(0).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["full_name"], "User One Renamed");
    }
}

const SCHEMA_V1: &str = "
    DEFINE TABLE OVERWRITE profile SCHEMAFULL;
    DEFINE FIELD OVERWRITE user_id ON profile TYPE string;
    DEFINE FIELD OVERWRITE full_name ON profile TYPE string;
    DEFINE FIELD OVERWRITE avatar_url ON profile TYPE option<string>;
    DEFINE INDEX OVERWRITE idx_profile_user ON profile FIELDS user_id UNIQUE;

    DEFINE TABLE OVERWRITE access_event SCHEMAFULL;
    DEFINE FIELD OVERWRITE lost_item_id ON access_event TYPE string;
    DEFINE FIELD OVERWRITE access_type ON access_event TYPE string;
    DEFINE FIELD OVERWRITE accessor_id ON access_event TYPE option<string>;
    DEFINE FIELD OVERWRITE ip_address ON access_event TYPE option<string>;
    DEFINE FIELD OVERWRITE user_agent ON access_event TYPE option<string>;
    DEFINE FIELD OVERWRITE created_at ON access_event TYPE datetime;
    DEFINE INDEX OVERWRITE idx_access_item ON access_event FIELDS lost_item_id;

    DEFINE TABLE OVERWRITE conversation SCHEMAFULL;
    DEFINE FIELD OVERWRITE lost_item_id ON conversation TYPE string;
    DEFINE FIELD OVERWRITE reporter_id ON conversation TYPE string;
    DEFINE FIELD OVERWRITE finder_id ON conversation TYPE string;
    DEFINE FIELD OVERWRITE created_at ON conversation TYPE datetime;
    DEFINE INDEX OVERWRITE idx_conversation_item ON conversation FIELDS lost_item_id;

    DEFINE TABLE OVERWRITE chat_message SCHEMAFULL;
    DEFINE FIELD OVERWRITE conversation ON chat_message TYPE record<conversation>;
    DEFINE FIELD OVERWRITE sender_id ON chat_message TYPE string;
    DEFINE FIELD OVERWRITE message ON chat_message TYPE string;
    DEFINE FIELD OVERWRITE message_type ON chat_message TYPE string;
    DEFINE FIELD OVERWRITE ai_analysis ON chat_message TYPE option<object>;
    DEFINE FIELD OVERWRITE ai_analysis.score ON chat_message TYPE option<float>;
    DEFINE FIELD OVERWRITE ai_analysis.confidence ON chat_message TYPE option<float>;
    DEFINE FIELD OVERWRITE is_ai_flagged ON chat_message TYPE bool DEFAULT false;
    DEFINE FIELD OVERWRITE created_at ON chat_message TYPE datetime;
    DEFINE INDEX OVERWRITE idx_message_conversation ON chat_message FIELDS conversation;
";
