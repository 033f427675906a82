use chrono::{SecondsFormat, Utc};

use rise_core::domain::conversation::{Conversation, SessionId};

use super::{CheckpointRepository, RepositoryError};
use crate::DbPool;

/// Stores each conversation as one JSON document keyed by session id.
pub struct SqlCheckpointRepository {
    pool: DbPool,
}

impl SqlCheckpointRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CheckpointRepository for SqlCheckpointRepository {
    async fn load(&self, session_id: &SessionId) -> Result<Option<Conversation>, RepositoryError> {
        let state: Option<String> = sqlx::query_scalar(
            "SELECT state_json FROM conversation_checkpoint WHERE session_id = ?",
        )
        .bind(session_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        state
            .map(|json| {
                serde_json::from_str::<Conversation>(&json)
                    .map_err(|error| RepositoryError::Decode(error.to_string()))
            })
            .transpose()
    }

    async fn save(&self, conversation: &Conversation) -> Result<(), RepositoryError> {
        let state_json = serde_json::to_string(conversation)
            .map_err(|error| RepositoryError::InvalidValue(error.to_string()))?;

        sqlx::query(
            "INSERT INTO conversation_checkpoint (session_id, role, state_json, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(session_id) DO UPDATE SET
                 state_json = excluded.state_json,
                 updated_at = excluded.updated_at",
        )
        .bind(conversation.session_id.as_str())
        .bind(conversation.role.as_str())
        .bind(state_json)
        .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rise_core::domain::conversation::{Conversation, SessionId};
    use rise_core::domain::role::StaffRole;

    use super::SqlCheckpointRepository;
    use crate::repositories::CheckpointRepository;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn save_and_load_round_trip_with_upsert() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let repo = SqlCheckpointRepository::new(pool);
        let session = SessionId("s-1".to_string());

        assert!(repo.load(&session).await.expect("load").is_none());

        let mut conversation = Conversation::new(session.clone(), StaffRole::User);
        conversation.push_user("what can I hire?").expect("user");
        repo.save(&conversation).await.expect("save");

        conversation.push_assistant(Some("Scaffolds and mixers.".to_string()), vec![]).expect("a");
        repo.save(&conversation).await.expect("save again");

        let loaded = repo.load(&session).await.expect("load").expect("exists");
        assert_eq!(loaded, conversation);
        assert_eq!(loaded.len(), 2);
    }
}
