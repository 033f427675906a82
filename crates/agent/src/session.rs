//! Per-session serialization and checkpoint access.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, warn};

use rise_core::domain::conversation::{Conversation, SessionId};
use rise_core::domain::role::StaffRole;
use rise_db::repositories::CheckpointRepository;

use crate::error::AgentError;

pub const INTERRUPTED_TOOL_RESULT: &str = "Tool call interrupted before completion.";

/// Held for the duration of one turn; a second turn on the same session waits.
pub struct SessionGuard {
    _guard: OwnedMutexGuard<()>,
}

pub struct SessionManager {
    checkpoints: Arc<dyn CheckpointRepository>,
    locks: Mutex<HashMap<SessionId, Arc<AsyncMutex<()>>>>,
}

impl SessionManager {
    pub fn new(checkpoints: Arc<dyn CheckpointRepository>) -> Self {
        Self { checkpoints, locks: Mutex::new(HashMap::new()) }
    }

    pub async fn lock(&self, session_id: &SessionId) -> SessionGuard {
        let lock = {
            let mut locks = match self.locks.lock() {
                Ok(locks) => locks,
                Err(poisoned) => poisoned.into_inner(),
            };
            // Entries nobody else holds can go; the map would otherwise grow per session.
            locks.retain(|id, lock| id == session_id || Arc::strong_count(lock) > 1);
            locks.entry(session_id.clone()).or_default().clone()
        };
        SessionGuard { _guard: lock.lock_owned().await }
    }

    /// Loads the session's transcript or starts a new one bound to `role`.
    pub async fn load_or_create(
        &self,
        session_id: &SessionId,
        role: StaffRole,
    ) -> Result<Conversation, AgentError> {
        let Some(mut conversation) = self.checkpoints.load(session_id).await? else {
            debug!(event_name = "agent.session.created", session_id = %session_id, role = %role);
            return Ok(Conversation::new(session_id.clone(), role));
        };

        if conversation.role != role {
            return Err(AgentError::SessionRoleMismatch {
                session_id: session_id.to_string(),
                bound: conversation.role,
                requested: role,
            });
        }

        let settled = conversation.settle_interrupted_calls(INTERRUPTED_TOOL_RESULT);
        if settled > 0 {
            warn!(
                event_name = "agent.session.settled",
                session_id = %session_id,
                settled_calls = settled,
                "checkpoint held unanswered tool calls from an interrupted turn"
            );
        }
        Ok(conversation)
    }

    pub async fn save(&self, conversation: &Conversation) -> Result<(), AgentError> {
        self.checkpoints.save(conversation).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use rise_core::domain::conversation::{ChatMessage, Conversation, SessionId, ToolCall};
    use rise_core::domain::role::StaffRole;
    use rise_db::repositories::{CheckpointRepository, InMemoryCheckpointRepository};
    use serde_json::json;

    use super::{SessionManager, INTERRUPTED_TOOL_RESULT};
    use crate::error::AgentError;

    fn session(id: &str) -> SessionId {
        SessionId(id.to_string())
    }

    #[tokio::test]
    async fn new_session_binds_requested_role() {
        let manager = SessionManager::new(Arc::new(InMemoryCheckpointRepository::default()));
        let conversation =
            manager.load_or_create(&session("fresh"), StaffRole::Admin).await.expect("create");
        assert_eq!(conversation.role, StaffRole::Admin);
        assert!(conversation.is_empty());
    }

    #[tokio::test]
    async fn role_switch_on_existing_session_is_refused() {
        let store = Arc::new(InMemoryCheckpointRepository::default());
        let mut conversation = Conversation::new(session("bound"), StaffRole::User);
        conversation.push_user("hello").expect("user");
        store.save(&conversation).await.expect("save");
        let manager = SessionManager::new(store);

        let error = manager
            .load_or_create(&session("bound"), StaffRole::SuperAdmin)
            .await
            .expect_err("mismatch");

        assert!(matches!(
            error,
            AgentError::SessionRoleMismatch {
                bound: StaffRole::User,
                requested: StaffRole::SuperAdmin,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn interrupted_calls_are_settled_on_load() {
        let store = Arc::new(InMemoryCheckpointRepository::default());
        let mut conversation = Conversation::new(session("crashed"), StaffRole::Admin);
        conversation.push_user("add a dumper").expect("user");
        conversation
            .push_assistant(
                None,
                vec![ToolCall {
                    id: "call-9".to_string(),
                    name: "add_new_equipment".to_string(),
                    arguments: json!({}),
                }],
            )
            .expect("assistant");
        store.save(&conversation).await.expect("save");
        let manager = SessionManager::new(store);

        let loaded =
            manager.load_or_create(&session("crashed"), StaffRole::Admin).await.expect("load");

        assert!(loaded.is_settled());
        assert_eq!(loaded.len(), 3);
        assert!(matches!(
            loaded.messages().last(),
            Some(ChatMessage::Tool { call_id, content, .. })
                if call_id == "call-9" && content == INTERRUPTED_TOOL_RESULT
        ));
    }

    #[tokio::test]
    async fn same_session_turns_are_serialized() {
        let manager = Arc::new(SessionManager::new(Arc::new(
            InMemoryCheckpointRepository::default(),
        )));
        let first = manager.lock(&session("busy")).await;

        let contender = {
            let manager = manager.clone();
            tokio::spawn(async move {
                let _guard = manager.lock(&session("busy")).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        let other = tokio::time::timeout(Duration::from_millis(200), manager.lock(&session("idle")))
            .await;
        assert!(other.is_ok(), "different sessions must not wait on each other");

        drop(first);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender acquires after release")
            .expect("join");
    }
}
