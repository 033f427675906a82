use std::collections::HashMap;

use tokio::sync::RwLock;

use rise_core::domain::conversation::{Conversation, SessionId};

use super::{CheckpointRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryCheckpointRepository {
    conversations: RwLock<HashMap<SessionId, Conversation>>,
}

impl InMemoryCheckpointRepository {
    pub async fn session_count(&self) -> usize {
        self.conversations.read().await.len()
    }
}

#[async_trait::async_trait]
impl CheckpointRepository for InMemoryCheckpointRepository {
    async fn load(&self, session_id: &SessionId) -> Result<Option<Conversation>, RepositoryError> {
        let conversations = self.conversations.read().await;
        Ok(conversations.get(session_id).cloned())
    }

    async fn save(&self, conversation: &Conversation) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.write().await;
        conversations.insert(conversation.session_id.clone(), conversation.clone());
        Ok(())
    }
}
