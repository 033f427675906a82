//! Conversation state for one session thread.
//!
//! The transcript is append-only. Every tool call emitted by an assistant message
//! must be answered by exactly one tool message before anything else is appended.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::role::StaffRole;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatMessage {
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        call_id: String,
        name: String,
        content: String,
    },
}

impl ChatMessage {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::User { content } | Self::Tool { content, .. } => Some(content),
            Self::Assistant { content, .. } => content.as_deref(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub session_id: SessionId,
    pub role: StaffRole,
    messages: Vec<ChatMessage>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(session_id: SessionId, role: StaffRole) -> Self {
        Self { session_id, role, messages: Vec::new(), updated_at: Utc::now() }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push_user(&mut self, content: impl Into<String>) -> Result<(), DomainError> {
        self.ensure_settled("user message")?;
        self.append(ChatMessage::User { content: content.into() });
        Ok(())
    }

    pub fn push_assistant(
        &mut self,
        content: Option<String>,
        tool_calls: Vec<ToolCall>,
    ) -> Result<(), DomainError> {
        self.ensure_settled("assistant message")?;
        self.append(ChatMessage::Assistant { content, tool_calls });
        Ok(())
    }

    pub fn push_tool_result(
        &mut self,
        call_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<(), DomainError> {
        let call_id = call_id.into();
        let name = self
            .unanswered_tool_calls()
            .into_iter()
            .find(|call| call.id == call_id)
            .map(|call| call.name.clone())
            .ok_or_else(|| {
                DomainError::InvariantViolation(format!(
                    "tool result for `{call_id}` does not answer a pending tool call"
                ))
            })?;

        self.append(ChatMessage::Tool { call_id, name, content: content.into() });
        Ok(())
    }

    /// Tool calls of the latest assistant message that have no result yet.
    pub fn unanswered_tool_calls(&self) -> Vec<&ToolCall> {
        let Some(position) =
            self.messages
                .iter()
                .rposition(|message| matches!(message, ChatMessage::Assistant { .. }))
        else {
            return Vec::new();
        };

        let ChatMessage::Assistant { tool_calls, .. } = &self.messages[position] else {
            return Vec::new();
        };

        let answered = self.messages[position + 1..]
            .iter()
            .filter_map(|message| match message {
                ChatMessage::Tool { call_id, .. } => Some(call_id.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>();

        tool_calls.iter().filter(|call| !answered.contains(&call.id.as_str())).collect()
    }

    pub fn is_settled(&self) -> bool {
        self.unanswered_tool_calls().is_empty()
    }

    /// Answers calls left dangling by an interrupted turn so the transcript can be
    /// resumed without rewriting history. Returns how many calls were settled.
    pub fn settle_interrupted_calls(&mut self, note: &str) -> usize {
        let pending = self
            .unanswered_tool_calls()
            .into_iter()
            .map(|call| (call.id.clone(), call.name.clone()))
            .collect::<Vec<_>>();

        for (call_id, name) in &pending {
            self.append(ChatMessage::Tool {
                call_id: call_id.clone(),
                name: name.clone(),
                content: note.to_string(),
            });
        }
        pending.len()
    }

    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages.iter().rev().find_map(|message| match message {
            ChatMessage::Assistant { content, .. } => content.as_deref(),
            _ => None,
        })
    }

    fn ensure_settled(&self, appending: &str) -> Result<(), DomainError> {
        if self.is_settled() {
            return Ok(());
        }
        Err(DomainError::InvariantViolation(format!(
            "cannot append {appending} while tool calls are unanswered"
        )))
    }

    fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }
}
