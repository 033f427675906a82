use thiserror::Error;

use rise_core::domain::role::StaffRole;
use rise_core::errors::{ApplicationError, DomainError};
use rise_db::repositories::RepositoryError;

use crate::llm::LlmError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("unknown role `{0}`")]
    UnknownRole(String),
    #[error("session `{session_id}` belongs to role {bound}, not {requested}")]
    SessionRoleMismatch { session_id: String, bound: StaffRole, requested: StaffRole },
    #[error("invalid arguments for tool `{tool}`: {reason}")]
    InvalidToolArguments { tool: String, reason: String },
    #[error("tool `{tool}` failed: {reason}")]
    ToolExecutionFailure { tool: String, reason: String },
    #[error("turn exceeded the limit of {max_turns} model invocations")]
    LoopBoundExceeded { max_turns: u32 },
    #[error("language model unavailable after {attempts} attempts: {source}")]
    ModelUnavailable { attempts: u32, source: LlmError },
    #[error("turn was cancelled")]
    Cancelled,
    #[error("conversation checkpoint failed: {0}")]
    Checkpoint(#[from] RepositoryError),
    #[error("conversation invariant violated: {0}")]
    Conversation(#[from] DomainError),
}

impl From<AgentError> for ApplicationError {
    fn from(value: AgentError) -> Self {
        match value {
            AgentError::UnknownRole(role) => Self::Domain(DomainError::UnknownRole(role)),
            AgentError::SessionRoleMismatch { session_id, .. } => {
                Self::Forbidden(format!("session `{session_id}` is bound to another role"))
            }
            AgentError::ModelUnavailable { .. } | AgentError::LoopBoundExceeded { .. } => {
                Self::Integration(value.to_string())
            }
            AgentError::Checkpoint(error) => Self::Persistence(error.to_string()),
            AgentError::Conversation(error) => Self::Domain(error),
            AgentError::InvalidToolArguments { .. }
            | AgentError::ToolExecutionFailure { .. }
            | AgentError::Cancelled => Self::Integration(value.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use rise_core::domain::role::StaffRole;
    use rise_core::errors::{ApplicationError, InterfaceError};

    use super::AgentError;

    #[test]
    fn role_mismatch_maps_to_forbidden() {
        let error = AgentError::SessionRoleMismatch {
            session_id: "s-1".to_string(),
            bound: StaffRole::User,
            requested: StaffRole::SuperAdmin,
        };

        let interface = ApplicationError::from(error).into_interface("req-9");
        assert!(matches!(interface, InterfaceError::Forbidden { .. }));
    }

    #[test]
    fn unknown_role_maps_to_bad_request() {
        let interface =
            ApplicationError::from(AgentError::UnknownRole("guest".to_string()))
                .into_interface("r");
        assert!(matches!(interface, InterfaceError::BadRequest { .. }));
    }
}
