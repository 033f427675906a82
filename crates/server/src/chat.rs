use axum::{extract::State, http::StatusCode, Json};
use rise_agent::{AgentError, TurnOutcome, TurnRequest};
use rise_core::errors::{ApplicationError, InterfaceError};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::api::{correlation_id, ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub role: String,
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
}

pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Result<(StatusCode, Json<ChatResponse>), ApiError> {
    let correlation_id = correlation_id();

    if body.message.trim().is_empty() {
        return Err(ApiError(InterfaceError::BadRequest {
            message: "message must not be empty".to_string(),
            correlation_id,
        }));
    }

    let session_id = body
        .session_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("session-{}", Uuid::new_v4().simple()));

    // Dropping the handler (client gone) cancels the turn.
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let request =
        TurnRequest { role: body.role, message: body.message, session_id: session_id.clone() };

    match state.runtime.submit(request, &correlation_id, &cancel).await {
        Ok(turn) => {
            let status = match turn.outcome {
                TurnOutcome::Completed => StatusCode::OK,
                TurnOutcome::LoopBoundExceeded | TurnOutcome::ModelUnavailable => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
            };
            info!(
                event_name = "http.chat.completed",
                correlation_id = %correlation_id,
                session_id = %session_id,
                outcome = ?turn.outcome,
                "chat turn answered"
            );
            Ok((status, Json(ChatResponse { response: turn.response, session_id })))
        }
        Err(agent_error) => Err(ApiError(interface_error(agent_error, &correlation_id))),
    }
}

fn interface_error(agent_error: AgentError, correlation_id: &str) -> InterfaceError {
    match agent_error {
        AgentError::UnknownRole(_) | AgentError::SessionRoleMismatch { .. } => {
            warn!(
                event_name = "http.chat.rejected",
                correlation_id,
                error = %agent_error,
                "chat request rejected"
            );
            ApplicationError::from(agent_error).into_interface(correlation_id)
        }
        other => {
            error!(
                event_name = "http.chat.failed",
                correlation_id,
                error = %other,
                "chat turn failed"
            );
            InterfaceError::Internal {
                message: other.to_string(),
                correlation_id: correlation_id.to_string(),
            }
        }
    }
}
