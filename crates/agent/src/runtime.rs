use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use rise_core::config::AppConfig;
use rise_core::domain::conversation::{Conversation, SessionId, ToolCall};
use rise_db::repositories::{CheckpointRepository, SqlCheckpointRepository};
use rise_db::DbPool;

use crate::audit::TracingAuditSink;
use crate::error::AgentError;
use crate::llm::{
    LlmClient, LlmError, ModelReply, ModelRequest, OpenAiCompatibleClient, RetryPolicy,
};
use crate::policy::{self, RolePolicy};
use crate::session::SessionManager;
use crate::tools::{ToolContext, ToolRegistry, ToolStores};

pub const FALLBACK_RESPONSE: &str =
    "I'm sorry, I couldn't complete that request. Please try again later.";

const DEFAULT_MAX_TURNS: u32 = 8;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnRequest {
    pub role: String,
    pub message: String,
    pub session_id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    Completed,
    LoopBoundExceeded,
    ModelUnavailable,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnResponse {
    pub response: String,
    pub outcome: TurnOutcome,
}

impl TurnResponse {
    fn fallback(outcome: TurnOutcome) -> Self {
        Self { response: FALLBACK_RESPONSE.to_string(), outcome }
    }
}

/// Where the turn loop currently stands.
#[derive(Debug)]
enum LoopState {
    AwaitingModel,
    DispatchingTools(Vec<ToolCall>),
    Done(String),
}

pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    registry: ToolRegistry,
    sessions: SessionManager,
    retry: RetryPolicy,
    max_turns: u32,
}

impl AgentRuntime {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        registry: ToolRegistry,
        checkpoints: Arc<dyn CheckpointRepository>,
    ) -> Self {
        Self {
            llm,
            registry,
            sessions: SessionManager::new(checkpoints),
            retry: RetryPolicy::default(),
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    /// Wires the production model client, SQL-backed tools and checkpoints.
    pub fn from_config(config: &AppConfig, pool: DbPool) -> Result<Self, LlmError> {
        let llm: Arc<dyn LlmClient> = Arc::new(OpenAiCompatibleClient::from_config(&config.llm)?);
        let retry = RetryPolicy::from_config(&config.llm);
        let registry = ToolRegistry::standard(
            &ToolStores::sql(pool.clone()),
            llm.clone(),
            retry.clone(),
            config.agent.details_row_limit,
            Arc::new(TracingAuditSink),
        );

        Ok(Self::new(llm, registry, Arc::new(SqlCheckpointRepository::new(pool)))
            .with_retry(retry)
            .with_max_turns(config.agent.max_turns))
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// Runs one chat turn. Cancelling `cancel` abandons any pending model or store
    /// await; uncommitted tool transactions roll back when dropped.
    pub async fn submit(
        &self,
        request: TurnRequest,
        correlation_id: &str,
        cancel: &CancellationToken,
    ) -> Result<TurnResponse, AgentError> {
        let policy = policy::resolve(&request.role)?;
        let session_id = SessionId(request.session_id.trim().to_string());

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(
                    event_name = "agent.turn.cancelled",
                    correlation_id,
                    session_id = %session_id,
                    "turn cancelled before completion"
                );
                Err(AgentError::Cancelled)
            }
            result = self.run_turn(&policy, &session_id, request.message, correlation_id) => result,
        }
    }

    async fn run_turn(
        &self,
        policy: &RolePolicy,
        session_id: &SessionId,
        message: String,
        correlation_id: &str,
    ) -> Result<TurnResponse, AgentError> {
        let _session = self.sessions.lock(session_id).await;
        let mut conversation = self.sessions.load_or_create(session_id, policy.role).await?;
        let tools = self.registry.subset(policy.tools);
        let context = ToolContext {
            session_id: session_id.clone(),
            role: policy.role,
            correlation_id: correlation_id.to_string(),
        };

        info!(
            event_name = "agent.turn.started",
            correlation_id,
            session_id = %session_id,
            role = %policy.role,
            tools = tools.len(),
            "chat turn started"
        );

        conversation.push_user(message)?;
        let mut state = LoopState::AwaitingModel;
        let mut invocations = 0u32;

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    if invocations >= self.max_turns {
                        let error = AgentError::LoopBoundExceeded { max_turns: self.max_turns };
                        warn!(
                            event_name = "agent.turn.loop_bound",
                            correlation_id,
                            session_id = %session_id,
                            error = %error,
                            "model kept requesting tools past the loop bound"
                        );
                        return self
                            .finish_with_fallback(&mut conversation, TurnOutcome::LoopBoundExceeded)
                            .await;
                    }
                    invocations += 1;

                    let request = ModelRequest {
                        system: policy.persona.clone(),
                        messages: conversation.messages().to_vec(),
                        tools: tools.specs(),
                    };
                    let reply = match self.call_model(&request, correlation_id).await {
                        Ok(reply) => reply,
                        Err(error @ AgentError::ModelUnavailable { .. }) => {
                            warn!(
                                event_name = "agent.turn.model_unavailable",
                                correlation_id,
                                session_id = %session_id,
                                error = %error,
                                "giving up on the language model for this turn"
                            );
                            return self
                                .finish_with_fallback(
                                    &mut conversation,
                                    TurnOutcome::ModelUnavailable,
                                )
                                .await;
                        }
                        Err(error) => return Err(error),
                    };
                    self.advance(&mut conversation, reply)?
                }
                LoopState::DispatchingTools(calls) => {
                    for call in &calls {
                        let outcome = tools.dispatch(call, &context).await;
                        conversation.push_tool_result(&call.id, outcome.text())?;
                    }
                    self.sessions.save(&conversation).await?;
                    LoopState::AwaitingModel
                }
                LoopState::Done(answer) => {
                    self.sessions.save(&conversation).await?;
                    info!(
                        event_name = "agent.turn.completed",
                        correlation_id,
                        session_id = %session_id,
                        model_invocations = invocations,
                        "chat turn completed"
                    );
                    return Ok(TurnResponse { response: answer, outcome: TurnOutcome::Completed });
                }
            };
        }
    }

    fn advance(
        &self,
        conversation: &mut Conversation,
        reply: ModelReply,
    ) -> Result<LoopState, AgentError> {
        if reply.tool_calls.is_empty() {
            let answer = reply.content.unwrap_or_default();
            conversation.push_assistant(Some(answer.clone()), Vec::new())?;
            return Ok(LoopState::Done(answer));
        }

        let mut calls = reply.tool_calls;
        ensure_unique_call_ids(&mut calls);
        conversation.push_assistant(reply.content, calls.clone())?;
        Ok(LoopState::DispatchingTools(calls))
    }

    async fn finish_with_fallback(
        &self,
        conversation: &mut Conversation,
        outcome: TurnOutcome,
    ) -> Result<TurnResponse, AgentError> {
        conversation.push_assistant(Some(FALLBACK_RESPONSE.to_string()), Vec::new())?;
        self.sessions.save(conversation).await?;
        Ok(TurnResponse::fallback(outcome))
    }

    async fn call_model(
        &self,
        request: &ModelRequest,
        correlation_id: &str,
    ) -> Result<ModelReply, AgentError> {
        self.retry.chat(self.llm.as_ref(), request, correlation_id).await.map_err(|exhausted| {
            AgentError::ModelUnavailable { attempts: exhausted.attempts, source: exhausted.source }
        })
    }
}

/// Results are matched to calls by id, so ids must be unique within one reply.
fn ensure_unique_call_ids(calls: &mut [ToolCall]) {
    let mut seen = HashSet::new();
    for call in calls.iter_mut() {
        if call.id.trim().is_empty() || !seen.insert(call.id.clone()) {
            call.id = format!("call_{}", Uuid::new_v4().simple());
            seen.insert(call.id.clone());
        }
    }
}
