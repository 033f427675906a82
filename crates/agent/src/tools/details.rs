//! Natural-language lookups over the business tables.
//!
//! The model writes one read-only statement for the question, the guard screens
//! it, the store runs it with a row cap, and the model phrases the rows as an
//! answer. No tools are offered to either model call, so the lookup cannot recurse.

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{info, warn};

use rise_core::domain::conversation::ChatMessage;
use rise_db::repositories::{ReadOnlyQueryRepository, RepositoryError};

use super::fields::required_text;
use super::{names, SideEffect, Tool, ToolContext, ToolFailure, ToolOutcome};
use crate::guardrails::{GuardrailDecision, QueryGuard};
use crate::llm::{LlmClient, ModelReply, ModelRequest, RetryPolicy};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetDetailsArgs {
    /// The caller's question about equipment, labour, project requests or project history.
    pub question: String,
}

pub struct GetDetailsTool {
    llm: Arc<dyn LlmClient>,
    query: Arc<dyn ReadOnlyQueryRepository>,
    guard: QueryGuard,
    row_limit: u32,
    retry: RetryPolicy,
}

impl GetDetailsTool {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        query: Arc<dyn ReadOnlyQueryRepository>,
        guard: QueryGuard,
        row_limit: u32,
    ) -> Self {
        Self { llm, query, guard, row_limit, retry: RetryPolicy::default() }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn ask(
        &self,
        request: ModelRequest,
        context: &ToolContext,
    ) -> Result<ModelReply, ToolFailure> {
        self.retry
            .chat(self.llm.as_ref(), &request, &context.correlation_id)
            .await
            .map_err(|exhausted| ToolFailure::Model(exhausted.source))
    }

    fn query_prompt(&self, schema: &str) -> String {
        format!(
            "Given an input question, create a syntactically correct SQLite query to run to help \
             find the answer. Unless the user specifies in the question a specific number of \
             examples they wish to obtain, always limit your query to at most {top_k} results. \
             You can order the results by a relevant column to return the most interesting \
             examples in the database.\n\n\
             Never query for all the columns from a specific table, only ask for the few relevant \
             columns given the question. Pay attention to use only the column names that you can \
             see in the schema description. Be careful to not query for columns that do not \
             exist. Money columns ending in `_cents` hold whole cents.\n\n\
             Only use the following tables:\n{schema}\n\n\
             Respond with the SQL statement only, without explanation.",
            top_k = self.row_limit,
        )
    }
}

fn answer_prompt(question: &str, rows: &str) -> String {
    format!(
        "Given the following user question and SQL result, answer the user question.\n\n\
         Question: {question}\n\
         SQL Result: {rows}\n\
         When making the answer, do not include the SQL query. Amounts stored in cents should be \
         shown in currency units."
    )
}

#[async_trait]
impl Tool for GetDetailsTool {
    type Args = GetDetailsArgs;
    type Input = String;

    const NAME: &'static str = names::GET_DETAILS;
    const DESCRIPTION: &'static str =
        "Answers a question about equipment, labour, project requests or project history by \
         looking the information up in the company database.";
    const SIDE_EFFECT: SideEffect = SideEffect::ReadOnly;

    fn validate(args: Self::Args) -> Result<Self::Input, String> {
        required_text("question", args.question)
    }

    async fn execute(
        &self,
        question: Self::Input,
        context: &ToolContext,
    ) -> Result<ToolOutcome, ToolFailure> {
        let schema = self.query.schema_summary().await?;
        let generated = self
            .ask(
                ModelRequest {
                    system: self.query_prompt(&schema),
                    messages: vec![ChatMessage::User { content: question.clone() }],
                    tools: Vec::new(),
                },
                context,
            )
            .await?;

        let raw_statement = generated.content.as_deref().unwrap_or_default();
        let statement = match self.guard.evaluate(raw_statement) {
            GuardrailDecision::Allow { statement } => statement,
            GuardrailDecision::Deny { reason_code, user_message } => {
                warn!(
                    event_name = "agent.details.denied",
                    correlation_id = %context.correlation_id,
                    session_id = %context.session_id,
                    reason_code,
                    "generated lookup rejected by query guard"
                );
                return Ok(ToolOutcome::Rejected(user_message));
            }
        };

        let rows = match self.query.run(&statement, self.row_limit).await {
            Ok(rows) => rows,
            Err(RepositoryError::Database(error)) => {
                warn!(
                    event_name = "agent.details.query_failed",
                    correlation_id = %context.correlation_id,
                    session_id = %context.session_id,
                    error = %error,
                    "generated lookup failed to run"
                );
                return Ok(ToolOutcome::Rejected(
                    "The lookup could not be run against the database. Try rephrasing the question."
                        .to_string(),
                ));
            }
            Err(RepositoryError::Forbidden(reason)) => {
                warn!(
                    event_name = "agent.details.forbidden",
                    correlation_id = %context.correlation_id,
                    session_id = %context.session_id,
                    reason = %reason,
                    "generated lookup reached outside the queryable tables"
                );
                return Ok(ToolOutcome::Rejected(
                    "The lookup tried to read data that is not available to it.".to_string(),
                ));
            }
            Err(other) => return Err(other.into()),
        };

        info!(
            event_name = "agent.details.rows",
            correlation_id = %context.correlation_id,
            session_id = %context.session_id,
            row_count = rows.rows.len(),
            "details lookup executed"
        );

        let answer = self
            .ask(
                ModelRequest {
                    system: String::new(),
                    messages: vec![ChatMessage::User {
                        content: answer_prompt(&question, &rows.to_prompt_text()),
                    }],
                    tools: Vec::new(),
                },
                context,
            )
            .await?;

        match answer.content.map(|text| text.trim().to_string()).filter(|text| !text.is_empty()) {
            Some(text) => Ok(ToolOutcome::Success(text)),
            None => Ok(ToolOutcome::Success(rows.to_prompt_text())),
        }
    }
}
