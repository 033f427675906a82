//! Tool catalog and dispatch.
//!
//! Each tool declares a typed argument struct; its JSON schema is what the model
//! sees. Dispatch never fails the turn: unknown names, bad arguments and store
//! failures all come back as text the model can read and react to.

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use rise_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use rise_core::domain::conversation::{SessionId, ToolCall};
use rise_core::domain::role::StaffRole;
use rise_db::repositories::{
    EquipmentRepository, EquipmentRequestRepository, LabourRepository, ProjectRequestRepository,
    ReadOnlyQueryRepository, RepositoryError, SqlEquipmentRepository,
    SqlEquipmentRequestRepository, SqlLabourRepository, SqlProjectRequestRepository,
    SqlReadOnlyQuery,
};
use rise_db::DbPool;

use crate::error::AgentError;
use crate::guardrails::QueryGuard;
use crate::llm::{LlmClient, LlmError, RetryPolicy, ToolSpec};

pub mod catalog;
pub mod details;
mod fields;
pub mod projects;
pub mod requests;

pub mod names {
    pub const GET_DETAILS: &str = "get_details";
    pub const PLACE_REQUEST_FOR_PROJECT: &str = "place_request_for_project";
    pub const PLACE_REQUEST_FOR_EQUIPMENT: &str = "place_request_for_equipment";
    pub const ADD_NEW_EQUIPMENT: &str = "add_new_equipment";
    pub const ADD_NEW_LABOUR: &str = "add_new_labour";
    pub const APPROVE_OR_REJECT_PROJECT: &str = "approve_or_reject_project";
    pub const REMOVE_PROJECT: &str = "remove_project";
    pub const REMOVE_EQUIPMENT: &str = "remove_equipment";
    pub const REMOVE_LABOUR: &str = "remove_labour";
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SideEffect {
    ReadOnly,
    Mutating,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
    pub side_effect: SideEffect,
}

impl ToolDefinition {
    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.to_string(),
            description: self.description.to_string(),
            parameters: self.parameters.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolOutcome {
    Success(String),
    /// The request was understood but the store refused it (missing record, wrong state).
    Rejected(String),
    InvalidArguments(String),
    Failed(String),
}

impl ToolOutcome {
    pub fn text(&self) -> &str {
        match self {
            Self::Success(text)
            | Self::Rejected(text)
            | Self::InvalidArguments(text)
            | Self::Failed(text) => text,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Rejected(_) => "rejected",
            Self::InvalidArguments(_) => "invalid_arguments",
            Self::Failed(_) => "failed",
        }
    }

    fn audit_outcome(&self) -> AuditOutcome {
        match self {
            Self::Success(_) => AuditOutcome::Success,
            Self::Rejected(_) | Self::InvalidArguments(_) => AuditOutcome::Rejected,
            Self::Failed(_) => AuditOutcome::Failed,
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolFailure {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Model(#[from] LlmError),
}

/// Who is calling, for audit and log correlation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolContext {
    pub session_id: SessionId,
    pub role: StaffRole,
    pub correlation_id: String,
}

#[async_trait]
pub trait Tool: Send + Sync + 'static {
    type Args: DeserializeOwned + JsonSchema + Send + 'static;
    type Input: Send + 'static;

    const NAME: &'static str;
    const DESCRIPTION: &'static str;
    const SIDE_EFFECT: SideEffect;

    /// Semantic checks beyond the schema: non-empty text, positive amounts, ISO dates.
    fn validate(args: Self::Args) -> Result<Self::Input, String>;

    async fn execute(
        &self,
        input: Self::Input,
        context: &ToolContext,
    ) -> Result<ToolOutcome, ToolFailure>;
}

#[async_trait]
trait ErasedTool: Send + Sync {
    async fn invoke(
        &self,
        arguments: Value,
        context: &ToolContext,
    ) -> Result<ToolOutcome, ToolFailure>;
}

#[async_trait]
impl<T: Tool> ErasedTool for T {
    async fn invoke(
        &self,
        arguments: Value,
        context: &ToolContext,
    ) -> Result<ToolOutcome, ToolFailure> {
        let input = match parse_arguments::<T::Args>(arguments).and_then(T::validate) {
            Ok(input) => input,
            Err(reason) => {
                let error = AgentError::InvalidToolArguments { tool: T::NAME.to_string(), reason };
                return Ok(ToolOutcome::InvalidArguments(error.to_string()));
            }
        };
        self.execute(input, context).await
    }
}

fn parse_arguments<A: DeserializeOwned>(arguments: Value) -> Result<A, String> {
    let arguments = match arguments {
        Value::String(text) => serde_json::from_str(&text)
            .map_err(|error| format!("arguments are not a JSON object ({error})"))?,
        Value::Null => json!({}),
        other => other,
    };
    serde_json::from_value(arguments).map_err(|error| error.to_string())
}

fn parameters_schema<A: JsonSchema>() -> Value {
    let schema = schemars::schema_for!(A);
    let mut value = serde_json::to_value(&schema).unwrap_or_else(|_| json!({ "type": "object" }));
    if let Some(object) = value.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
    }
    value
}

#[derive(Clone)]
struct RegisteredTool {
    definition: ToolDefinition,
    handler: Arc<dyn ErasedTool>,
}

/// Store handles the tools run against.
#[derive(Clone)]
pub struct ToolStores {
    pub equipment: Arc<dyn EquipmentRepository>,
    pub labour: Arc<dyn LabourRepository>,
    pub projects: Arc<dyn ProjectRequestRepository>,
    pub equipment_requests: Arc<dyn EquipmentRequestRepository>,
    pub details: Arc<dyn ReadOnlyQueryRepository>,
}

impl ToolStores {
    pub fn sql(pool: DbPool) -> Self {
        Self {
            equipment: Arc::new(SqlEquipmentRepository::new(pool.clone())),
            labour: Arc::new(SqlLabourRepository::new(pool.clone())),
            projects: Arc::new(SqlProjectRequestRepository::new(pool.clone())),
            equipment_requests: Arc::new(SqlEquipmentRequestRepository::new(pool.clone())),
            details: Arc::new(SqlReadOnlyQuery::new(pool)),
        }
    }
}

#[derive(Clone)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    audit: Arc<dyn AuditSink>,
}

impl ToolRegistry {
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        Self { tools: Vec::new(), audit }
    }

    /// Every tool the assistant knows, in catalog order.
    pub fn standard(
        stores: &ToolStores,
        llm: Arc<dyn LlmClient>,
        retry: RetryPolicy,
        details_row_limit: u32,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let mut registry = Self::new(audit);
        registry.register(
            details::GetDetailsTool::new(
                llm,
                stores.details.clone(),
                QueryGuard::default(),
                details_row_limit,
            )
            .with_retry(retry),
        );
        registry.register(requests::PlaceRequestForProjectTool::new(stores.projects.clone()));
        registry.register(requests::PlaceRequestForEquipmentTool::new(
            stores.equipment_requests.clone(),
        ));
        registry.register(catalog::AddNewEquipmentTool::new(stores.equipment.clone()));
        registry.register(catalog::AddNewLabourTool::new(stores.labour.clone()));
        registry.register(projects::ApproveOrRejectProjectTool::new(stores.projects.clone()));
        registry.register(projects::RemoveProjectTool::new(stores.projects.clone()));
        registry.register(catalog::RemoveEquipmentTool::new(stores.equipment.clone()));
        registry.register(catalog::RemoveLabourTool::new(stores.labour.clone()));
        registry
    }

    pub fn register<T: Tool>(&mut self, tool: T) {
        let definition = ToolDefinition {
            name: T::NAME,
            description: T::DESCRIPTION,
            parameters: parameters_schema::<T::Args>(),
            side_effect: T::SIDE_EFFECT,
        };
        self.tools.retain(|existing| existing.definition.name != T::NAME);
        self.tools.push(RegisteredTool { definition, handler: Arc::new(tool) });
    }

    /// Narrows the catalog to `names`, keeping the order given.
    pub fn subset(&self, names: &[&str]) -> Self {
        let tools = names
            .iter()
            .filter_map(|name| {
                let found = self.tools.iter().find(|tool| tool.definition.name == *name);
                if found.is_none() {
                    warn!(
                        event_name = "agent.tool.unregistered",
                        tool = %name,
                        "policy names an unregistered tool"
                    );
                }
                found.cloned()
            })
            .collect();
        Self { tools, audit: self.audit.clone() }
    }

    pub fn definitions(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.iter().map(|tool| &tool.definition)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|tool| tool.definition.name).collect()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.definitions().map(ToolDefinition::spec).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn dispatch(&self, call: &ToolCall, context: &ToolContext) -> ToolOutcome {
        let Some(tool) = self.tools.iter().find(|tool| tool.definition.name == call.name) else {
            warn!(
                event_name = "agent.tool.unknown",
                correlation_id = %context.correlation_id,
                session_id = %context.session_id,
                tool = %call.name,
                "model requested a tool outside the role's catalog"
            );
            return ToolOutcome::Rejected(format!(
                "Unknown tool `{}`. Available tools: {}.",
                call.name,
                self.names().join(", ")
            ));
        };

        let outcome = match tool.handler.invoke(call.arguments.clone(), context).await {
            Ok(outcome) => outcome,
            Err(failure) => {
                warn!(
                    event_name = "agent.tool.failed",
                    correlation_id = %context.correlation_id,
                    session_id = %context.session_id,
                    tool = %call.name,
                    error = %failure,
                    "tool execution failed"
                );
                let error = AgentError::ToolExecutionFailure {
                    tool: call.name.clone(),
                    reason: "the operation could not be completed, please try again later"
                        .to_string(),
                };
                ToolOutcome::Failed(error.to_string())
            }
        };

        info!(
            event_name = "agent.tool.dispatched",
            correlation_id = %context.correlation_id,
            session_id = %context.session_id,
            role = %context.role,
            tool = %call.name,
            outcome = outcome.label(),
            "tool call dispatched"
        );

        if tool.definition.side_effect == SideEffect::Mutating {
            let audit_context = AuditContext::new(
                Some(context.session_id.clone()),
                context.correlation_id.clone(),
                context.role.as_str(),
            );
            self.audit.emit(
                AuditEvent::new(
                    &audit_context,
                    "tool.invoked",
                    AuditCategory::Tool,
                    outcome.audit_outcome(),
                )
                .with_metadata("tool", call.name.clone())
                .with_metadata("call_id", call.id.clone())
                .with_metadata("result", outcome.label()),
            );
        }

        outcome
    }
}


#[cfg(test)]
mod tests {
    use rise_core::audit::{AuditOutcome, InMemoryAuditSink};
    use rise_core::domain::conversation::ToolCall;
    use rise_core::domain::role::StaffRole;
    use serde_json::json;

    use super::test_support::{context, pool, registry};
    use super::{names, ToolOutcome};
    use crate::policy::RolePolicy;

    fn call(name: &str, arguments: serde_json::Value) -> ToolCall {
        ToolCall { id: "call-1".to_string(), name: name.to_string(), arguments }
    }

    #[tokio::test]
    async fn standard_catalog_covers_every_policy_tool() {
        let registry = registry(pool().await, InMemoryAuditSink::default());
        let policy = RolePolicy::for_role(StaffRole::SuperAdmin);

        assert_eq!(registry.names(), policy.tools.to_vec());
        for definition in registry.definitions() {
            assert_eq!(definition.parameters["type"], json!("object"), "{}", definition.name);
        }
    }

    #[tokio::test]
    async fn subset_preserves_policy_order() {
        let registry = registry(pool().await, InMemoryAuditSink::default());
        for role in StaffRole::ALL {
            let policy = RolePolicy::for_role(role);
            assert_eq!(registry.subset(policy.tools).names(), policy.tools.to_vec());
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_answered_with_text() {
        let registry = registry(pool().await, InMemoryAuditSink::default())
            .subset(RolePolicy::for_role(StaffRole::User).tools);

        let outcome = registry
            .dispatch(
                &call(names::REMOVE_EQUIPMENT, json!({ "equipment_id": 1 })),
                &context(StaffRole::User),
            )
            .await;

        assert!(matches!(outcome, ToolOutcome::Rejected(_)));
        assert!(outcome.text().contains("Unknown tool `remove_equipment`"));
    }

    #[tokio::test]
    async fn schema_mismatch_becomes_invalid_arguments_text() {
        let registry = registry(pool().await, InMemoryAuditSink::default());

        let outcome = registry
            .dispatch(
                &call(names::REMOVE_LABOUR, json!({ "labour_id": "three" })),
                &context(StaffRole::SuperAdmin),
            )
            .await;

        assert!(matches!(outcome, ToolOutcome::InvalidArguments(_)));
        assert!(outcome.text().starts_with("invalid arguments for tool `remove_labour`"));
    }

    #[tokio::test]
    async fn string_encoded_arguments_are_accepted() {
        let registry = registry(pool().await, InMemoryAuditSink::default());

        let outcome = registry
            .dispatch(
                &call(names::REMOVE_LABOUR, json!("{\"labour_id\": 3}")),
                &context(StaffRole::SuperAdmin),
            )
            .await;

        assert_eq!(outcome, ToolOutcome::Rejected("Labour not found".to_string()));
    }

    #[tokio::test]
    async fn mutating_tools_emit_audit_events() {
        let audit = InMemoryAuditSink::default();
        let registry = registry(pool().await, audit.clone());

        registry
            .dispatch(
                &call(names::REMOVE_PROJECT, json!({ "project_id": 42 })),
                &context(StaffRole::SuperAdmin),
            )
            .await;

        let events = audit.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].outcome, AuditOutcome::Rejected);
        assert_eq!(events[0].actor, "super_admin");
        assert_eq!(events[0].metadata.get("tool").map(String::as_str), Some("remove_project"));
    }
}
