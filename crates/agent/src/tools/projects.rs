use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use rise_core::domain::project::ProjectRequestId;
use rise_core::domain::status::RequestStatus;
use rise_db::repositories::{ProjectRequestRepository, StatusChange};

use super::fields::record_id;
use super::{names, SideEffect, Tool, ToolContext, ToolFailure, ToolOutcome};

#[derive(Clone, Copy, Debug, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProjectDecision {
    #[serde(alias = "approve", alias = "Approved", alias = "APPROVED")]
    Approved,
    #[serde(alias = "reject", alias = "Rejected", alias = "REJECTED")]
    Rejected,
}

impl From<ProjectDecision> for RequestStatus {
    fn from(decision: ProjectDecision) -> Self {
        match decision {
            ProjectDecision::Approved => RequestStatus::Approved,
            ProjectDecision::Rejected => RequestStatus::Rejected,
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ApproveOrRejectProjectArgs {
    pub project_id: i64,
    /// Either `approved` or `rejected`.
    pub status: ProjectDecision,
}

pub struct ApproveOrRejectProjectTool {
    projects: Arc<dyn ProjectRequestRepository>,
}

impl ApproveOrRejectProjectTool {
    pub fn new(projects: Arc<dyn ProjectRequestRepository>) -> Self {
        Self { projects }
    }
}

#[async_trait]
impl Tool for ApproveOrRejectProjectTool {
    type Args = ApproveOrRejectProjectArgs;
    type Input = (ProjectRequestId, RequestStatus);

    const NAME: &'static str = names::APPROVE_OR_REJECT_PROJECT;
    const DESCRIPTION: &'static str =
        "Approves or rejects a pending project request given its id. Status must be \
         \"approved\" or \"rejected\".";
    const SIDE_EFFECT: SideEffect = SideEffect::Mutating;

    fn validate(args: Self::Args) -> Result<Self::Input, String> {
        let id = record_id("project_id", args.project_id)?;
        Ok((ProjectRequestId(id), args.status.into()))
    }

    async fn execute(
        &self,
        (id, decision): Self::Input,
        _context: &ToolContext,
    ) -> Result<ToolOutcome, ToolFailure> {
        let outcome = match self.projects.change_status(id, decision).await? {
            StatusChange::Applied(project) => {
                ToolOutcome::Success(format!("Project {} successfully", project.status))
            }
            StatusChange::NotFound => ToolOutcome::Rejected("Project not found".to_string()),
            StatusChange::Refused { current } => ToolOutcome::Rejected(format!(
                "Project #{} is already {current} and cannot be {decision}.",
                id.0
            )),
        };
        Ok(outcome)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RemoveProjectArgs {
    pub project_id: i64,
}

pub struct RemoveProjectTool {
    projects: Arc<dyn ProjectRequestRepository>,
}

impl RemoveProjectTool {
    pub fn new(projects: Arc<dyn ProjectRequestRepository>) -> Self {
        Self { projects }
    }
}

#[async_trait]
impl Tool for RemoveProjectTool {
    type Args = RemoveProjectArgs;
    type Input = ProjectRequestId;

    const NAME: &'static str = names::REMOVE_PROJECT;
    const DESCRIPTION: &'static str = "Deletes a project request by id.";
    const SIDE_EFFECT: SideEffect = SideEffect::Mutating;

    fn validate(args: Self::Args) -> Result<Self::Input, String> {
        record_id("project_id", args.project_id).map(ProjectRequestId)
    }

    async fn execute(
        &self,
        input: Self::Input,
        _context: &ToolContext,
    ) -> Result<ToolOutcome, ToolFailure> {
        if self.projects.delete(input).await? {
            Ok(ToolOutcome::Success("Project removed successfully".to_string()))
        } else {
            Ok(ToolOutcome::Rejected("Project not found".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use rise_core::audit::InMemoryAuditSink;
    use rise_core::domain::conversation::ToolCall;
    use rise_core::domain::role::StaffRole;
    use rise_db::DemoCatalog;
    use serde_json::json;

    use crate::tools::test_support::{context, pool, registry};
    use crate::tools::{names, ToolOutcome};

    fn call(arguments: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "call-3".to_string(),
            name: names::APPROVE_OR_REJECT_PROJECT.to_string(),
            arguments,
        }
    }

    async fn statuses(pool: &sqlx::SqlitePool) -> Vec<(i64, String)> {
        sqlx::query_as("SELECT id, status FROM project_request ORDER BY id")
            .fetch_all(pool)
            .await
            .expect("statuses")
    }

    #[tokio::test]
    async fn missing_project_is_reported_without_mutation() {
        let pool = pool().await;
        DemoCatalog::load(&pool).await.expect("seed");
        let before = statuses(&pool).await;
        let registry = registry(pool.clone(), InMemoryAuditSink::default());

        let outcome = registry
            .dispatch(
                &call(json!({ "project_id": 5, "status": "approved" })),
                &context(StaffRole::Admin),
            )
            .await;

        assert_eq!(outcome, ToolOutcome::Rejected("Project not found".to_string()));
        assert_eq!(statuses(&pool).await, before);
    }

    #[tokio::test]
    async fn pending_project_becomes_exactly_approved() {
        let pool = pool().await;
        DemoCatalog::load(&pool).await.expect("seed");
        let registry = registry(pool.clone(), InMemoryAuditSink::default());

        let outcome = registry
            .dispatch(
                &call(json!({ "project_id": 1, "status": "approve" })),
                &context(StaffRole::Admin),
            )
            .await;

        assert_eq!(outcome, ToolOutcome::Success("Project approved successfully".to_string()));
        assert_eq!(statuses(&pool).await[0], (1, "approved".to_string()));
    }

    #[tokio::test]
    async fn decided_project_cannot_be_rejected() {
        let pool = pool().await;
        DemoCatalog::load(&pool).await.expect("seed");
        let registry = registry(pool.clone(), InMemoryAuditSink::default());

        let outcome = registry
            .dispatch(
                &call(json!({ "project_id": 2, "status": "rejected" })),
                &context(StaffRole::Admin),
            )
            .await;

        assert_eq!(
            outcome,
            ToolOutcome::Rejected(
                "Project #2 is already approved and cannot be rejected.".to_string()
            )
        );
        assert_eq!(statuses(&pool).await[1], (2, "approved".to_string()));
    }

    #[tokio::test]
    async fn unsupported_decision_is_invalid() {
        let pool = pool().await;
        let registry = registry(pool, InMemoryAuditSink::default());

        let outcome = registry
            .dispatch(
                &call(json!({ "project_id": 1, "status": "cancelled" })),
                &context(StaffRole::Admin),
            )
            .await;

        assert!(matches!(outcome, ToolOutcome::InvalidArguments(_)));
    }
}
