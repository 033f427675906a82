use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rise_core::domain::project::{ProjectRequest, ProjectRequestId};
use rise_core::domain::status::RequestStatus;
use rise_db::repositories::{RepositoryError, StatusChange};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::api::{correlation_id, AppState};

const PROJECT_LIST_LIMIT: u32 = 200;

#[derive(Debug, Deserialize)]
pub struct ProjectListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProjectList {
    pub projects: Vec<ProjectRequest>,
}

#[derive(Debug, Serialize)]
pub struct AdminMessage {
    pub message: String,
}

type AdminResult<T> = Result<Json<T>, (StatusCode, Json<AdminMessage>)>;

pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ProjectListQuery>,
) -> AdminResult<ProjectList> {
    let status = match query.status.as_deref().map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => Some(raw.parse::<RequestStatus>().map_err(|_| {
            failure(StatusCode::BAD_REQUEST, format!("unknown status filter `{raw}`"))
        })?),
        None => None,
    };

    let projects =
        state.projects.list(status, PROJECT_LIST_LIMIT).await.map_err(store_error)?;
    Ok(Json(ProjectList { projects }))
}

pub async fn approve_project(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> AdminResult<AdminMessage> {
    decide(&state, project_id, RequestStatus::Approved).await
}

pub async fn cancel_project(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> AdminResult<AdminMessage> {
    decide(&state, project_id, RequestStatus::Cancelled).await
}

async fn decide(
    state: &AppState,
    project_id: i64,
    next: RequestStatus,
) -> AdminResult<AdminMessage> {
    let change = state
        .projects
        .change_status(ProjectRequestId(project_id), next)
        .await
        .map_err(store_error)?;

    match change {
        StatusChange::Applied(project) => {
            info!(
                event_name = "http.admin.project_status",
                project_id,
                status = %project.status,
                "project request status changed"
            );
            Ok(Json(AdminMessage { message: format!("Project {next} successfully") }))
        }
        StatusChange::NotFound => {
            Err(failure(StatusCode::NOT_FOUND, "Project not found".to_string()))
        }
        StatusChange::Refused { current } => Err(failure(
            StatusCode::CONFLICT,
            format!("Project is already {current} and cannot be {next}"),
        )),
    }
}

fn failure(status: StatusCode, message: String) -> (StatusCode, Json<AdminMessage>) {
    (status, Json(AdminMessage { message }))
}

fn store_error(store_error: RepositoryError) -> (StatusCode, Json<AdminMessage>) {
    let correlation_id = correlation_id();
    error!(
        event_name = "http.admin.store_failed",
        correlation_id = %correlation_id,
        error = %store_error,
        "admin route could not reach the store"
    );
    failure(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("An unexpected internal error occurred (correlation id {correlation_id})."),
    )
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use rise_agent::llm::ScriptedLlmClient;
    use tower::ServiceExt;

    use crate::api::router;
    use crate::api::test_support::{empty_request, json_body, state};

    async fn status_of(pool: &sqlx::SqlitePool, id: i64) -> String {
        sqlx::query_scalar("SELECT status FROM project_request WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await
            .expect("status")
    }

    #[tokio::test]
    async fn cancel_sets_cancelled_not_approved() {
        let (state, pool) = state(ScriptedLlmClient::default()).await;

        let response = router(state)
            .oneshot(empty_request("PUT", "/admin/cancel/1"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["message"], "Project cancelled successfully");
        assert_eq!(status_of(&pool, 1).await, "cancelled");
    }

    #[tokio::test]
    async fn approve_sets_approved() {
        let (state, pool) = state(ScriptedLlmClient::default()).await;

        let response = router(state)
            .oneshot(empty_request("PUT", "/admin/approve/1"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(status_of(&pool, 1).await, "approved");
    }

    #[tokio::test]
    async fn missing_project_is_not_found() {
        let (state, _pool) = state(ScriptedLlmClient::default()).await;

        let response = router(state)
            .oneshot(empty_request("PUT", "/admin/cancel/99"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["message"], "Project not found");
    }

    #[tokio::test]
    async fn approved_project_can_still_be_cancelled_but_not_reapproved() {
        let (state, pool) = state(ScriptedLlmClient::default()).await;
        let app = router(state);

        let again = app
            .clone()
            .oneshot(empty_request("PUT", "/admin/approve/2"))
            .await
            .expect("response");
        assert_eq!(again.status(), StatusCode::CONFLICT);

        let cancelled =
            app.oneshot(empty_request("PUT", "/admin/cancel/2")).await.expect("response");
        assert_eq!(cancelled.status(), StatusCode::OK);
        assert_eq!(status_of(&pool, 2).await, "cancelled");
    }

    #[tokio::test]
    async fn project_list_filters_by_status() {
        let (state, _pool) = state(ScriptedLlmClient::default()).await;
        let app = router(state);

        let all = json_body(
            app.clone().oneshot(empty_request("GET", "/admin/projects")).await.expect("response"),
        )
        .await;
        assert_eq!(all["projects"].as_array().map(Vec::len), Some(2));

        let pending = json_body(
            app.clone()
                .oneshot(empty_request("GET", "/admin/projects?status=pending"))
                .await
                .expect("response"),
        )
        .await;
        let pending = pending["projects"].as_array().expect("array");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0]["status"], "pending");

        let bad = app
            .oneshot(empty_request("GET", "/admin/projects?status=finished"))
            .await
            .expect("response");
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    }
}
