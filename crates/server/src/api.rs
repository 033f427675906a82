//! HTTP surface.
//!
//! - `GET  /`                    liveness
//! - `GET  /health`              readiness with a database ping
//! - `POST /chat`                one assistant turn
//! - `GET  /admin/projects`      project requests, optionally filtered by `?status=`
//! - `PUT  /admin/approve/{id}`  approve a project request
//! - `PUT  /admin/cancel/{id}`   cancel a project request

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use rise_agent::AgentRuntime;
use rise_core::errors::InterfaceError;
use rise_db::repositories::ProjectRequestRepository;
use rise_db::DbPool;
use serde::Serialize;
use uuid::Uuid;

use crate::{admin, chat, health};

#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<AgentRuntime>,
    pub projects: Arc<dyn ProjectRequestRepository>,
    pub db_pool: DbPool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::liveness))
        .route("/health", get(health::readiness))
        .route("/chat", post(chat::chat))
        .route("/admin/projects", get(admin::list_projects))
        .route("/admin/approve/{project_id}", put(admin::approve_project))
        .route("/admin/cancel/{project_id}", put(admin::cancel_project))
        .with_state(state)
}

pub fn correlation_id() -> String {
    format!("req-{}", Uuid::new_v4().simple())
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub correlation_id: String,
}

/// Interface error rendered as JSON; internals never reach the body.
#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::Forbidden { .. } => StatusCode::FORBIDDEN,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let error = match &self.0 {
            InterfaceError::BadRequest { message, .. } => message.clone(),
            other => other.user_message().to_string(),
        };
        let body = ErrorBody { error, correlation_id: self.0.correlation_id().to_string() };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, Response};
    use rise_agent::llm::{LlmClient, RetryPolicy, ScriptedLlmClient};
    use rise_agent::tools::{ToolRegistry, ToolStores};
    use rise_agent::AgentRuntime;
    use rise_core::audit::InMemoryAuditSink;
    use rise_db::repositories::{InMemoryCheckpointRepository, SqlProjectRequestRepository};
    use rise_db::{connect_with_settings, migrations, DbPool, DemoCatalog};
    use serde_json::Value;

    use super::AppState;

    pub async fn state(llm: ScriptedLlmClient) -> (AppState, DbPool) {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        DemoCatalog::load(&pool).await.expect("seed");

        let llm: Arc<dyn LlmClient> = Arc::new(llm);
        let retry = RetryPolicy {
            max_retries: 1,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        let registry = ToolRegistry::standard(
            &ToolStores::sql(pool.clone()),
            llm.clone(),
            retry.clone(),
            10,
            Arc::new(InMemoryAuditSink::default()),
        );
        let runtime = AgentRuntime::new(
            llm,
            registry,
            Arc::new(InMemoryCheckpointRepository::default()),
        )
        .with_retry(retry)
        .with_max_turns(3);

        let state = AppState {
            runtime: Arc::new(runtime),
            projects: Arc::new(SqlProjectRequestRepository::new(pool.clone())),
            db_pool: pool.clone(),
        };
        (state, pool)
    }

    pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder().method(method).uri(uri).body(Body::empty()).expect("request")
    }

    pub async fn json_body(response: Response<Body>) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }
}
