use sqlx::Row;

use rise_core::domain::project::{NewProjectRequest, ProjectRequest, ProjectRequestId};
use rise_core::domain::status::RequestStatus;

use super::{
    format_date, parse_date, parse_status, ProjectRequestRepository, RepositoryError, StatusChange,
};
use crate::DbPool;

pub struct SqlProjectRequestRepository {
    pool: DbPool,
}

impl SqlProjectRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_project(row: &sqlx::sqlite::SqliteRow) -> Result<ProjectRequest, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let title: String = row.try_get("title").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: String =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let location: Option<String> =
        row.try_get("location").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let start_date_str: Option<String> =
        row.try_get("start_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(ProjectRequest {
        id: ProjectRequestId(id),
        title,
        description,
        location,
        start_date: start_date_str.as_deref().map(parse_date).transpose()?,
        status: parse_status(&status_str)?,
    })
}

const SELECT_PROJECT: &str =
    "SELECT id, title, description, location, start_date, status FROM project_request";

#[async_trait::async_trait]
impl ProjectRequestRepository for SqlProjectRequestRepository {
    async fn find_by_id(
        &self,
        id: ProjectRequestId,
    ) -> Result<Option<ProjectRequest>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_PROJECT} WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_project).transpose()
    }

    async fn list(
        &self,
        status: Option<RequestStatus>,
        limit: u32,
    ) -> Result<Vec<ProjectRequest>, RepositoryError> {
        let rows = if let Some(status) = status {
            sqlx::query(&format!("{SELECT_PROJECT} WHERE status = ? ORDER BY id ASC LIMIT ?"))
                .bind(status.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query(&format!("{SELECT_PROJECT} ORDER BY id ASC LIMIT ?"))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
        };

        rows.iter().map(row_to_project).collect()
    }

    async fn create(&self, project: NewProjectRequest) -> Result<ProjectRequest, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO project_request (title, description, location, start_date, status)
             VALUES (?, ?, ?, ?, 'pending')
             RETURNING id",
        )
        .bind(&project.title)
        .bind(&project.description)
        .bind(&project.location)
        .bind(project.start_date.map(format_date))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ProjectRequest {
            id: ProjectRequestId(id),
            title: project.title,
            description: project.description,
            location: project.location,
            start_date: project.start_date,
            status: RequestStatus::Pending,
        })
    }

    async fn change_status(
        &self,
        id: ProjectRequestId,
        next: RequestStatus,
    ) -> Result<StatusChange, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!("{SELECT_PROJECT} WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Ok(StatusChange::NotFound);
        };

        let mut project = row_to_project(&row)?;
        let current = project.status;
        if project.decide(next).is_err() {
            return Ok(StatusChange::Refused { current });
        }

        sqlx::query(
            "UPDATE project_request
             SET status = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
             WHERE id = ?",
        )
        .bind(project.status.as_str())
        .bind(id.0)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(StatusChange::Applied(project))
    }

    async fn delete(&self, id: ProjectRequestId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM project_request WHERE id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use rise_core::domain::project::{NewProjectRequest, ProjectRequestId};
    use rise_core::domain::status::RequestStatus;

    use super::SqlProjectRequestRepository;
    use crate::repositories::{ProjectRequestRepository, StatusChange};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> SqlProjectRequestRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlProjectRequestRepository::new(pool)
    }

    fn warehouse() -> NewProjectRequest {
        NewProjectRequest {
            title: "Warehouse extension".to_string(),
            description: "Add a 400 m2 bay to the east side".to_string(),
            location: Some("Pune".to_string()),
            start_date: NaiveDate::from_ymd_opt(2026, 11, 2),
        }
    }

    #[tokio::test]
    async fn created_projects_start_pending() {
        let repo = setup().await;
        let created = repo.create(warehouse()).await.expect("create");

        let found = repo.find_by_id(created.id).await.expect("find").expect("exists");
        assert_eq!(found.status, RequestStatus::Pending);
        assert_eq!(found.start_date, NaiveDate::from_ymd_opt(2026, 11, 2));
    }

    #[tokio::test]
    async fn change_status_on_missing_id_mutates_nothing() {
        let repo = setup().await;
        let created = repo.create(warehouse()).await.expect("create");

        let change =
            repo.change_status(ProjectRequestId(5), RequestStatus::Approved).await.expect("change");
        assert_eq!(change, StatusChange::NotFound);

        let untouched = repo.find_by_id(created.id).await.expect("find").expect("exists");
        assert_eq!(untouched.status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn approve_then_cancel_follows_lifecycle() {
        let repo = setup().await;
        let created = repo.create(warehouse()).await.expect("create");

        let approved =
            repo.change_status(created.id, RequestStatus::Approved).await.expect("approve");
        assert!(matches!(
            approved,
            StatusChange::Applied(ref p) if p.status == RequestStatus::Approved
        ));

        let rejected =
            repo.change_status(created.id, RequestStatus::Rejected).await.expect("reject");
        assert_eq!(rejected, StatusChange::Refused { current: RequestStatus::Approved });

        let cancelled =
            repo.change_status(created.id, RequestStatus::Cancelled).await.expect("cancel");
        assert!(matches!(
            cancelled,
            StatusChange::Applied(ref p) if p.status == RequestStatus::Cancelled
        ));

        let stored = repo.find_by_id(created.id).await.expect("find").expect("exists");
        assert_eq!(stored.status, RequestStatus::Cancelled);
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let repo = setup().await;
        let first = repo.create(warehouse()).await.expect("create");
        repo.create(warehouse()).await.expect("create");
        repo.change_status(first.id, RequestStatus::Rejected).await.expect("reject");

        assert_eq!(repo.list(None, 50).await.expect("all").len(), 2);
        assert_eq!(repo.list(Some(RequestStatus::Pending), 50).await.expect("pending").len(), 1);
        assert!(repo.delete(first.id).await.expect("delete"));
        assert_eq!(repo.list(None, 50).await.expect("all").len(), 1);
    }
}
