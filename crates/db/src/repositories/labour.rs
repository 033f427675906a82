use sqlx::Row;

use rise_core::domain::labour::{Labour, LabourId, NewLabour};

use super::{cents_to_decimal, decimal_to_cents, LabourRepository, RepositoryError};
use crate::DbPool;

pub struct SqlLabourRepository {
    pool: DbPool,
}

impl SqlLabourRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_labour(row: &sqlx::sqlite::SqliteRow) -> Result<Labour, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let skillset: Option<String> =
        row.try_get("skillset").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let rate_cents: i64 =
        row.try_get("hourly_rate_cents").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let available: bool =
        row.try_get("available").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Labour {
        id: LabourId(id),
        name,
        skillset,
        hourly_rate: cents_to_decimal(rate_cents),
        available,
    })
}

#[async_trait::async_trait]
impl LabourRepository for SqlLabourRepository {
    async fn list(&self, limit: u32) -> Result<Vec<Labour>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, skillset, hourly_rate_cents, available
             FROM labour ORDER BY id ASC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_labour).collect()
    }

    async fn create(&self, labour: NewLabour) -> Result<Labour, RepositoryError> {
        let rate_cents = decimal_to_cents(labour.hourly_rate)?;
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO labour (name, skillset, hourly_rate_cents, available)
             VALUES (?, ?, ?, 1)
             RETURNING id",
        )
        .bind(&labour.name)
        .bind(&labour.skillset)
        .bind(rate_cents)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Labour {
            id: LabourId(id),
            name: labour.name,
            skillset: labour.skillset,
            hourly_rate: cents_to_decimal(rate_cents),
            available: true,
        })
    }

    async fn delete(&self, id: LabourId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let result =
            sqlx::query("DELETE FROM labour WHERE id = ?").bind(id.0).execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }
}
