use sqlx::Row;

use rise_core::domain::equipment::{Equipment, EquipmentId, NewEquipment};

use super::{cents_to_decimal, decimal_to_cents, EquipmentRepository, RepositoryError};
use crate::DbPool;

pub struct SqlEquipmentRepository {
    pool: DbPool,
}

impl SqlEquipmentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn row_to_equipment(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<Equipment, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: Option<String> =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let price_cents: i64 =
        row.try_get("price_per_day_cents").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let available: bool =
        row.try_get("available").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Equipment {
        id: EquipmentId(id),
        name,
        description,
        price_per_day: cents_to_decimal(price_cents),
        available,
    })
}

#[async_trait::async_trait]
impl EquipmentRepository for SqlEquipmentRepository {
    async fn list(&self, limit: u32) -> Result<Vec<Equipment>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, description, price_per_day_cents, available
             FROM equipment ORDER BY id ASC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_equipment).collect()
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Equipment>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, description, price_per_day_cents, available
             FROM equipment WHERE name = ? COLLATE NOCASE ORDER BY id ASC LIMIT 1",
        )
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_equipment).transpose()
    }

    async fn create(&self, equipment: NewEquipment) -> Result<Equipment, RepositoryError> {
        let price_cents = decimal_to_cents(equipment.price_per_day)?;
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO equipment (name, description, price_per_day_cents, available)
             VALUES (?, ?, ?, 1)
             RETURNING id",
        )
        .bind(&equipment.name)
        .bind(&equipment.description)
        .bind(price_cents)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Equipment {
            id: EquipmentId(id),
            name: equipment.name,
            description: equipment.description,
            price_per_day: cents_to_decimal(price_cents),
            available: true,
        })
    }

    async fn delete(&self, id: EquipmentId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let result =
            sqlx::query("DELETE FROM equipment WHERE id = ?").bind(id.0).execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }
}
