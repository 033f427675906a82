use sqlx::Row;

use rise_core::domain::equipment::EquipmentId;
use rise_core::domain::equipment_request::{
    EquipmentRequest, EquipmentRequestId, NewEquipmentRequest,
};
use rise_core::domain::status::RequestStatus;

use super::equipment::row_to_equipment;
use super::{
    format_date, parse_date, parse_status, to_u32, EquipmentPlacement, EquipmentRequestRepository,
    RepositoryError,
};
use crate::DbPool;

pub struct SqlEquipmentRequestRepository {
    pool: DbPool,
}

impl SqlEquipmentRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_request(row: &sqlx::sqlite::SqliteRow) -> Result<EquipmentRequest, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let equipment_id: i64 =
        row.try_get("equipment_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let location: String =
        row.try_get("location").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let start_date: String =
        row.try_get("start_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let number_of_days: i64 =
        row.try_get("number_of_days").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quantity: i64 =
        row.try_get("quantity").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(EquipmentRequest {
        id: EquipmentRequestId(id),
        equipment_id: EquipmentId(equipment_id),
        location,
        start_date: parse_date(&start_date)?,
        number_of_days: to_u32(number_of_days, "number_of_days")?,
        quantity: to_u32(quantity, "quantity")?,
        status: parse_status(&status)?,
    })
}

#[async_trait::async_trait]
impl EquipmentRequestRepository for SqlEquipmentRequestRepository {
    /// Lookup, availability check and insert share one transaction; the
    /// not-found and unavailable outcomes write nothing.
    async fn place(
        &self,
        request: NewEquipmentRequest,
    ) -> Result<EquipmentPlacement, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT id, name, description, price_per_day_cents, available
             FROM equipment WHERE name = ? COLLATE NOCASE ORDER BY id ASC LIMIT 1",
        )
        .bind(request.equipment_name.trim())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(EquipmentPlacement::NotFound);
        };
        let equipment = row_to_equipment(&row)?;
        if !equipment.available {
            return Ok(EquipmentPlacement::Unavailable(equipment));
        }

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO equipment_request
                 (equipment_id, location, start_date, number_of_days, quantity, status)
             VALUES (?, ?, ?, ?, ?, 'pending')
             RETURNING id",
        )
        .bind(equipment.id.0)
        .bind(&request.location)
        .bind(format_date(request.start_date))
        .bind(i64::from(request.number_of_days))
        .bind(i64::from(request.quantity))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let placed = EquipmentRequest {
            id: EquipmentRequestId(id),
            equipment_id: equipment.id,
            location: request.location,
            start_date: request.start_date,
            number_of_days: request.number_of_days,
            quantity: request.quantity,
            status: RequestStatus::Pending,
        };
        Ok(EquipmentPlacement::Placed { equipment, request: placed })
    }

    async fn list_for_equipment(
        &self,
        equipment_id: EquipmentId,
    ) -> Result<Vec<EquipmentRequest>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, equipment_id, location, start_date, number_of_days, quantity, status
             FROM equipment_request WHERE equipment_id = ? ORDER BY id ASC",
        )
        .bind(equipment_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_request).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use rise_core::domain::equipment::NewEquipment;
    use rise_core::domain::equipment_request::NewEquipmentRequest;
    use rise_core::domain::status::RequestStatus;

    use super::SqlEquipmentRequestRepository;
    use crate::repositories::{
        EquipmentPlacement, EquipmentRepository, EquipmentRequestRepository,
        SqlEquipmentRepository,
    };
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn hire(name: &str) -> NewEquipmentRequest {
        NewEquipmentRequest {
            equipment_name: name.to_string(),
            location: "Site B".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 10, 20).expect("date"),
            number_of_days: 3,
            quantity: 2,
        }
    }

    async fn request_count(pool: &sqlx::SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM equipment_request")
            .fetch_one(pool)
            .await
            .expect("count")
    }

    #[tokio::test]
    async fn available_equipment_gets_exactly_one_pending_request() {
        let pool = setup().await;
        let equipment = SqlEquipmentRepository::new(pool.clone())
            .create(NewEquipment {
                name: "scaffold".to_string(),
                description: None,
                price_per_day: Decimal::new(1500, 2),
            })
            .await
            .expect("create equipment");
        let repo = SqlEquipmentRequestRepository::new(pool.clone());

        let request = match repo.place(hire("Scaffold")).await.expect("place") {
            EquipmentPlacement::Placed { request, .. } => request,
            other => panic!("expected a placed request, got {other:?}"),
        };
        assert_eq!(request.status, RequestStatus::Pending);

        let stored = repo.list_for_equipment(equipment.id).await.expect("list");
        assert_eq!(stored, vec![request]);
        assert_eq!(stored[0].quantity, 2);
        assert_eq!(stored[0].number_of_days, 3);
    }

    #[tokio::test]
    async fn unknown_equipment_writes_nothing() {
        let pool = setup().await;
        let repo = SqlEquipmentRequestRepository::new(pool.clone());

        assert_eq!(
            repo.place(hire("tower crane")).await.expect("place"),
            EquipmentPlacement::NotFound
        );
        assert_eq!(request_count(&pool).await, 0);
    }

    #[tokio::test]
    async fn unavailable_equipment_writes_nothing() {
        let pool = setup().await;
        SqlEquipmentRepository::new(pool.clone())
            .create(NewEquipment {
                name: "Concrete mixer".to_string(),
                description: None,
                price_per_day: Decimal::new(6000, 2),
            })
            .await
            .expect("create equipment");
        sqlx::query("UPDATE equipment SET available = 0").execute(&pool).await.expect("update");

        let repo = SqlEquipmentRequestRepository::new(pool.clone());
        let placement = repo.place(hire("concrete mixer")).await.expect("place");

        assert!(matches!(placement, EquipmentPlacement::Unavailable(_)));
        assert_eq!(request_count(&pool).await, 0);
    }

    #[tokio::test]
    async fn deleting_equipment_cascades_to_requests() {
        let pool = setup().await;
        let equipment_repo = SqlEquipmentRepository::new(pool.clone());
        let equipment = equipment_repo
            .create(NewEquipment {
                name: "Dumper".to_string(),
                description: None,
                price_per_day: Decimal::new(9000, 2),
            })
            .await
            .expect("create equipment");
        SqlEquipmentRequestRepository::new(pool.clone())
            .place(hire("dumper"))
            .await
            .expect("place");
        assert_eq!(request_count(&pool).await, 1);

        assert!(equipment_repo.delete(equipment.id).await.expect("delete"));
        assert_eq!(request_count(&pool).await, 0);
    }
}
