use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Minimum row counts the demo catalog guarantees after a load.
const SEED_TABLES: &[SeedTableContract] = &[
    SeedTableContract { table: "equipment", minimum_rows: 6 },
    SeedTableContract { table: "labour", minimum_rows: 5 },
    SeedTableContract { table: "project_history", minimum_rows: 4 },
    SeedTableContract { table: "project_request", minimum_rows: 2 },
];

/// Equipment that must resolve by name for the hire flow to be demonstrable.
const SEED_EQUIPMENT_NAMES: &[&str] = &["Excavator", "Scaffold", "Tower Crane"];

/// Demo equipment, labour and project history used by `rise seed`.
pub struct DemoCatalog;

impl DemoCatalog {
    pub const SQL: &str = include_str!("../../../config/fixtures/rise_demo_seed.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let mut tables_seeded = Vec::with_capacity(SEED_TABLES.len());
        for contract in SEED_TABLES {
            tables_seeded.push((contract.table, count_rows(pool, contract.table).await?));
        }

        Ok(SeedResult { tables_seeded })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for contract in SEED_TABLES {
            let count = count_rows(pool, contract.table).await?;
            checks.push((contract.table.to_string(), count >= contract.minimum_rows));
        }

        for name in SEED_EQUIPMENT_NAMES {
            let exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM equipment WHERE name = ?1 COLLATE NOCASE)",
            )
            .bind(*name)
            .fetch_one(pool)
            .await?;
            checks.push((format!("equipment:{name}"), exists == 1));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }
}

async fn count_rows(pool: &DbPool, table: &str) -> Result<i64, RepositoryError> {
    let count: i64 =
        sqlx::query_scalar(&format!("SELECT COUNT(1) FROM {table}")).fetch_one(pool).await?;
    Ok(count)
}

struct SeedTableContract {
    table: &'static str,
    minimum_rows: i64,
}

#[derive(Debug)]
pub struct SeedResult {
    pub tables_seeded: Vec<(&'static str, i64)>,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}
