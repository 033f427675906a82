use std::collections::HashSet;

use serde::Serialize;
use sqlx::{Column, Row, SqliteConnection, TypeInfo, ValueRef};

use super::{ReadOnlyQueryRepository, RepositoryError};
use crate::DbPool;

/// Tables a details lookup may read. `run` refuses any statement whose compiled program opens
/// another b-tree, so checkpoints and the schema catalog stay out of reach.
const QUERYABLE_TABLES: &[&str] =
    &["equipment", "labour", "project_request", "equipment_request", "project_history"];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl QueryRows {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Renders rows as `column=value` lines for the phrasing prompt.
    pub fn to_prompt_text(&self) -> String {
        if self.rows.is_empty() {
            return "(no rows)".to_string();
        }

        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(column, value)| format!("{column}={value}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub struct SqlReadOnlyQuery {
    pool: DbPool,
}

impl SqlReadOnlyQuery {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn cell_to_string(row: &sqlx::sqlite::SqliteRow, index: usize) -> Result<String, RepositoryError> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok("NULL".to_string());
    }

    let type_name = raw.type_info().name().to_ascii_uppercase();
    let value = match type_name.as_str() {
        "INTEGER" | "INT8" | "BIGINT" | "BOOLEAN" => {
            row.try_get_unchecked::<i64, _>(index)?.to_string()
        }
        "REAL" | "NUMERIC" => row.try_get_unchecked::<f64, _>(index)?.to_string(),
        _ => row.try_get_unchecked::<String, _>(index)?,
    };
    Ok(value)
}

/// Root pages of the queryable tables and of every index defined on them.
async fn allowed_root_pages(conn: &mut SqliteConnection) -> Result<HashSet<i64>, RepositoryError> {
    let placeholders = vec!["?"; QUERYABLE_TABLES.len()].join(", ");
    let sql = format!(
        "SELECT rootpage FROM sqlite_master WHERE rootpage > 0 AND tbl_name IN ({placeholders})"
    );
    let mut query = sqlx::query_scalar::<_, i64>(&sql);
    for table in QUERYABLE_TABLES {
        query = query.bind(*table);
    }
    Ok(query.fetch_all(conn).await?.into_iter().collect())
}

/// Walks the bytecode of `statement` and rejects cursors outside the allowed b-trees.
async fn enforce_table_allowlist(
    conn: &mut SqliteConnection,
    statement: &str,
) -> Result<(), RepositoryError> {
    let allowed = allowed_root_pages(&mut *conn).await?;
    let program = sqlx::query(&format!("EXPLAIN {statement}")).fetch_all(&mut *conn).await?;

    for instruction in &program {
        let opcode: String = instruction.try_get_unchecked("opcode")?;
        let root_page: i64 = instruction.try_get_unchecked("p2")?;
        let database: i64 = instruction.try_get_unchecked("p3")?;
        match opcode.as_str() {
            "OpenRead" | "ReopenIdx" if database == 0 && allowed.contains(&root_page) => {}
            "OpenRead" | "ReopenIdx" | "OpenWrite" | "VOpen" => {
                return Err(RepositoryError::Forbidden(format!(
                    "statement reads outside the queryable tables ({opcode} on page {root_page})"
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

#[async_trait::async_trait]
impl ReadOnlyQueryRepository for SqlReadOnlyQuery {
    async fn schema_summary(&self) -> Result<String, RepositoryError> {
        let mut statements = Vec::with_capacity(QUERYABLE_TABLES.len());
        for table in QUERYABLE_TABLES {
            let sql: Option<String> = sqlx::query_scalar(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(*table)
            .fetch_optional(&self.pool)
            .await?;
            if let Some(sql) = sql {
                statements.push(format!("{sql};"));
            }
        }

        Ok(statements.join("\n\n"))
    }

    async fn run(&self, sql: &str, row_limit: u32) -> Result<QueryRows, RepositoryError> {
        let statement = sql.trim().trim_end_matches(';').trim();
        let bounded = format!("SELECT * FROM ({statement}) LIMIT {}", row_limit.max(1));

        let mut tx = self.pool.begin().await?;
        enforce_table_allowlist(&mut tx, &bounded).await?;
        let rows = sqlx::query(&bounded).fetch_all(&mut *tx).await?;
        tx.rollback().await?;

        let columns: Vec<String> = rows
            .first()
            .map(|row| row.columns().iter().map(|column| column.name().to_string()).collect())
            .unwrap_or_default();

        let rows = rows
            .iter()
            .map(|row| (0..row.len()).map(|index| cell_to_string(row, index)).collect())
            .collect::<Result<Vec<Vec<String>>, RepositoryError>>()?;

        Ok(QueryRows { columns, rows })
    }
}
