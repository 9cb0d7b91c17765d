use crate::error::DbError;
use crate::models::CatalogRow;
use research_core::CatalogEntry;
use sqlx::SqlitePool;
use tracing::warn;

/// Read-only view over the platform catalog.
#[derive(Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Every platform with its game count, ascending by name.
    pub async fn subjects_with_weight(&self) -> Result<Vec<CatalogEntry>, DbError> {
        let rows: Vec<CatalogRow> = sqlx::query_as(
            r#"
            SELECT p.name AS name, COUNT(g.id) AS weight
            FROM platforms p
            LEFT JOIN games g ON g.platform_id = p.id
            GROUP BY p.name
            ORDER BY p.name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let name = row.name.clone();
                let entry = row.into_domain();
                if entry.is_none() {
                    warn!(name = %name, "Skipping catalog entry without a usable name");
                }
                entry
            })
            .collect())
    }
}
