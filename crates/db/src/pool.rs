use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;

use crate::error::DbError;

/// In-memory or scratch databases for tests.
#[cfg(test)]
pub(crate) async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    use std::str::FromStr;

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(30));

    // Every connection to `:memory:` is its own database.
    let max_connections = if database_url.contains(":memory:") { 1 } else { 4 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Open the subject catalog read-only. The catalog belongs to another
/// application, so it is never created or migrated here.
pub async fn open_catalog(path: &Path) -> Result<SqlitePool, DbError> {
    if !path.is_file() {
        return Err(DbError::CatalogNotFound(path.to_path_buf()));
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .read_only(true)
        .create_if_missing(false)
        .busy_timeout(Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await?;

    tracing::debug!(path = %path.display(), "Opened catalog database");
    Ok(pool)
}
