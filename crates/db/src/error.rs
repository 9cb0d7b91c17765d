use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Catalog database not found: {}", .0.display())]
    CatalogNotFound(PathBuf),
}
