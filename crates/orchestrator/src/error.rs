use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Setup-level failures. These abort a run before anything is scheduled.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Subject not found in catalog: {0}")]
    NotFound(String),

    #[error("Subjects {first:?} and {second:?} share the artifact key {key:?}")]
    KeyCollision {
        first: String,
        second: String,
        key: String,
    },

    #[error("Subject {subject:?} maps to the reserved artifact name {file:?}")]
    ReservedKey { subject: String, file: String },

    #[error("Catalog error: {0}")]
    Catalog(#[from] db::DbError),

    #[error("Artifact store error at {}: {source}", path.display())]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OrchestratorError {
    pub fn store(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Store {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Why a worker's output was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("CSV missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("CSV has header but no data rows")]
    NoDataRows,

    #[error("Invalid CSV: {0}")]
    Malformed(String),
}

/// Per-subject failure. Never aborts the pool; the subject stays pending.
#[derive(Debug, Clone, Error)]
pub enum TaskFailure {
    #[error("Timeout after {:?}", .0)]
    Timeout(Duration),

    #[error("No output file created: {0}")]
    NoOutput(String),

    #[error("{0}")]
    ValidationFailed(#[from] ValidationError),

    #[error("Process error: {0}")]
    ProcessError(String),

    #[error("Commit failed: {0}")]
    CommitFailed(String),
}

impl TaskFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::NoOutput(_) => "no_output",
            Self::ValidationFailed(_) => "validation_failed",
            Self::ProcessError(_) => "process_error",
            Self::CommitFailed(_) => "commit_failed",
        }
    }
}
