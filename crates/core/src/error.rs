use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Subject name has no filesystem-safe characters: {0:?}")]
    InvalidSubject(String),

    #[error("Unknown research profile: {0}")]
    UnknownProfile(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
