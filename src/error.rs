use std::time::Duration;

use thiserror::Error;

/// Failures of the storage and image collaborators.
///
/// The classification code never produces these; callers report them to
/// the operator and fall back to empty results.
#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("fetch aborted after {0:?}")]
    Timeout(Duration),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, ReviewError>;
