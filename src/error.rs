//! Error types for the signal engine.

use thiserror::Error;
use uuid::Uuid;

use crate::alerts::AlertAction;
use crate::models::AlertStatus;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Submission rejected before scoring.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unknown category: {0}")]
    UnknownCategory(String),

    #[error("alert not found: {0}")]
    AlertNotFound(Uuid),

    #[error("cannot {action} an alert that is {from}")]
    IllegalTransition { from: AlertStatus, action: AlertAction },

    /// The bounded ingest queue is at capacity.
    #[error("ingest queue is full")]
    QueueFull,

    #[error("ingest pipeline is shut down")]
    PipelineClosed,

    #[error("post already stored: {0}")]
    DuplicatePost(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("configuration error: {0}")]
    Config(String),
}
