use thiserror::Error;

/// Caller-input errors raised by the scheduler before any state is touched.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SchedulerError {
    /// Rating outside 1..=4
    #[error("invalid rating {0}: expected 1 (again), 2 (hard), 3 (good) or 4 (easy)")]
    InvalidRating(u8),
    /// Desired retention outside the open interval (0, 1)
    #[error("invalid desired retention {0}: must be strictly between 0 and 1")]
    InvalidConfig(f64),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Errors mapping storage rows and deck files to review states.
#[derive(Debug, Error)]
pub enum RowError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Review history column is not valid history JSON
    #[error("invalid review history: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown difficulty level: {0}")]
    UnknownDifficulty(String),
    #[error("unknown drill kind: {0}")]
    UnknownDrill(String),
    #[error("unknown card direction: {0}")]
    UnknownDirection(String),
    #[error("invalid {column} value: {value:?}")]
    InvalidField { column: &'static str, value: String },
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
