use thiserror::Error;

use crate::client::ApiError;

/// Input rejected before any network call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("search query is empty")]
    EmptyQuery,

    #[error("year range is inverted: {start} > {end}")]
    InvalidYearRange { start: i32, end: i32 },

    #[error("no papers match the current filters")]
    NoCandidates,

    #[error("no papers are selected")]
    NothingSelected,

    #[error("unknown item: {0}")]
    UnknownItem(String),
}

/// Errors from engine operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("a bulk ingestion is already in progress")]
    BatchInProgress,

    #[error("no bulk ingestion is awaiting confirmation")]
    NotConfirming,
}

impl SyncError {
    /// Server-provided hint for the user, if any
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            SyncError::Api(err) => err.suggestion(),
            _ => None,
        }
    }
}
