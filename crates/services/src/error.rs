//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::SessionError;
use quiz_core::model::ResultRecord;
use storage::repository::StorageError;

/// Errors emitted by quiz services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Domain(#[from] quiz_core::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The session finished but the result sink rejected the record.
    ///
    /// The record is handed back so the caller can retry with
    /// `QuizLoopService::finalize_result`.
    #[error("failed to persist session result: {source}")]
    Persist {
        record: Box<ResultRecord>,
        #[source]
        source: StorageError,
    },
}

impl QuizError {
    /// Take back the unsaved record of a `Persist` failure.
    #[must_use]
    pub fn into_unsaved_result(self) -> Option<ResultRecord> {
        match self {
            QuizError::Persist { record, .. } => Some(*record),
            _ => None,
        }
    }
}
