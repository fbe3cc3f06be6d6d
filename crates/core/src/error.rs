use thiserror::Error;

use crate::model::{CatalogError, QuestionError, ResultRecordError};
use crate::session::SessionError;

/// Any domain error raised by this crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Result(#[from] ResultRecordError),
    #[error(transparent)]
    Session(#[from] SessionError),
}
