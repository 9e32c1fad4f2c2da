use thiserror::Error;

use crate::services::session_context::SessionError;

/// Failures of the exam flow, independent of the HTTP surface.
#[derive(Debug, Error)]
pub(crate) enum FlowError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    InvalidSessionContext(&'static str),
    #[error("{0}")]
    MalformedInput(String),
    #[error("attempt is no longer in progress")]
    AttemptClosed,
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
    #[error(transparent)]
    Session(#[from] SessionError),
}
