//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{LedgerError, OptionIndex, QuestionId};
use quiz_core::timer::TimerError;
use storage::repository::{CatalogError, GatewayError};

use crate::attempt::AttemptState;

/// Errors emitted by attempt sessions and the attempt driver.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    /// The quiz could not be loaded; no attempt exists.
    #[error("failed to load quiz: {0}")]
    Fetch(#[from] CatalogError),

    /// The answer names a question outside the quiz.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("option {option} is out of range for question {question_id}")]
    OptionOutOfRange {
        question_id: QuestionId,
        option: OptionIndex,
    },

    /// The gateway rejected the submission or could not be reached.
    #[error("failed to submit attempt: {0}")]
    Submission(#[from] GatewayError),

    #[error(transparent)]
    Timer(#[from] TimerError),

    #[error("cannot {operation} while the attempt is {state}")]
    InvalidState {
        operation: &'static str,
        state: AttemptState,
    },

    /// The driver task has finished and no longer accepts commands.
    #[error("attempt driver has stopped")]
    DriverStopped,
}

/// Errors emitted while building the HTTP client for the remote quiz API.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RemoteError {
    #[error("invalid quiz API base url: {0}")]
    InvalidBaseUrl(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
