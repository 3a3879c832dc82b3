use thiserror::Error;

use crate::model::{LedgerError, PayloadError, QuestionError, QuizError};
use crate::timer::TimerError;

/// Umbrella error for callers that do not care which domain rule failed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    Timer(#[from] TimerError),
}
