#![forbid(unsafe_code)]

pub mod attempt;
pub mod error;
pub mod remote;

pub use quiz_core::Clock;

pub use error::{RemoteError, SessionError};
pub use remote::{ApiConfig, HttpQuizApi};

pub use attempt::{
    AttemptHandle, AttemptLoopService, AttemptOutcome, AttemptProgress, AttemptSession,
    AttemptState, QuestionView, SubmitOutcome, SubmitRequest, SubmitTrigger,
};
