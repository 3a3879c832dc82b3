mod ids;
mod ledger;
mod payload;
mod question;
mod quiz;
mod summary;

pub use ids::{OptionIndex, ParseIdError, QuestionId, QuizId, ResultId};

pub use ledger::{AnswerLedger, LedgerError};
pub use payload::{PayloadError, SubmissionPayload};
pub use question::{Difficulty, MAX_OPTIONS, MIN_OPTIONS, Question, QuestionError};
pub use quiz::{Quiz, QuizError};
pub use summary::{AttemptTiming, GradeCounts, PASS_MARK_PERCENT, SubmissionSummary};
