use quiz_core::format_remaining;
use quiz_core::model::{OptionIndex, QuestionId, QuizId, ResultId};

use super::session::AttemptState;

/// The question under the cursor, without its correct option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionView {
    pub id: QuestionId,
    pub prompt: String,
    pub options: Vec<String>,
    pub selected: Option<OptionIndex>,
}

/// Aggregated view of attempt progress, published after every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptProgress {
    pub quiz_id: QuizId,
    pub state: AttemptState,
    pub cursor: usize,
    pub total: usize,
    pub answered: usize,
    pub unanswered: usize,
    pub remaining_seconds: u32,
    pub running_low: bool,
    pub current: Option<QuestionView>,
    pub score: Option<u8>,
    pub result_id: Option<ResultId>,
    pub failure: Option<String>,
}

impl AttemptProgress {
    /// Placeholder published before the session is known.
    #[must_use]
    pub fn loading(quiz_id: QuizId) -> Self {
        Self {
            quiz_id,
            state: AttemptState::Loading,
            cursor: 0,
            total: 0,
            answered: 0,
            unanswered: 0,
            remaining_seconds: 0,
            running_low: false,
            current: None,
            score: None,
            result_id: None,
            failure: None,
        }
    }

    /// Countdown rendered as `4m 10s`.
    #[must_use]
    pub fn remaining_label(&self) -> String {
        format_remaining(self.remaining_seconds)
    }

    /// One-based position label such as `2/5`.
    #[must_use]
    pub fn position_label(&self) -> String {
        if self.total == 0 {
            return "0/0".to_string();
        }
        format!("{}/{}", self.cursor + 1, self.total)
    }
}
