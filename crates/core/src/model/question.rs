use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{OptionIndex, QuestionId};

/// Smallest number of options a question may offer.
pub const MIN_OPTIONS: usize = 2;
/// Largest number of options a question may offer.
pub const MAX_OPTIONS: usize = 6;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question {id} has empty prompt text")]
    EmptyPrompt { id: QuestionId },

    #[error("question {id} has {count} options, expected 2 to 6")]
    OptionCount { id: QuestionId, count: usize },

    #[error("question {id} has an empty option at position {position}")]
    EmptyOption { id: QuestionId, position: usize },

    #[error("question {id} marks option {correct} correct but only has {count} options")]
    CorrectOutOfRange {
        id: QuestionId,
        correct: OptionIndex,
        count: usize,
    },

    #[error("unknown difficulty: {0}")]
    UnknownDifficulty(String),
}

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(QuestionError::UnknownDifficulty(s.to_string())),
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A single multiple-choice question.
///
/// The correct option is only ever compared by equality; nothing else in the
/// attempt flow needs to look at it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    prompt: String,
    options: Vec<String>,
    correct: OptionIndex,
    difficulty: Option<Difficulty>,
}

impl Question {
    /// Build a validated question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::EmptyPrompt` for blank prompt text,
    /// `QuestionError::OptionCount` when there are not 2 to 6 options,
    /// `QuestionError::EmptyOption` for a blank option, and
    /// `QuestionError::CorrectOutOfRange` when the correct option does not exist.
    pub fn new(
        id: QuestionId,
        prompt: impl Into<String>,
        options: Vec<String>,
        correct: OptionIndex,
        difficulty: Option<Difficulty>,
    ) -> Result<Self, QuestionError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt { id });
        }

        let count = options.len();
        if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&count) {
            return Err(QuestionError::OptionCount { id, count });
        }
        if let Some(position) = options.iter().position(|o| o.trim().is_empty()) {
            return Err(QuestionError::EmptyOption { id, position });
        }
        if correct.position() >= count {
            return Err(QuestionError::CorrectOutOfRange { id, correct, count });
        }

        Ok(Self {
            id,
            prompt,
            options,
            correct,
            difficulty,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct(&self) -> OptionIndex {
        self.correct
    }

    #[must_use]
    pub fn difficulty(&self) -> Option<Difficulty> {
        self.difficulty
    }

    /// Returns true when `choice` matches the correct option.
    #[must_use]
    pub fn is_correct(&self, choice: OptionIndex) -> bool {
        self.correct == choice
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("option {i}")).collect()
    }

    #[test]
    fn accepts_two_to_six_options() {
        for n in MIN_OPTIONS..=MAX_OPTIONS {
            let q = Question::new(QuestionId::new(1), "Q", options(n), OptionIndex::new(0), None);
            assert!(q.is_ok(), "{n} options should be valid");
        }
    }

    #[test]
    fn rejects_too_few_or_too_many_options() {
        let err = Question::new(QuestionId::new(1), "Q", options(1), OptionIndex::new(0), None)
            .unwrap_err();
        assert_eq!(
            err,
            QuestionError::OptionCount {
                id: QuestionId::new(1),
                count: 1
            }
        );
        assert!(
            Question::new(QuestionId::new(1), "Q", options(7), OptionIndex::new(0), None).is_err()
        );
    }

    #[test]
    fn rejects_correct_option_outside_range() {
        let err = Question::new(QuestionId::new(9), "Q", options(4), OptionIndex::new(4), None)
            .unwrap_err();
        assert!(matches!(err, QuestionError::CorrectOutOfRange { count: 4, .. }));
    }

    #[test]
    fn rejects_blank_prompt_and_options() {
        assert!(matches!(
            Question::new(QuestionId::new(1), "  ", options(2), OptionIndex::new(0), None),
            Err(QuestionError::EmptyPrompt { .. })
        ));
        let mut opts = options(3);
        opts[1] = String::new();
        assert!(matches!(
            Question::new(QuestionId::new(1), "Q", opts, OptionIndex::new(0), None),
            Err(QuestionError::EmptyOption { position: 1, .. })
        ));
    }

    #[test]
    fn difficulty_parses_case_insensitively() {
        assert_eq!("hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert_eq!("Medium".parse::<Difficulty>().unwrap(), Difficulty::Medium);
        assert!("impossible".parse::<Difficulty>().is_err());
    }
}
