use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{QuestionId, QuizId};
use crate::model::question::{Question, QuestionError};

const SECONDS_PER_MINUTE: i64 = 60;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz title cannot be empty")]
    EmptyTitle,

    #[error("quiz category cannot be empty")]
    EmptyCategory,

    #[error("duplicate question id {0} in quiz")]
    DuplicateQuestion(QuestionId),

    #[error(transparent)]
    Question(#[from] QuestionError),
}

//
// ─── QUIZ ──────────────────────────────────────────────────────────────────────
//

/// A loaded quiz: metadata plus its ordered question set.
///
/// Quizzes are immutable once built. An empty question list is accepted here so
/// that grading can prove it tolerates the degenerate case; catalogs are
/// expected to reject such quizzes upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quiz {
    id: QuizId,
    title: String,
    category: String,
    subcategory: Option<String>,
    time_limit_minutes: u32,
    questions: Vec<Question>,
}

impl Quiz {
    /// Build a quiz, checking metadata and question-id uniqueness.
    ///
    /// A blank subcategory is normalized to `None`.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::EmptyTitle` / `QuizError::EmptyCategory` for blank metadata and
    /// `QuizError::DuplicateQuestion` if two questions share an id.
    pub fn new(
        id: QuizId,
        title: impl Into<String>,
        category: impl Into<String>,
        subcategory: Option<String>,
        time_limit_minutes: u32,
        questions: Vec<Question>,
    ) -> Result<Self, QuizError> {
        let title = title.into();
        let category = category.into();
        if title.trim().is_empty() {
            return Err(QuizError::EmptyTitle);
        }
        if category.trim().is_empty() {
            return Err(QuizError::EmptyCategory);
        }

        let mut seen = HashSet::with_capacity(questions.len());
        for question in &questions {
            if !seen.insert(question.id()) {
                return Err(QuizError::DuplicateQuestion(question.id()));
            }
        }

        let subcategory = subcategory.filter(|s| !s.trim().is_empty());

        Ok(Self {
            id,
            title,
            category,
            subcategory,
            time_limit_minutes,
            questions,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuizId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    #[must_use]
    pub fn subcategory(&self) -> Option<&str> {
        self.subcategory.as_deref()
    }

    #[must_use]
    pub fn time_limit_minutes(&self) -> u32 {
        self.time_limit_minutes
    }

    /// Configured attempt duration in seconds.
    #[must_use]
    pub fn duration_seconds(&self) -> i64 {
        i64::from(self.time_limit_minutes) * SECONDS_PER_MINUTE
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn find_question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id() == id)
    }

    #[must_use]
    pub fn contains_question(&self, id: QuestionId) -> bool {
        self.find_question(id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OptionIndex;

    fn question(id: u64) -> Question {
        Question::new(
            QuestionId::new(id),
            format!("Q{id}"),
            vec!["a".into(), "b".into()],
            OptionIndex::new(0),
            None,
        )
        .unwrap()
    }

    #[test]
    fn duration_is_minutes_times_sixty() {
        let quiz = Quiz::new(QuizId::new(1), "T", "Science", None, 3, vec![question(1)]).unwrap();
        assert_eq!(quiz.duration_seconds(), 180);
    }

    #[test]
    fn rejects_duplicate_question_ids() {
        let err = Quiz::new(
            QuizId::new(1),
            "T",
            "Science",
            None,
            5,
            vec![question(1), question(1)],
        )
        .unwrap_err();
        assert_eq!(err, QuizError::DuplicateQuestion(QuestionId::new(1)));
    }

    #[test]
    fn blank_subcategory_becomes_none() {
        let quiz = Quiz::new(
            QuizId::new(1),
            "T",
            "Science",
            Some("  ".into()),
            5,
            vec![question(1)],
        )
        .unwrap();
        assert_eq!(quiz.subcategory(), None);
    }

    #[test]
    fn finds_questions_by_id() {
        let quiz = Quiz::new(
            QuizId::new(1),
            "T",
            "Science",
            Some("Physics".into()),
            5,
            vec![question(10), question(20)],
        )
        .unwrap();
        assert!(quiz.contains_question(QuestionId::new(20)));
        assert!(!quiz.contains_question(QuestionId::new(30)));
        assert_eq!(quiz.question(1).unwrap().id(), QuestionId::new(20));
    }
}
