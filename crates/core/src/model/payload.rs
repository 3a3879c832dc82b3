use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::model::ids::{OptionIndex, QuestionId, QuizId};
use crate::model::quiz::Quiz;
use crate::model::summary::SubmissionSummary;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PayloadError {
    #[error("question counts do not add up: {0}")]
    Counts(String),

    #[error("score {0} is outside 0..=100")]
    Score(u32),

    #[error("time taken {taken}s is outside 0..={duration}s")]
    TimeTaken { taken: i64, duration: i64 },

    #[error("completedAt is before startedAt")]
    TimeRange,

    #[error("answer map has {entries} entries but answeredQuestions is {answered}")]
    AnswerMap { entries: usize, answered: u32 },

    #[error("invalid answer entry {key:?} -> {value:?}")]
    AnswerEntry { key: String, value: String },
}

/// Wire shape sent to a submission gateway.
///
/// Field names follow the REST API (`camelCase`); the answer map is keyed by
/// the question id rendered as a string and holds the option index as a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub quiz_id: QuizId,
    pub category: String,
    pub subcategory: String,
    pub total_questions: u32,
    pub answered_questions: u32,
    pub correct_answers: u32,
    pub incorrect_answers: u32,
    pub unanswered_questions: u32,
    pub score: u32,
    pub time_taken: i64,
    pub duration: i64,
    pub user_answers: BTreeMap<String, String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl SubmissionPayload {
    /// Map a graded summary into the wire payload for its quiz.
    #[must_use]
    pub fn assemble(quiz: &Quiz, summary: &SubmissionSummary) -> Self {
        let user_answers = summary
            .answers()
            .iter()
            .map(|(question, option)| (question.to_string(), option.to_string()))
            .collect();

        Self {
            quiz_id: summary.quiz_id(),
            category: quiz.category().to_string(),
            subcategory: quiz.subcategory().unwrap_or_default().to_string(),
            total_questions: summary.total(),
            answered_questions: summary.answered(),
            correct_answers: summary.correct(),
            incorrect_answers: summary.incorrect(),
            unanswered_questions: summary.unanswered(),
            score: u32::from(summary.score()),
            time_taken: summary.elapsed_seconds(),
            duration: summary.duration_seconds(),
            user_answers,
            started_at: summary.started_at(),
            completed_at: summary.completed_at(),
        }
    }

    /// Check the payload is internally consistent before it is accepted.
    ///
    /// # Errors
    ///
    /// Returns `PayloadError` describing the first inconsistency found.
    pub fn validate(&self) -> Result<(), PayloadError> {
        if self.answered_questions.saturating_add(self.unanswered_questions) != self.total_questions
        {
            return Err(PayloadError::Counts(format!(
                "answered {} + unanswered {} != total {}",
                self.answered_questions, self.unanswered_questions, self.total_questions
            )));
        }
        if self.correct_answers.saturating_add(self.incorrect_answers) != self.answered_questions {
            return Err(PayloadError::Counts(format!(
                "correct {} + incorrect {} != answered {}",
                self.correct_answers, self.incorrect_answers, self.answered_questions
            )));
        }
        if self.score > 100 {
            return Err(PayloadError::Score(self.score));
        }
        if self.time_taken < 0 || self.time_taken > self.duration.max(0) {
            return Err(PayloadError::TimeTaken {
                taken: self.time_taken,
                duration: self.duration,
            });
        }
        if self.completed_at < self.started_at {
            return Err(PayloadError::TimeRange);
        }
        let entries = self.user_answers.len();
        if u32::try_from(entries).ok() != Some(self.answered_questions) {
            return Err(PayloadError::AnswerMap {
                entries,
                answered: self.answered_questions,
            });
        }
        self.parsed_answers().map(|_| ())
    }

    /// Decode the answer map back into typed ids.
    ///
    /// # Errors
    ///
    /// Returns `PayloadError::AnswerEntry` for a key or value that is not a number.
    pub fn parsed_answers(&self) -> Result<Vec<(QuestionId, OptionIndex)>, PayloadError> {
        self.user_answers
            .iter()
            .map(|(key, value)| {
                let entry_err = || PayloadError::AnswerEntry {
                    key: key.clone(),
                    value: value.clone(),
                };
                let question = key.parse::<QuestionId>().map_err(|_| entry_err())?;
                let option = value.parse::<OptionIndex>().map_err(|_| entry_err())?;
                Ok((question, option))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grader::grade;
    use crate::model::{AnswerLedger, Question};
    use crate::time::fixed_now;

    fn quiz() -> Quiz {
        let questions = (1..=2)
            .map(|id| {
                Question::new(
                    QuestionId::new(id),
                    format!("Q{id}"),
                    vec!["a".into(), "b".into(), "c".into(), "d".into()],
                    OptionIndex::new(1),
                    None,
                )
                .unwrap()
            })
            .collect();
        Quiz::new(QuizId::new(7), "Capitals", "Geography", None, 1, questions).unwrap()
    }

    fn payload() -> SubmissionPayload {
        let quiz = quiz();
        let mut ledger = AnswerLedger::for_quiz(&quiz);
        ledger
            .set_answer(QuestionId::new(1), OptionIndex::new(1))
            .unwrap();
        let completed = fixed_now() + chrono::Duration::seconds(45);
        let summary = grade(&quiz, &ledger, fixed_now(), completed, 45);
        SubmissionPayload::assemble(&quiz, &summary)
    }

    #[test]
    fn serializes_with_api_field_names() {
        let json = serde_json::to_value(payload()).unwrap();
        assert_eq!(json["quizId"], 7);
        assert_eq!(json["category"], "Geography");
        assert_eq!(json["subcategory"], "");
        assert_eq!(json["totalQuestions"], 2);
        assert_eq!(json["answeredQuestions"], 1);
        assert_eq!(json["unansweredQuestions"], 1);
        assert_eq!(json["score"], 50);
        assert_eq!(json["timeTaken"], 45);
        assert_eq!(json["duration"], 60);
        assert_eq!(json["userAnswers"]["1"], "1");
        assert_eq!(json["startedAt"], "2023-11-14T22:13:20Z");
        assert_eq!(json["completedAt"], "2023-11-14T22:14:05Z");
    }

    #[test]
    fn assembled_payload_validates() {
        assert_eq!(payload().validate(), Ok(()));
    }

    #[test]
    fn tampered_counts_fail_validation() {
        let mut p = payload();
        p.correct_answers = 2;
        assert!(matches!(p.validate(), Err(PayloadError::Counts(_))));
    }

    #[test]
    fn non_numeric_answer_fails_validation() {
        let mut p = payload();
        p.user_answers.clear();
        p.user_answers.insert("1".into(), "B".into());
        assert!(matches!(
            p.validate(),
            Err(PayloadError::AnswerEntry { .. })
        ));
    }
}
