use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::model::ids::{OptionIndex, QuestionId, QuizId};

/// Score at or above which an attempt counts as passed.
pub const PASS_MARK_PERCENT: u8 = 50;

/// Graded outcome of one attempt.
///
/// Produced once at submission time and never mutated afterwards; a retry of a
/// failed submission re-sends this same value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionSummary {
    quiz_id: QuizId,
    total: u32,
    answered: u32,
    correct: u32,
    incorrect: u32,
    unanswered: u32,
    score: u8,
    elapsed_seconds: i64,
    duration_seconds: i64,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    answers: BTreeMap<QuestionId, OptionIndex>,
}

/// Counts produced by grading, grouped to keep constructor arity sane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GradeCounts {
    pub total: u32,
    pub answered: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub unanswered: u32,
}

/// Start/end of an attempt plus how much of the allowance was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptTiming {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub elapsed_seconds: i64,
    pub duration_seconds: i64,
}

impl SubmissionSummary {
    /// Build a summary from values the grader already guarantees are consistent.
    pub(crate) fn graded(
        quiz_id: QuizId,
        counts: GradeCounts,
        score: u8,
        timing: AttemptTiming,
        answers: BTreeMap<QuestionId, OptionIndex>,
    ) -> Self {
        Self {
            quiz_id,
            total: counts.total,
            answered: counts.answered,
            correct: counts.correct,
            incorrect: counts.incorrect,
            unanswered: counts.unanswered,
            score,
            elapsed_seconds: timing.elapsed_seconds,
            duration_seconds: timing.duration_seconds,
            started_at: timing.started_at,
            completed_at: timing.completed_at,
            answers,
        }
    }

    #[must_use]
    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub fn answered(&self) -> u32 {
        self.answered
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn incorrect(&self) -> u32 {
        self.incorrect
    }

    #[must_use]
    pub fn unanswered(&self) -> u32 {
        self.unanswered
    }

    /// Integer percentage score, `0..=100`.
    #[must_use]
    pub fn score(&self) -> u8 {
        self.score
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.score >= PASS_MARK_PERCENT
    }

    #[must_use]
    pub fn elapsed_seconds(&self) -> i64 {
        self.elapsed_seconds
    }

    #[must_use]
    pub fn duration_seconds(&self) -> i64 {
        self.duration_seconds
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn answers(&self) -> &BTreeMap<QuestionId, OptionIndex> {
        &self.answers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn summary(correct: u32, incorrect: u32, score: u8) -> SubmissionSummary {
        let counts = GradeCounts {
            total: 2,
            answered: correct + incorrect,
            correct,
            incorrect,
            unanswered: 2 - correct - incorrect,
        };
        let timing = AttemptTiming {
            started_at: fixed_now(),
            completed_at: fixed_now() + chrono::Duration::seconds(10),
            elapsed_seconds: 10,
            duration_seconds: 60,
        };
        SubmissionSummary::graded(QuizId::new(1), counts, score, timing, BTreeMap::new())
    }

    #[test]
    fn pass_mark_is_inclusive() {
        assert!(summary(1, 1, 50).passed());
        assert!(!summary(0, 1, 0).passed());
        assert!(summary(2, 0, 100).passed());
    }
}
