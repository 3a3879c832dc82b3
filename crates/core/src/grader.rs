//! Pure grading of a finished answer ledger.

use chrono::{DateTime, Utc};

use crate::model::{AnswerLedger, AttemptTiming, GradeCounts, Quiz, SubmissionSummary};

/// Integer percentage of `correct` out of `total`, rounded half up.
///
/// Returns 0 when `total` is 0.
#[must_use]
pub fn percentage(correct: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let correct = u64::from(correct.min(total));
    let total = u64::from(total);
    // (c * 100 + t / 2) / t without losing the half on odd totals.
    let rounded = (correct * 200 + total) / (total * 2);
    u8::try_from(rounded).unwrap_or(100)
}

/// Grade `ledger` against `quiz`.
///
/// Questions without an entry count as unanswered, never incorrect. The
/// elapsed time is clamped to `[0, duration]` and `completed_at` never
/// precedes `started_at`, so the result always satisfies the summary
/// invariants. Grading the same inputs twice yields equal summaries.
#[must_use]
pub fn grade(
    quiz: &Quiz,
    ledger: &AnswerLedger,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    elapsed_seconds: i64,
) -> SubmissionSummary {
    let mut counts = GradeCounts::default();

    for question in quiz.questions() {
        counts.total = counts.total.saturating_add(1);
        match ledger.get_answer(question.id()) {
            Ok(Some(choice)) => {
                counts.answered = counts.answered.saturating_add(1);
                if question.is_correct(choice) {
                    counts.correct = counts.correct.saturating_add(1);
                } else {
                    counts.incorrect = counts.incorrect.saturating_add(1);
                }
            }
            Ok(None) | Err(_) => counts.unanswered = counts.unanswered.saturating_add(1),
        }
    }

    let duration_seconds = quiz.duration_seconds().max(0);
    let timing = AttemptTiming {
        started_at,
        completed_at: completed_at.max(started_at),
        elapsed_seconds: elapsed_seconds.clamp(0, duration_seconds),
        duration_seconds,
    };

    let answers = ledger
        .entries()
        .iter()
        .filter(|(id, _)| quiz.contains_question(**id))
        .map(|(id, option)| (*id, *option))
        .collect();

    SubmissionSummary::graded(
        quiz.id(),
        counts,
        percentage(counts.correct, counts.total),
        timing,
        answers,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OptionIndex, Question, QuestionId, QuizId};
    use crate::time::fixed_now;
    use chrono::Duration;

    fn quiz(n: u64, minutes: u32) -> Quiz {
        let questions = (1..=n)
            .map(|id| {
                Question::new(
                    QuestionId::new(id),
                    format!("Q{id}"),
                    vec!["a".into(), "b".into(), "c".into(), "d".into()],
                    OptionIndex::new(2),
                    None,
                )
                .unwrap()
            })
            .collect();
        Quiz::new(QuizId::new(1), "Quiz", "General", None, minutes, questions).unwrap()
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 2), 50);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(1, 8), 13);
        assert_eq!(percentage(0, 5), 0);
        assert_eq!(percentage(5, 5), 100);
    }

    #[test]
    fn percentage_of_empty_quiz_is_zero() {
        assert_eq!(percentage(0, 0), 0);
        let empty = Quiz::new(QuizId::new(2), "Empty", "General", None, 1, Vec::new()).unwrap();
        let summary = grade(
            &empty,
            &AnswerLedger::for_quiz(&empty),
            fixed_now(),
            fixed_now(),
            0,
        );
        assert_eq!(summary.total(), 0);
        assert_eq!(summary.score(), 0);
    }

    #[test]
    fn unanswered_is_never_counted_incorrect() {
        let quiz = quiz(3, 1);
        let mut ledger = AnswerLedger::for_quiz(&quiz);
        ledger
            .set_answer(QuestionId::new(1), OptionIndex::new(2))
            .unwrap();
        ledger
            .set_answer(QuestionId::new(2), OptionIndex::new(0))
            .unwrap();

        let summary = grade(&quiz, &ledger, fixed_now(), fixed_now(), 10);
        assert_eq!(summary.correct(), 1);
        assert_eq!(summary.incorrect(), 1);
        assert_eq!(summary.unanswered(), 1);
        assert_eq!(summary.answered() + summary.unanswered(), summary.total());
        assert_eq!(summary.score(), 33);
    }

    #[test]
    fn grading_twice_is_identical() {
        let quiz = quiz(4, 2);
        let mut ledger = AnswerLedger::for_quiz(&quiz);
        for (id, opt) in [(4, 2), (2, 1), (3, 2)] {
            ledger
                .set_answer(QuestionId::new(id), OptionIndex::new(opt))
                .unwrap();
        }
        let done = fixed_now() + Duration::seconds(30);
        let first = grade(&quiz, &ledger, fixed_now(), done, 30);
        let second = grade(&quiz, &ledger, fixed_now(), done, 30);
        assert_eq!(first, second);
    }

    #[test]
    fn answer_order_does_not_matter() {
        let quiz = quiz(3, 1);
        let mut forward = AnswerLedger::for_quiz(&quiz);
        let mut backward = AnswerLedger::for_quiz(&quiz);
        for id in 1..=3 {
            forward
                .set_answer(QuestionId::new(id), OptionIndex::new(2))
                .unwrap();
        }
        for id in (1..=3).rev() {
            backward
                .set_answer(QuestionId::new(id), OptionIndex::new(2))
                .unwrap();
        }
        assert_eq!(
            grade(&quiz, &forward, fixed_now(), fixed_now(), 5),
            grade(&quiz, &backward, fixed_now(), fixed_now(), 5)
        );
    }

    #[test]
    fn elapsed_is_clamped_to_duration() {
        let quiz = quiz(1, 1);
        let ledger = AnswerLedger::for_quiz(&quiz);
        assert_eq!(
            grade(&quiz, &ledger, fixed_now(), fixed_now(), 500).elapsed_seconds(),
            60
        );
        assert_eq!(
            grade(&quiz, &ledger, fixed_now(), fixed_now(), -3).elapsed_seconds(),
            0
        );
    }

    #[test]
    fn reversed_timestamps_are_normalized() {
        let quiz = quiz(1, 1);
        let ledger = AnswerLedger::for_quiz(&quiz);
        let summary = grade(
            &quiz,
            &ledger,
            fixed_now(),
            fixed_now() - Duration::seconds(5),
            0,
        );
        assert_eq!(summary.completed_at(), summary.started_at());
    }
}
