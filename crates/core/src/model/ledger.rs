use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::model::ids::{OptionIndex, QuestionId};
use crate::model::quiz::Quiz;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LedgerError {
    #[error("question {0} does not belong to this quiz")]
    UnknownQuestion(QuestionId),
}

/// Working record of the option chosen for each question.
///
/// The ledger is bound to the question ids of one quiz. Entries are only added
/// or overwritten by explicit selection and are never removed. Entries live in
/// an ordered map so every derived value is independent of answer order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerLedger {
    known: BTreeSet<QuestionId>,
    answers: BTreeMap<QuestionId, OptionIndex>,
}

impl AnswerLedger {
    /// Create an empty ledger for the questions of `quiz`.
    #[must_use]
    pub fn for_quiz(quiz: &Quiz) -> Self {
        Self {
            known: quiz.questions().iter().map(|q| q.id()).collect(),
            answers: BTreeMap::new(),
        }
    }

    /// Record (or replace) the selected option for a question.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::UnknownQuestion` if the question is not part of the bound quiz.
    pub fn set_answer(
        &mut self,
        question_id: QuestionId,
        option: OptionIndex,
    ) -> Result<Option<OptionIndex>, LedgerError> {
        self.ensure_known(question_id)?;
        Ok(self.answers.insert(question_id, option))
    }

    /// Recorded option for a question, `None` while unanswered.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::UnknownQuestion` if the question is not part of the bound quiz.
    pub fn get_answer(&self, question_id: QuestionId) -> Result<Option<OptionIndex>, LedgerError> {
        self.ensure_known(question_id)?;
        Ok(self.answers.get(&question_id).copied())
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn unanswered_count(&self) -> usize {
        self.known.len().saturating_sub(self.answers.len())
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.known.len()
    }

    /// Answered question ids in ascending order.
    #[must_use]
    pub fn answered_question_ids(&self) -> Vec<QuestionId> {
        self.answers.keys().copied().collect()
    }

    /// Raw entries, ordered by question id.
    #[must_use]
    pub fn entries(&self) -> &BTreeMap<QuestionId, OptionIndex> {
        &self.answers
    }

    fn ensure_known(&self, question_id: QuestionId) -> Result<(), LedgerError> {
        if self.known.contains(&question_id) {
            Ok(())
        } else {
            Err(LedgerError::UnknownQuestion(question_id))
        }
    }
}
