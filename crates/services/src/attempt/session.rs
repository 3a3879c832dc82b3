use chrono::{DateTime, Utc};
use std::fmt;

use quiz_core::model::{
    AnswerLedger, OptionIndex, Question, QuestionId, Quiz, QuizId, ResultId, SubmissionPayload,
    SubmissionSummary,
};
use quiz_core::{CountdownTimer, TickEvent, grade};
use storage::repository::{CatalogError, GatewayError, QuizCatalog, SubmissionGateway};

use super::progress::{AttemptProgress, QuestionView};
use crate::error::SessionError;

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

/// Lifecycle of one attempt.
///
/// `Loading -> Ready -> Running -> Submitting -> Submitted`, with `Errored`
/// reachable from `Loading` and `Submitting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttemptState {
    Loading,
    Ready,
    Running,
    Submitting,
    Submitted,
    Errored,
}

impl AttemptState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptState::Loading => "loading",
            AttemptState::Ready => "ready",
            AttemptState::Running => "running",
            AttemptState::Submitting => "submitting",
            AttemptState::Submitted => "submitted",
            AttemptState::Errored => "errored",
        }
    }
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What caused the attempt to leave `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    User,
    Expired,
}

/// Result of asking the session to begin submitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRequest {
    /// This call moved the attempt into `Submitting`.
    Started,
    /// A submission was already begun; nothing changed.
    Duplicate,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// State machine for a single timed attempt.
///
/// The session never performs I/O on its own except in [`AttemptSession::load`]
/// and [`AttemptSession::deliver`]; ticks and timestamps are supplied by the
/// caller so the whole lifecycle can be driven deterministically.
#[derive(Debug)]
pub struct AttemptSession {
    quiz_id: QuizId,
    state: AttemptState,
    quiz: Option<Quiz>,
    ledger: Option<AnswerLedger>,
    timer: CountdownTimer,
    cursor: usize,
    started_at: Option<DateTime<Utc>>,
    trigger: Option<SubmitTrigger>,
    summary: Option<SubmissionSummary>,
    payload: Option<SubmissionPayload>,
    result_id: Option<ResultId>,
    failure: Option<SessionError>,
}

impl AttemptSession {
    /// A session waiting for its quiz.
    #[must_use]
    pub fn new(quiz_id: QuizId) -> Self {
        Self {
            quiz_id,
            state: AttemptState::Loading,
            quiz: None,
            ledger: None,
            timer: CountdownTimer::new(),
            cursor: 0,
            started_at: None,
            trigger: None,
            summary: None,
            payload: None,
            result_id: None,
            failure: None,
        }
    }

    /// Fetch the quiz from `catalog` and settle into `Ready` or `Errored`.
    pub async fn load(quiz_id: QuizId, catalog: &dyn QuizCatalog) -> Self {
        let mut session = Self::new(quiz_id);
        let fetched = catalog.fetch_quiz(quiz_id).await;
        session.finish_loading(fetched);
        session
    }

    /// Apply the outcome of the catalog fetch. Ignored unless `Loading`.
    pub fn finish_loading(&mut self, fetched: Result<Quiz, CatalogError>) {
        if self.state != AttemptState::Loading {
            return;
        }

        match fetched {
            Ok(quiz) if quiz.id() != self.quiz_id => {
                self.fail(SessionError::Fetch(CatalogError::Validation(format!(
                    "requested quiz {} but received quiz {}",
                    self.quiz_id,
                    quiz.id()
                ))));
            }
            Ok(quiz) => {
                tracing::debug!(
                    quiz_id = %self.quiz_id,
                    questions = quiz.question_count(),
                    "quiz loaded"
                );
                self.ledger = Some(AnswerLedger::for_quiz(&quiz));
                self.quiz = Some(quiz);
                self.state = AttemptState::Ready;
            }
            Err(err) => {
                tracing::warn!(quiz_id = %self.quiz_id, error = %err, "quiz could not be loaded");
                self.fail(SessionError::Fetch(err));
            }
        }
    }

    //
    // ─── ACCESSORS ─────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    #[must_use]
    pub fn state(&self) -> AttemptState {
        self.state
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> u32 {
        self.timer.remaining()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.quiz.as_ref().and_then(|quiz| quiz.question(self.cursor))
    }

    /// How the attempt left `Running`, once it has.
    #[must_use]
    pub fn trigger(&self) -> Option<SubmitTrigger> {
        self.trigger
    }

    /// Graded summary, available from `Submitting` onwards and kept on failure.
    #[must_use]
    pub fn summary(&self) -> Option<&SubmissionSummary> {
        self.summary.as_ref()
    }

    #[must_use]
    pub fn result_id(&self) -> Option<ResultId> {
        self.result_id
    }

    /// Reason the attempt is `Errored`.
    #[must_use]
    pub fn failure(&self) -> Option<&SessionError> {
        self.failure.as_ref()
    }

    /// Whether an `Errored` attempt holds a summary that can be re-sent.
    #[must_use]
    pub fn can_retry(&self) -> bool {
        self.state == AttemptState::Errored && self.payload.is_some()
    }

    /// Submission waiting to be handed to the gateway.
    #[must_use]
    pub fn pending_submission(&self) -> Option<&SubmissionPayload> {
        match self.state {
            AttemptState::Submitting => self.payload.as_ref(),
            _ => None,
        }
    }

    /// Snapshot for display.
    #[must_use]
    pub fn progress(&self) -> AttemptProgress {
        let total = self.ledger.as_ref().map_or(0, AnswerLedger::question_count);
        let answered = self.ledger.as_ref().map_or(0, AnswerLedger::answered_count);
        let unanswered = self.ledger.as_ref().map_or(0, AnswerLedger::unanswered_count);
        let current = self.current_question().map(|question| QuestionView {
            id: question.id(),
            prompt: question.prompt().to_string(),
            options: question.options().to_vec(),
            selected: self
                .ledger
                .as_ref()
                .and_then(|ledger| ledger.get_answer(question.id()).ok().flatten()),
        });

        AttemptProgress {
            quiz_id: self.quiz_id,
            state: self.state,
            cursor: self.cursor,
            total,
            answered,
            unanswered,
            remaining_seconds: self.remaining_seconds(),
            running_low: self.timer.is_running_low(),
            current,
            score: self.summary.as_ref().map(SubmissionSummary::score),
            result_id: self.result_id,
            failure: self.failure.as_ref().map(ToString::to_string),
        }
    }

    //
    // ─── RUNNING ───────────────────────────────────────────────────────────────
    //

    /// Begin the countdown.
    ///
    /// A quiz with no time allowance expires at once; the returned
    /// `TickEvent::Expired` then means the attempt is already `Submitting`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` unless the attempt is `Ready`.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<TickEvent, SessionError> {
        self.ensure_state("start", AttemptState::Ready)?;
        let duration = self.quiz.as_ref().map_or(0, Quiz::duration_seconds);

        let event = self.timer.start(duration)?;
        self.started_at = Some(now);
        self.state = AttemptState::Running;
        tracing::info!(quiz_id = %self.quiz_id, remaining = duration, "attempt started");

        if event == TickEvent::Expired {
            self.begin_submission(SubmitTrigger::Expired, now);
        }
        Ok(event)
    }

    /// Advance the countdown by one second, submitting on expiry.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickEvent {
        if self.state != AttemptState::Running {
            return TickEvent::Ignored;
        }

        let event = self.timer.tick();
        if event == TickEvent::Expired {
            tracing::info!(quiz_id = %self.quiz_id, "time is up");
            self.begin_submission(SubmitTrigger::Expired, now);
        }
        event
    }

    /// Record the chosen option for a question, returning the one it replaced.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` unless `Running`,
    /// `SessionError::Ledger` for a question outside the quiz, and
    /// `SessionError::OptionOutOfRange` for an option the question does not have.
    pub fn record_answer(
        &mut self,
        question_id: QuestionId,
        option: OptionIndex,
    ) -> Result<Option<OptionIndex>, SessionError> {
        self.ensure_state("record an answer", AttemptState::Running)?;

        let option_count = self
            .quiz
            .as_ref()
            .and_then(|quiz| quiz.find_question(question_id))
            .map(|question| question.options().len());
        if option_count.is_some_and(|count| option.position() >= count) {
            return Err(SessionError::OptionOutOfRange {
                question_id,
                option,
            });
        }

        let ledger = self.ledger.as_mut().ok_or(SessionError::InvalidState {
            operation: "record an answer",
            state: self.state,
        })?;
        Ok(ledger.set_answer(question_id, option)?)
    }

    /// Record an answer for the question under the cursor.
    ///
    /// # Errors
    ///
    /// Same as [`AttemptSession::record_answer`].
    pub fn answer_current(&mut self, option: OptionIndex) -> Result<Option<OptionIndex>, SessionError> {
        let question_id = self
            .current_question()
            .map(Question::id)
            .ok_or(SessionError::InvalidState {
                operation: "record an answer",
                state: self.state,
            })?;
        self.record_answer(question_id, option)
    }

    /// Move to the next question; stays put on the last one.
    pub fn go_to_next(&mut self) -> usize {
        let next = self.cursor.saturating_add(1);
        self.go_to(next)
    }

    /// Move to the previous question; stays put on the first one.
    pub fn go_to_previous(&mut self) -> usize {
        let previous = self.cursor.saturating_sub(1);
        self.go_to(previous)
    }

    /// Jump to `index`, clamped into the question range. Only moves while `Running`.
    pub fn go_to(&mut self, index: usize) -> usize {
        if self.state == AttemptState::Running {
            let last = self
                .quiz
                .as_ref()
                .map_or(0, |quiz| quiz.question_count().saturating_sub(1));
            self.cursor = index.min(last);
        }
        self.cursor
    }

    //
    // ─── SUBMISSION ────────────────────────────────────────────────────────────
    //

    /// Leave `Running` and grade the attempt.
    ///
    /// Only the first trigger has any effect; later ones, whether from the user
    /// or the timer, report `SubmitRequest::Duplicate`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` when the attempt never started.
    pub fn request_submit(
        &mut self,
        trigger: SubmitTrigger,
        now: DateTime<Utc>,
    ) -> Result<SubmitRequest, SessionError> {
        match self.state {
            AttemptState::Running => {
                self.begin_submission(trigger, now);
                Ok(SubmitRequest::Started)
            }
            AttemptState::Submitting | AttemptState::Submitted => Ok(SubmitRequest::Duplicate),
            AttemptState::Errored if self.trigger.is_some() => Ok(SubmitRequest::Duplicate),
            state => Err(SessionError::InvalidState {
                operation: "submit",
                state,
            }),
        }
    }

    fn begin_submission(&mut self, trigger: SubmitTrigger, now: DateTime<Utc>) {
        let (Some(quiz), Some(ledger), Some(started_at)) =
            (self.quiz.as_ref(), self.ledger.as_ref(), self.started_at)
        else {
            return;
        };

        self.timer.stop();
        let duration = quiz.duration_seconds();
        let elapsed = (duration - i64::from(self.timer.remaining())).clamp(0, duration.max(0));
        let summary = grade(quiz, ledger, started_at, now, elapsed);
        let payload = SubmissionPayload::assemble(quiz, &summary);

        tracing::info!(
            quiz_id = %self.quiz_id,
            ?trigger,
            score = summary.score(),
            elapsed,
            "submitting attempt"
        );
        tracing::debug!(
            quiz_id = %self.quiz_id,
            answered = ?ledger.answered_question_ids(),
            "answered questions"
        );
        self.trigger = Some(trigger);
        self.summary = Some(summary);
        self.payload = Some(payload);
        self.state = AttemptState::Submitting;
    }

    /// Apply the gateway's answer to a pending submission. Ignored unless `Submitting`.
    pub fn complete_submission(&mut self, outcome: Result<ResultId, GatewayError>) {
        if self.state != AttemptState::Submitting {
            return;
        }

        match outcome {
            Ok(result_id) => {
                tracing::info!(quiz_id = %self.quiz_id, %result_id, "attempt submitted");
                self.result_id = Some(result_id);
                self.failure = None;
                self.state = AttemptState::Submitted;
            }
            Err(err) => {
                tracing::warn!(quiz_id = %self.quiz_id, error = %err, "submission failed");
                self.fail(SessionError::Submission(err));
            }
        }
    }

    /// Put a failed submission back into `Submitting` with the same payload.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` unless the attempt is `Errored`
    /// after a submission failure.
    pub fn retry_submission(&mut self) -> Result<(), SessionError> {
        if !self.can_retry() {
            return Err(SessionError::InvalidState {
                operation: "retry submission",
                state: self.state,
            });
        }
        tracing::info!(quiz_id = %self.quiz_id, "retrying submission");
        self.state = AttemptState::Submitting;
        Ok(())
    }

    /// Send the pending payload through `gateway` and record the outcome.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` when nothing is pending and
    /// `SessionError::Submission` when the gateway fails; the attempt is then
    /// `Errored` with its summary kept for a retry.
    pub async fn deliver(&mut self, gateway: &dyn SubmissionGateway) -> Result<ResultId, SessionError> {
        let payload = self
            .pending_submission()
            .cloned()
            .ok_or(SessionError::InvalidState {
                operation: "deliver a submission",
                state: self.state,
            })?;

        let outcome = gateway.submit(self.quiz_id, &payload).await;
        self.complete_submission(outcome.clone());
        outcome.map_err(SessionError::from)
    }

    fn fail(&mut self, err: SessionError) {
        self.timer.stop();
        self.failure = Some(err);
        self.state = AttemptState::Errored;
    }

    fn ensure_state(&self, operation: &'static str, expected: AttemptState) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }
}
