use std::sync::Arc;

use quiz_core::TickEvent;
use quiz_core::model::{QuizId, ResultId};
use storage::repository::{QuizCatalog, Storage, SubmissionGateway};

use super::driver::{self, AttemptHandle};
use super::session::{AttemptSession, AttemptState, SubmitRequest, SubmitTrigger};
use crate::Clock;
use crate::error::SessionError;

/// Outcome of a submit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The gateway accepted the attempt.
    Submitted(ResultId),
    /// A submission was already under way or done; nothing was sent.
    Duplicate,
}

/// Orchestrates attempt loading, submission and retries.
#[derive(Clone)]
pub struct AttemptLoopService {
    clock: Clock,
    catalog: Arc<dyn QuizCatalog>,
    gateway: Arc<dyn SubmissionGateway>,
}

impl AttemptLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<dyn QuizCatalog>,
        gateway: Arc<dyn SubmissionGateway>,
    ) -> Self {
        Self {
            clock,
            catalog,
            gateway,
        }
    }

    /// Wire the service to a storage backend.
    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        Self::new(
            clock,
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.gateway),
        )
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Load a quiz into a new attempt.
    ///
    /// A failed fetch yields an `Errored` session rather than an error.
    pub async fn open(&self, quiz_id: QuizId) -> AttemptSession {
        AttemptSession::load(quiz_id, self.catalog.as_ref()).await
    }

    /// Start the countdown, submitting at once if the quiz has no time.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` unless the session is `Ready`,
    /// or `SessionError::Submission` if the immediate submission fails.
    pub async fn start(&self, session: &mut AttemptSession) -> Result<TickEvent, SessionError> {
        let event = session.start(self.clock.now())?;
        if session.state() == AttemptState::Submitting {
            session.deliver(self.gateway.as_ref()).await?;
        }
        Ok(event)
    }

    /// Advance the countdown one second, submitting on expiry.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Submission` if the expiry submission fails.
    pub async fn tick(&self, session: &mut AttemptSession) -> Result<TickEvent, SessionError> {
        let event = session.tick(self.clock.now());
        if event == TickEvent::Expired {
            session.deliver(self.gateway.as_ref()).await?;
        }
        Ok(event)
    }

    /// Submit on behalf of the user.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` if the attempt never started and
    /// `SessionError::Submission` if the gateway fails.
    pub async fn submit(&self, session: &mut AttemptSession) -> Result<SubmitOutcome, SessionError> {
        match session.request_submit(SubmitTrigger::User, self.clock.now())? {
            SubmitRequest::Duplicate => {
                tracing::debug!(quiz_id = %session.quiz_id(), "duplicate submit ignored");
                Ok(SubmitOutcome::Duplicate)
            }
            SubmitRequest::Started => {
                let result_id = session.deliver(self.gateway.as_ref()).await?;
                Ok(SubmitOutcome::Submitted(result_id))
            }
        }
    }

    /// Re-send the preserved summary of a failed submission.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` when there is nothing to retry and
    /// `SessionError::Submission` if the gateway fails again.
    pub async fn retry(&self, session: &mut AttemptSession) -> Result<ResultId, SessionError> {
        session.retry_submission()?;
        session.deliver(self.gateway.as_ref()).await
    }

    /// Hand the session to a background driver task.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(&self, session: AttemptSession) -> AttemptHandle {
        driver::spawn(self.clock, Arc::clone(&self.gateway), session)
    }

    /// Load a quiz and hand it to a driver in one step.
    pub async fn launch(&self, quiz_id: QuizId) -> AttemptHandle {
        let session = self.open(quiz_id).await;
        self.spawn(session)
    }
}
