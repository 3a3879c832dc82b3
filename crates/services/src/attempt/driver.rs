//! Background task that owns one attempt.
//!
//! Ticks and user commands are serialised through a single `select!` loop, so
//! the session is only ever touched from this task.

use std::future::pending;
use std::sync::Arc;

use quiz_core::model::{OptionIndex, QuestionId, ResultId, SubmissionSummary};
use storage::repository::{GatewayError, SubmissionGateway};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, Interval, interval_at};

use super::progress::AttemptProgress;
use super::session::{AttemptSession, AttemptState, SubmitRequest, SubmitTrigger};
use super::workflow::SubmitOutcome;
use crate::Clock;
use crate::error::SessionError;

const TICK_PERIOD: Duration = Duration::from_secs(1);
const COMMAND_BUFFER: usize = 16;

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

/// How a driven attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Submitted {
        result_id: ResultId,
        summary: SubmissionSummary,
    },
    /// Loading or submission failed and no retry followed.
    Failed {
        error: SessionError,
        summary: Option<SubmissionSummary>,
    },
    /// Torn down before a submission completed; the gateway result, if any, was discarded.
    Abandoned,
}

enum Navigation {
    Next,
    Previous,
    To(usize),
}

enum Command {
    Start(Reply<()>),
    Answer {
        question_id: Option<QuestionId>,
        option: OptionIndex,
        reply: Reply<Option<OptionIndex>>,
    },
    Navigate(Navigation, Reply<usize>),
    Submit(Reply<SubmitOutcome>),
    Retry(Reply<SubmitOutcome>),
    Abandon,
}

enum Flow {
    Continue,
    Abandon,
}

/// Client side of a running attempt driver.
///
/// Dropping the handle abandons the attempt.
pub struct AttemptHandle {
    commands: mpsc::Sender<Command>,
    progress: watch::Receiver<AttemptProgress>,
    task: JoinHandle<AttemptOutcome>,
}

impl AttemptHandle {
    /// Latest published snapshot.
    #[must_use]
    pub fn progress(&self) -> AttemptProgress {
        self.progress.borrow().clone()
    }

    /// Receiver that is notified after every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AttemptProgress> {
        self.progress.clone()
    }

    /// Start the countdown.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` unless the attempt is ready, or
    /// `SessionError::DriverStopped` once the driver has exited.
    pub async fn start(&self) -> Result<(), SessionError> {
        self.request(Command::Start).await
    }

    /// Record an answer for a specific question.
    ///
    /// # Errors
    ///
    /// See [`AttemptSession::record_answer`].
    pub async fn answer(
        &self,
        question_id: QuestionId,
        option: OptionIndex,
    ) -> Result<Option<OptionIndex>, SessionError> {
        self.request(|reply| Command::Answer {
            question_id: Some(question_id),
            option,
            reply,
        })
        .await
    }

    /// Record an answer for the question under the cursor.
    ///
    /// # Errors
    ///
    /// See [`AttemptSession::record_answer`].
    pub async fn answer_current(
        &self,
        option: OptionIndex,
    ) -> Result<Option<OptionIndex>, SessionError> {
        self.request(|reply| Command::Answer {
            question_id: None,
            option,
            reply,
        })
        .await
    }

    /// # Errors
    ///
    /// Returns `SessionError::DriverStopped` once the driver has exited.
    pub async fn next(&self) -> Result<usize, SessionError> {
        self.request(|reply| Command::Navigate(Navigation::Next, reply))
            .await
    }

    /// # Errors
    ///
    /// Returns `SessionError::DriverStopped` once the driver has exited.
    pub async fn previous(&self) -> Result<usize, SessionError> {
        self.request(|reply| Command::Navigate(Navigation::Previous, reply))
            .await
    }

    /// # Errors
    ///
    /// Returns `SessionError::DriverStopped` once the driver has exited.
    pub async fn go_to(&self, index: usize) -> Result<usize, SessionError> {
        self.request(|reply| Command::Navigate(Navigation::To(index), reply))
            .await
    }

    /// Submit the attempt and wait for the gateway.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Submission` when the gateway fails and
    /// `SessionError::InvalidState` before the attempt has started.
    pub async fn submit(&self) -> Result<SubmitOutcome, SessionError> {
        self.request(Command::Submit).await
    }

    /// Re-send a failed submission.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` when there is nothing to retry.
    pub async fn retry(&self) -> Result<SubmitOutcome, SessionError> {
        self.request(Command::Retry).await
    }

    /// Wait until the attempt is `Submitted` or `Errored`.
    pub async fn settled(&mut self) -> AttemptProgress {
        let done = |p: &AttemptProgress| {
            matches!(p.state, AttemptState::Submitted | AttemptState::Errored)
        };
        if let Ok(progress) = self.progress.wait_for(done).await {
            return progress.clone();
        }
        self.progress.borrow().clone()
    }

    /// Tear the attempt down without submitting.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::DriverStopped` if the driver task panicked.
    pub async fn abandon(self) -> Result<AttemptOutcome, SessionError> {
        // A closed inbox means the driver already finished; join reports how.
        let _ = self.commands.send(Command::Abandon).await;
        self.task.await.map_err(|_| SessionError::DriverStopped)
    }

    /// Release the handle and collect the outcome.
    ///
    /// An attempt that is still in progress is abandoned.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::DriverStopped` if the driver task panicked.
    pub async fn close(self) -> Result<AttemptOutcome, SessionError> {
        let Self { commands, task, .. } = self;
        drop(commands);
        task.await.map_err(|_| SessionError::DriverStopped)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| SessionError::DriverStopped)?;
        response.await.map_err(|_| SessionError::DriverStopped)?
    }
}

/// Move `session` onto a new driver task.
pub(crate) fn spawn(
    clock: Clock,
    gateway: Arc<dyn SubmissionGateway>,
    session: AttemptSession,
) -> AttemptHandle {
    let (commands, inbox) = mpsc::channel(COMMAND_BUFFER);
    let (progress_tx, progress) = watch::channel(session.progress());
    let driver = Driver {
        clock,
        gateway,
        session,
        progress: progress_tx,
        ticker: None,
        waiting: Vec::new(),
    };
    let task = tokio::spawn(driver.run(inbox));

    AttemptHandle {
        commands,
        progress,
        task,
    }
}

struct Driver {
    clock: Clock,
    gateway: Arc<dyn SubmissionGateway>,
    session: AttemptSession,
    progress: watch::Sender<AttemptProgress>,
    ticker: Option<Interval>,
    waiting: Vec<Reply<SubmitOutcome>>,
}

impl Driver {
    async fn run(mut self, mut inbox: mpsc::Receiver<Command>) -> AttemptOutcome {
        loop {
            match self.session.state() {
                AttemptState::Submitting => {
                    self.ticker = None;
                    if let Flow::Abandon = self.deliver(&mut inbox).await {
                        return self.abandon();
                    }
                    self.publish();
                    continue;
                }
                AttemptState::Submitted => return self.finish(),
                AttemptState::Errored if !self.session.can_retry() => return self.finish(),
                _ => {}
            }

            tokio::select! {
                () = next_tick(&mut self.ticker) => {
                    let now = self.clock.now();
                    self.session.tick(now);
                }
                command = inbox.recv() => {
                    let Some(command) = command else {
                        return self.closed();
                    };
                    if let Flow::Abandon = self.handle(command) {
                        return self.abandon();
                    }
                }
            }
            self.publish();
        }
    }

    async fn deliver(&mut self, inbox: &mut mpsc::Receiver<Command>) -> Flow {
        let Some(payload) = self.session.pending_submission().cloned() else {
            self.session.complete_submission(Err(GatewayError::Validation(
                "no submission is pending".into(),
            )));
            return Flow::Continue;
        };
        self.publish();

        let gateway = Arc::clone(&self.gateway);
        let mut delivery = gateway.submit(self.session.quiz_id(), &payload);
        let outcome = loop {
            tokio::select! {
                outcome = &mut delivery => break outcome,
                command = inbox.recv() => match command {
                    None | Some(Command::Abandon) => return Flow::Abandon,
                    Some(command) => {
                        if let Flow::Abandon = self.handle(command) {
                            return Flow::Abandon;
                        }
                        self.publish();
                    }
                },
            }
        };

        let answer = outcome
            .clone()
            .map(SubmitOutcome::Submitted)
            .map_err(SessionError::Submission);
        self.session.complete_submission(outcome);
        self.publish();
        for reply in self.waiting.drain(..) {
            let _ = reply.send(answer.clone());
        }
        Flow::Continue
    }

    fn handle(&mut self, command: Command) -> Flow {
        match command {
            Command::Start(reply) => {
                let started = self.session.start(self.clock.now()).map(|_| ());
                if self.session.state() == AttemptState::Running {
                    self.ticker = Some(interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD));
                }
                self.respond(reply, started);
            }
            Command::Answer {
                question_id,
                option,
                reply,
            } => {
                let recorded = match question_id {
                    Some(question_id) => self.session.record_answer(question_id, option),
                    None => self.session.answer_current(option),
                };
                self.respond(reply, recorded);
            }
            Command::Navigate(navigation, reply) => {
                let cursor = match navigation {
                    Navigation::Next => self.session.go_to_next(),
                    Navigation::Previous => self.session.go_to_previous(),
                    Navigation::To(index) => self.session.go_to(index),
                };
                self.respond(reply, Ok(cursor));
            }
            Command::Submit(reply) => {
                match self
                    .session
                    .request_submit(SubmitTrigger::User, self.clock.now())
                {
                    Ok(SubmitRequest::Started) => self.waiting.push(reply),
                    Ok(SubmitRequest::Duplicate) => {
                        tracing::debug!(quiz_id = %self.session.quiz_id(), "duplicate submit ignored");
                        self.respond(reply, Ok(SubmitOutcome::Duplicate));
                    }
                    Err(err) => self.respond(reply, Err(err)),
                }
            }
            Command::Retry(reply) => match self.session.retry_submission() {
                Ok(()) => self.waiting.push(reply),
                Err(err) => self.respond(reply, Err(err)),
            },
            Command::Abandon => return Flow::Abandon,
        }
        Flow::Continue
    }

    /// Publish first so callers observe the change once their reply arrives.
    fn respond<T>(&self, reply: Reply<T>, value: Result<T, SessionError>) {
        self.publish();
        let _ = reply.send(value);
    }

    fn publish(&self) {
        self.progress.send_replace(self.session.progress());
    }

    fn closed(self) -> AttemptOutcome {
        if self.session.state() == AttemptState::Errored {
            self.finish()
        } else {
            self.abandon()
        }
    }

    fn abandon(self) -> AttemptOutcome {
        tracing::info!(
            quiz_id = %self.session.quiz_id(),
            state = %self.session.state(),
            "attempt abandoned"
        );
        AttemptOutcome::Abandoned
    }

    fn finish(self) -> AttemptOutcome {
        tracing::debug!(
            quiz_id = %self.session.quiz_id(),
            state = %self.session.state(),
            trigger = ?self.session.trigger(),
            "attempt finished"
        );
        let summary = self.session.summary().cloned();
        match (self.session.result_id(), summary) {
            (Some(result_id), Some(summary)) => AttemptOutcome::Submitted { result_id, summary },
            (_, summary) => AttemptOutcome::Failed {
                error: self
                    .session
                    .failure()
                    .cloned()
                    .unwrap_or(SessionError::DriverStopped),
                summary,
            },
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => pending::<()>().await,
    }
}
