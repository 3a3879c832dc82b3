use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use quiz_core::model::{
    OptionIndex, Question, QuestionId, Quiz, QuizId, ResultId, SubmissionPayload,
};
use quiz_core::time::fixed_clock;
use services::{
    AttemptLoopService, AttemptOutcome, AttemptState, SessionError, SubmitOutcome,
};
use storage::repository::{
    GatewayError, InMemoryRepository, QuizStore, ResultRepository, SubmissionGateway,
};

/// Gateway that counts calls, can stall, and can fail a number of times first.
#[derive(Clone)]
struct ScriptedGateway {
    inner: InMemoryRepository,
    calls: Arc<AtomicUsize>,
    failures_left: Arc<AtomicUsize>,
    delay: Duration,
}

impl ScriptedGateway {
    fn new(inner: InMemoryRepository) -> Self {
        Self {
            inner,
            calls: Arc::new(AtomicUsize::new(0)),
            failures_left: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
        }
    }

    fn failing(self, times: usize) -> Self {
        self.failures_left.store(times, Ordering::SeqCst);
        self
    }

    fn stalling(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubmissionGateway for ScriptedGateway {
    async fn submit(
        &self,
        quiz_id: QuizId,
        payload: &SubmissionPayload,
    ) -> Result<ResultId, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let should_fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(GatewayError::Network("connection reset".into()));
        }
        self.inner.submit(quiz_id, payload).await
    }
}

fn two_question_quiz(minutes: u32) -> Quiz {
    let questions = (1..=2)
        .map(|id| {
            Question::new(
                QuestionId::new(id),
                format!("Question {id}"),
                vec!["right".into(), "wrong".into(), "other".into()],
                OptionIndex::new(0),
                None,
            )
            .unwrap()
        })
        .collect();
    Quiz::new(QuizId::new(1), "Driver quiz", "General", None, minutes, questions).unwrap()
}

async fn setup(
    minutes: u32,
    gateway: impl FnOnce(InMemoryRepository) -> ScriptedGateway,
) -> (AttemptLoopService, InMemoryRepository, ScriptedGateway) {
    let repo = InMemoryRepository::new();
    repo.upsert_quiz(&two_question_quiz(minutes)).await.unwrap();
    let gateway = gateway(repo.clone());
    let service = AttemptLoopService::new(
        fixed_clock(),
        Arc::new(repo.clone()),
        Arc::new(gateway.clone()),
    );
    (service, repo, gateway)
}

#[tokio::test(start_paused = true)]
async fn expiry_without_answers_submits_automatically() {
    let (service, repo, gateway) = setup(1, ScriptedGateway::new).await;
    let mut handle = service.launch(QuizId::new(1)).await;
    assert_eq!(handle.progress().state, AttemptState::Ready);

    handle.start().await.unwrap();
    let settled = handle.settled().await;
    assert_eq!(settled.state, AttemptState::Submitted);
    assert_eq!(settled.remaining_seconds, 0);

    let outcome = handle.close().await.unwrap();
    let AttemptOutcome::Submitted { result_id, summary } = outcome else {
        panic!("expected submission, got {outcome:?}");
    };
    assert_eq!(summary.score(), 0);
    assert_eq!(summary.answered(), 0);
    assert_eq!(summary.unanswered(), 2);
    assert_eq!(summary.elapsed_seconds(), 60);
    assert_eq!(gateway.calls(), 1);
    assert_eq!(repo.get_result(result_id).await.unwrap().score, 0);
}

#[tokio::test(start_paused = true)]
async fn submit_after_forty_five_seconds() {
    let (service, _repo, gateway) = setup(1, ScriptedGateway::new).await;
    let handle = service.launch(QuizId::new(1)).await;

    handle.start().await.unwrap();
    handle
        .answer(QuestionId::new(1), OptionIndex::new(0))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(45_500)).await;
    assert_eq!(handle.progress().remaining_seconds, 15);

    let outcome = handle.submit().await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Submitted(_)));

    let AttemptOutcome::Submitted { summary, .. } = handle.close().await.unwrap() else {
        panic!("attempt should be submitted");
    };
    assert_eq!(summary.total(), 2);
    assert_eq!(summary.answered(), 1);
    assert_eq!(summary.correct(), 1);
    assert_eq!(summary.incorrect(), 0);
    assert_eq!(summary.unanswered(), 1);
    assert_eq!(summary.score(), 50);
    assert_eq!(summary.elapsed_seconds(), 45);
    assert_eq!(gateway.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn two_immediate_submits_call_gateway_once() {
    let (service, _repo, gateway) =
        setup(1, |repo| ScriptedGateway::new(repo).stalling(Duration::from_secs(2))).await;
    let handle = service.launch(QuizId::new(1)).await;
    handle.start().await.unwrap();

    let (first, second) = tokio::join!(handle.submit(), handle.submit());
    let mut outcomes = [first.unwrap(), second.unwrap()];
    outcomes.sort_by_key(|o| matches!(o, SubmitOutcome::Duplicate));
    assert!(matches!(outcomes[0], SubmitOutcome::Submitted(_)));
    assert_eq!(outcomes[1], SubmitOutcome::Duplicate);
    assert_eq!(gateway.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn abandon_at_ready_never_calls_gateway() {
    let (service, _repo, gateway) = setup(1, ScriptedGateway::new).await;
    let handle = service.launch(QuizId::new(1)).await;

    let outcome = handle.abandon().await.unwrap();
    assert_eq!(outcome, AttemptOutcome::Abandoned);
    assert_eq!(gateway.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn dropping_handle_mid_attempt_stops_ticking() {
    let (service, repo, gateway) = setup(1, ScriptedGateway::new).await;
    let handle = service.launch(QuizId::new(1)).await;
    handle.start().await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    drop(handle);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(gateway.calls(), 0);
    assert_eq!(repo.submission_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn abandon_during_submission_discards_result() {
    let (service, repo, gateway) =
        setup(1, |repo| ScriptedGateway::new(repo).stalling(Duration::from_secs(30))).await;
    let handle = service.launch(QuizId::new(1)).await;
    handle.start().await.unwrap();

    // Time runs out and the driver starts delivering to the stalled gateway.
    let mut progress = handle.subscribe();
    progress
        .wait_for(|p| p.state == AttemptState::Submitting)
        .await
        .unwrap();
    assert_eq!(gateway.calls(), 1);

    let outcome = handle.abandon().await.unwrap();
    assert_eq!(outcome, AttemptOutcome::Abandoned);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(repo.submission_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_submission_keeps_summary_and_retries() {
    let (service, repo, gateway) =
        setup(1, |repo| ScriptedGateway::new(repo).failing(1)).await;
    let mut handle = service.launch(QuizId::new(1)).await;
    handle.start().await.unwrap();
    handle.answer_current(OptionIndex::new(0)).await.unwrap();
    handle.next().await.unwrap();
    handle.answer_current(OptionIndex::new(1)).await.unwrap();

    let err = handle.submit().await.unwrap_err();
    assert!(matches!(err, SessionError::Submission(GatewayError::Network(_))));
    let errored = handle.settled().await;
    assert_eq!(errored.state, AttemptState::Errored);
    assert_eq!(errored.score, Some(50));

    // Time keeps passing but an errored attempt never resumes the countdown.
    tokio::time::sleep(Duration::from_secs(90)).await;
    assert_eq!(handle.progress().state, AttemptState::Errored);

    let retried = handle.retry().await.unwrap();
    let SubmitOutcome::Submitted(result_id) = retried else {
        panic!("retry should submit, got {retried:?}");
    };
    assert_eq!(gateway.calls(), 2);
    let stored = repo.get_result(result_id).await.unwrap();
    assert_eq!(stored.score, 50);
    assert_eq!(stored.correct_answers, 1);
}

#[tokio::test(start_paused = true)]
async fn failed_load_ends_driver_with_fetch_error() {
    let (service, _repo, gateway) = setup(1, ScriptedGateway::new).await;
    let handle = service.launch(QuizId::new(42)).await;
    assert_eq!(handle.progress().state, AttemptState::Errored);

    let outcome = handle.close().await.unwrap();
    assert!(matches!(
        outcome,
        AttemptOutcome::Failed {
            error: SessionError::Fetch(_),
            summary: None
        }
    ));
    assert_eq!(gateway.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn navigation_and_answers_through_handle() {
    let (service, _repo, _gateway) = setup(1, ScriptedGateway::new).await;
    let handle = service.launch(QuizId::new(1)).await;

    assert!(matches!(
        handle.answer_current(OptionIndex::new(0)).await,
        Err(SessionError::InvalidState { .. })
    ));
    handle.start().await.unwrap();
    assert!(matches!(
        handle.start().await,
        Err(SessionError::InvalidState { .. })
    ));

    assert_eq!(handle.next().await.unwrap(), 1);
    assert_eq!(handle.next().await.unwrap(), 1);
    assert_eq!(handle.previous().await.unwrap(), 0);
    assert_eq!(handle.go_to(9).await.unwrap(), 1);
    assert!(matches!(
        handle.answer(QuestionId::new(7), OptionIndex::new(0)).await,
        Err(SessionError::Ledger(_))
    ));
    handle.answer_current(OptionIndex::new(2)).await.unwrap();

    let progress = handle.progress();
    assert_eq!(progress.cursor, 1);
    assert_eq!(progress.answered, 1);
    assert_eq!(progress.answered + progress.unanswered, progress.total);
    assert_eq!(
        progress.current.as_ref().and_then(|q| q.selected),
        Some(OptionIndex::new(2))
    );
}
