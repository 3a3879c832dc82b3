use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::model::{
    OptionIndex, PayloadError, QuestionId, Quiz, QuizId, ResultId, SubmissionPayload,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Failures of a quiz catalog lookup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("quiz {0} not found")]
    NotFound(QuizId),

    /// The backend could not be reached or answered with a transport-level failure.
    #[error("catalog unavailable: {0}")]
    Network(String),

    /// The backend answered, but the quiz it described is malformed.
    #[error("catalog returned an invalid quiz: {0}")]
    Validation(String),
}

/// Failures of a submission gateway call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("gateway unavailable: {0}")]
    Network(String),

    #[error("submission rejected: {0}")]
    Validation(String),
}

impl From<PayloadError> for GatewayError {
    fn from(err: PayloadError) -> Self {
        GatewayError::Validation(err.to_string())
    }
}

/// Errors surfaced by storage adapters outside the catalog/gateway contracts.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// One persisted answer of a stored attempt result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAnswer {
    pub question_id: QuestionId,
    pub selected: OptionIndex,
    pub is_correct: bool,
}

/// Attempt result as the gateway persisted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResult {
    pub id: ResultId,
    pub quiz_id: QuizId,
    pub score: u32,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub time_taken: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub answers: Vec<StoredAnswer>,
}

/// Check a payload against the quiz it claims to answer and mark each answer.
///
/// # Errors
///
/// Returns `GatewayError::Validation` when the payload is inconsistent or
/// references a question the quiz does not have.
pub fn mark_answers(
    quiz: &Quiz,
    payload: &SubmissionPayload,
) -> Result<Vec<StoredAnswer>, GatewayError> {
    payload.validate()?;
    if payload.quiz_id != quiz.id() {
        return Err(GatewayError::Validation(format!(
            "payload is for quiz {} but was submitted to quiz {}",
            payload.quiz_id,
            quiz.id()
        )));
    }
    if usize::try_from(payload.total_questions).ok() != Some(quiz.question_count()) {
        return Err(GatewayError::Validation(format!(
            "totalQuestions {} does not match quiz size {}",
            payload.total_questions,
            quiz.question_count()
        )));
    }

    payload
        .parsed_answers()?
        .into_iter()
        .map(|(question_id, selected)| {
            let question = quiz.find_question(question_id).ok_or_else(|| {
                GatewayError::Validation(format!("question {question_id} is not in quiz"))
            })?;
            Ok(StoredAnswer {
                question_id,
                selected,
                is_correct: question.is_correct(selected),
            })
        })
        .collect()
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Read side of the quiz catalog.
#[async_trait]
pub trait QuizCatalog: Send + Sync {
    /// Fetch a quiz with its ordered questions.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` for an unknown id, `CatalogError::Network`
    /// when the backend is unreachable, and `CatalogError::Validation` for malformed data.
    async fn fetch_quiz(&self, id: QuizId) -> Result<Quiz, CatalogError>;
}

/// Accepts finished attempts and hands back a durable result id.
#[async_trait]
pub trait SubmissionGateway: Send + Sync {
    /// Persist a submission.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Validation` for a malformed payload and
    /// `GatewayError::Network` when the backend is unreachable.
    async fn submit(
        &self,
        quiz_id: QuizId,
        payload: &SubmissionPayload,
    ) -> Result<ResultId, GatewayError>;
}

/// Write side of the catalog, used for seeding and tests.
#[async_trait]
pub trait QuizStore: Send + Sync {
    /// Insert or replace a quiz and all of its questions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the quiz cannot be stored.
    async fn upsert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError>;

    /// List known quizzes as `(id, title)` pairs ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn list_quizzes(&self, limit: u32) -> Result<Vec<(QuizId, String)>, StorageError>;
}

/// Read side of stored attempt results.
#[async_trait]
pub trait ResultRepository: Send + Sync {
    /// Fetch a stored result by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_result(&self, id: ResultId) -> Result<StoredResult, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    quizzes: Arc<Mutex<HashMap<QuizId, Quiz>>>,
    results: Arc<Mutex<Vec<StoredResult>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of accepted submissions so far.
    #[must_use]
    pub fn submission_count(&self) -> usize {
        self.results.lock().map(|r| r.len()).unwrap_or_default()
    }
}

#[async_trait]
impl QuizCatalog for InMemoryRepository {
    async fn fetch_quiz(&self, id: QuizId) -> Result<Quiz, CatalogError> {
        let guard = self
            .quizzes
            .lock()
            .map_err(|e| CatalogError::Network(e.to_string()))?;
        guard.get(&id).cloned().ok_or(CatalogError::NotFound(id))
    }
}

#[async_trait]
impl QuizStore for InMemoryRepository {
    async fn upsert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError> {
        let mut guard = self
            .quizzes
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(quiz.id(), quiz.clone());
        Ok(())
    }

    async fn list_quizzes(&self, limit: u32) -> Result<Vec<(QuizId, String)>, StorageError> {
        let guard = self
            .quizzes
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut out: Vec<_> = guard
            .values()
            .map(|q| (q.id(), q.title().to_string()))
            .collect();
        out.sort_by_key(|(id, _)| *id);
        out.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(out)
    }
}

#[async_trait]
impl SubmissionGateway for InMemoryRepository {
    async fn submit(
        &self,
        quiz_id: QuizId,
        payload: &SubmissionPayload,
    ) -> Result<ResultId, GatewayError> {
        let quiz = self
            .quizzes
            .lock()
            .map_err(|e| GatewayError::Network(e.to_string()))?
            .get(&quiz_id)
            .cloned()
            .ok_or_else(|| GatewayError::Validation(format!("quiz {quiz_id} does not exist")))?;
        let answers = mark_answers(&quiz, payload)?;

        let mut results = self
            .results
            .lock()
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        let id = ResultId::new(u64::try_from(results.len()).unwrap_or(u64::MAX) + 1);
        results.push(StoredResult {
            id,
            quiz_id,
            score: payload.score,
            total_questions: payload.total_questions,
            correct_answers: payload.correct_answers,
            time_taken: payload.time_taken,
            started_at: payload.started_at,
            completed_at: payload.completed_at,
            answers,
        });
        Ok(id)
    }
}

#[async_trait]
impl ResultRepository for InMemoryRepository {
    async fn get_result(&self, id: ResultId) -> Result<StoredResult, StorageError> {
        let guard = self
            .results
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}

/// Aggregates the catalog, gateway and result stores behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub catalog: Arc<dyn QuizCatalog>,
    pub gateway: Arc<dyn SubmissionGateway>,
    pub quizzes: Arc<dyn QuizStore>,
    pub results: Arc<dyn ResultRepository>,
}

impl Storage {
    /// Wire every trait object to the same repository value.
    #[must_use]
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: QuizCatalog + SubmissionGateway + QuizStore + ResultRepository + Clone + 'static,
    {
        let catalog: Arc<dyn QuizCatalog> = Arc::new(repo.clone());
        let gateway: Arc<dyn SubmissionGateway> = Arc::new(repo.clone());
        let quizzes: Arc<dyn QuizStore> = Arc::new(repo.clone());
        let results: Arc<dyn ResultRepository> = Arc::new(repo);
        Self {
            catalog,
            gateway,
            quizzes,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::grade;
    use quiz_core::model::{AnswerLedger, Question};
    use quiz_core::time::fixed_now;

    fn build_quiz(id: u64) -> Quiz {
        let questions = (1..=3)
            .map(|q| {
                Question::new(
                    QuestionId::new(q),
                    format!("Question {q}"),
                    vec!["a".into(), "b".into(), "c".into(), "d".into()],
                    OptionIndex::new(0),
                    None,
                )
                .unwrap()
            })
            .collect();
        Quiz::new(QuizId::new(id), format!("Quiz {id}"), "General", None, 5, questions).unwrap()
    }

    fn payload_for(quiz: &Quiz, answers: &[(u64, u8)]) -> SubmissionPayload {
        let mut ledger = AnswerLedger::for_quiz(quiz);
        for (q, o) in answers {
            ledger
                .set_answer(QuestionId::new(*q), OptionIndex::new(*o))
                .unwrap();
        }
        let summary = grade(quiz, &ledger, fixed_now(), fixed_now(), 12);
        SubmissionPayload::assemble(quiz, &summary)
    }

    #[tokio::test]
    async fn fetch_unknown_quiz_is_not_found() {
        let repo = InMemoryRepository::new();
        let err = repo.fetch_quiz(QuizId::new(4)).await.unwrap_err();
        assert_eq!(err, CatalogError::NotFound(QuizId::new(4)));
    }

    #[tokio::test]
    async fn submit_marks_answers_and_assigns_ids() {
        let repo = InMemoryRepository::new();
        let quiz = build_quiz(1);
        repo.upsert_quiz(&quiz).await.unwrap();

        let first = repo
            .submit(quiz.id(), &payload_for(&quiz, &[(1, 0), (2, 3)]))
            .await
            .unwrap();
        let second = repo
            .submit(quiz.id(), &payload_for(&quiz, &[]))
            .await
            .unwrap();
        assert_eq!(first, ResultId::new(1));
        assert_eq!(second, ResultId::new(2));
        assert_eq!(repo.submission_count(), 2);

        let stored = repo.get_result(first).await.unwrap();
        assert_eq!(stored.correct_answers, 1);
        assert_eq!(stored.answers.len(), 2);
        assert!(stored.answers[0].is_correct);
        assert!(!stored.answers[1].is_correct);
    }

    #[tokio::test]
    async fn submit_rejects_malformed_payload() {
        let repo = InMemoryRepository::new();
        let quiz = build_quiz(1);
        repo.upsert_quiz(&quiz).await.unwrap();

        let mut payload = payload_for(&quiz, &[(1, 0)]);
        payload.unanswered_questions = 0;
        let err = repo.submit(quiz.id(), &payload).await.unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
        assert_eq!(repo.submission_count(), 0);
    }

    #[tokio::test]
    async fn submit_rejects_foreign_question() {
        let repo = InMemoryRepository::new();
        let quiz = build_quiz(1);
        repo.upsert_quiz(&quiz).await.unwrap();

        let mut payload = payload_for(&quiz, &[(1, 0)]);
        payload.user_answers.clear();
        payload.user_answers.insert("42".into(), "0".into());
        let err = repo.submit(quiz.id(), &payload).await.unwrap_err();
        assert!(matches!(err, GatewayError::Validation(msg) if msg.contains("42")));
    }

    #[tokio::test]
    async fn lists_quizzes_in_id_order() {
        let repo = InMemoryRepository::new();
        for id in [3, 1, 2] {
            repo.upsert_quiz(&build_quiz(id)).await.unwrap();
        }
        let listed = repo.list_quizzes(2).await.unwrap();
        assert_eq!(
            listed,
            vec![
                (QuizId::new(1), "Quiz 1".to_string()),
                (QuizId::new(2), "Quiz 2".to_string())
            ]
        );
    }
}
