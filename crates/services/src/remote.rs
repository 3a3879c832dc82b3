//! Client for the quiz REST API.
//!
//! `GET {base}/api/quizzes/{id}/` serves a quiz with its questions and
//! `POST {base}/api/quizzes/{id}/results/` accepts a finished attempt.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::instrument;

use quiz_core::model::{
    Difficulty, OptionIndex, Question, QuestionId, Quiz, QuizId, ResultId, SubmissionPayload,
};
use storage::repository::{CatalogError, GatewayError, QuizCatalog, SubmissionGateway};

use crate::error::RemoteError;

/// Time limit used when the API omits one.
pub const DEFAULT_TIME_LIMIT_MINUTES: u32 = 10;
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: String,
    /// Bearer token of the signed-in user, sent with every request when set.
    pub access_token: Option<String>,
}

impl ApiConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            access_token: None,
        }
    }

    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Read `QUIZ_API_BASE_URL` and `QUIZ_API_TOKEN`; `None` when no base url is set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`ApiConfig::from_env`] over an arbitrary variable source.
    /// Blank values count as unset.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let present = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let base_url = present("QUIZ_API_BASE_URL")?;
        Some(Self {
            base_url,
            access_token: present("QUIZ_API_TOKEN"),
        })
    }
}

/// Quiz catalog and submission gateway backed by the REST API.
#[derive(Clone)]
pub struct HttpQuizApi {
    client: Client,
    config: ApiConfig,
}

impl HttpQuizApi {
    /// # Errors
    ///
    /// Returns `RemoteError::InvalidBaseUrl` for a base url that is not http(s)
    /// and `RemoteError::Http` if the client cannot be built.
    pub fn new(config: ApiConfig) -> Result<Self, RemoteError> {
        let base = config.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(RemoteError::InvalidBaseUrl(config.base_url));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim().trim_end_matches('/'), path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn is_rejection(status: StatusCode) -> bool {
    status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY
}

#[async_trait]
impl QuizCatalog for HttpQuizApi {
    #[instrument(skip(self), level = "debug")]
    async fn fetch_quiz(&self, id: QuizId) -> Result<Quiz, CatalogError> {
        let url = self.endpoint(&format!("api/quizzes/{id}/"));
        let response = self
            .authorized(self.client.get(url))
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(id));
        }
        if is_rejection(status) {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Validation(format!("status {status}: {body}")));
        }
        if !status.is_success() {
            return Err(CatalogError::Network(format!("unexpected status {status}")));
        }

        let body: QuizDetailDto = response.json().await.map_err(|e| {
            if e.is_decode() {
                CatalogError::Validation(e.to_string())
            } else {
                CatalogError::Network(e.to_string())
            }
        })?;
        body.into_quiz(id)
    }
}

#[async_trait]
impl SubmissionGateway for HttpQuizApi {
    #[instrument(skip(self, payload), level = "debug")]
    async fn submit(
        &self,
        quiz_id: QuizId,
        payload: &SubmissionPayload,
    ) -> Result<ResultId, GatewayError> {
        payload.validate()?;

        let url = self.endpoint(&format!("api/quizzes/{quiz_id}/results/"));
        let response = self
            .authorized(self.client.post(url))
            .json(payload)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = response.status();
        if is_rejection(status) || status == StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Validation(format!("status {status}: {body}")));
        }
        if !status.is_success() {
            return Err(GatewayError::Network(format!("unexpected status {status}")));
        }

        let body: SubmitResponseDto = response.json().await.map_err(|e| {
            if e.is_decode() {
                GatewayError::Validation(e.to_string())
            } else {
                GatewayError::Network(e.to_string())
            }
        })?;
        Ok(ResultId::new(body.result_id))
    }
}

//
// ─── WIRE TYPES ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
struct QuizDetailDto {
    quiz: QuizDto,
    #[serde(default)]
    questions: Vec<QuestionDto>,
}

#[derive(Debug, Deserialize)]
struct QuizDto {
    id: u64,
    title: String,
    #[serde(default)]
    category: String,
    subcategory: Option<String>,
    num_questions: Option<u32>,
    time_duration: Option<u32>,
    duration: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct QuestionDto {
    id: u64,
    text: String,
    options: Vec<String>,
    correct: Option<u8>,
    difficulty: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponseDto {
    result_id: u64,
}

impl QuestionDto {
    fn into_question(self) -> Result<Question, CatalogError> {
        let id = QuestionId::new(self.id);
        let correct = self.correct.ok_or_else(|| {
            CatalogError::Validation(format!("question {id} has no correct option"))
        })?;
        let difficulty = self
            .difficulty
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| raw.parse::<Difficulty>())
            .transpose()
            .map_err(|e| CatalogError::Validation(e.to_string()))?;

        Question::new(id, self.text, self.options, OptionIndex::new(correct), difficulty)
            .map_err(|e| CatalogError::Validation(e.to_string()))
    }
}

impl QuizDetailDto {
    fn into_quiz(self, requested: QuizId) -> Result<Quiz, CatalogError> {
        let Self { quiz, questions } = self;
        let id = QuizId::new(quiz.id);
        if id != requested {
            return Err(CatalogError::Validation(format!(
                "requested quiz {requested} but received quiz {id}"
            )));
        }
        let declared = quiz.num_questions;
        if declared.is_some_and(|n| usize::try_from(n).ok() != Some(questions.len())) {
            tracing::warn!(
                quiz_id = %id,
                declared = declared.unwrap_or_default(),
                received = questions.len(),
                "question count differs from num_questions"
            );
        }

        let questions = questions
            .into_iter()
            .map(QuestionDto::into_question)
            .collect::<Result<Vec<_>, _>>()?;
        let minutes = [quiz.time_duration, quiz.duration]
            .into_iter()
            .flatten()
            .find(|minutes| *minutes > 0)
            .unwrap_or(DEFAULT_TIME_LIMIT_MINUTES);

        Quiz::new(
            id,
            quiz.title,
            quiz.category,
            quiz.subcategory,
            minutes,
            questions,
        )
        .map_err(|e| CatalogError::Validation(e.to_string()))
    }
}
