use quiz_core::model::{QuizId, ResultId, SubmissionPayload};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    id_i64, map_answer_row, quiz_id_from_i64, result_id_from_i64, ser, u32_from_i64,
};
use crate::repository::{
    CatalogError, GatewayError, QuizCatalog, ResultRepository, StorageError, StoredResult,
    SubmissionGateway, mark_answers,
};

fn unavailable<E: core::fmt::Display>(e: E) -> GatewayError {
    GatewayError::Network(e.to_string())
}

#[async_trait::async_trait]
impl SubmissionGateway for SqliteRepository {
    async fn submit(
        &self,
        quiz_id: QuizId,
        payload: &SubmissionPayload,
    ) -> Result<ResultId, GatewayError> {
        let quiz = self.fetch_quiz(quiz_id).await.map_err(|e| match e {
            CatalogError::Network(msg) => GatewayError::Network(msg),
            other => GatewayError::Validation(other.to_string()),
        })?;
        let answers = mark_answers(&quiz, payload)?;
        let quiz_key = id_i64("quiz_id", quiz_id.value()).map_err(unavailable)?;

        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        let res = sqlx::query(
            r"
                INSERT INTO attempt_results (
                    quiz_id, score, total_questions, correct_answers,
                    time_taken, started_at, completed_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(quiz_key)
        .bind(i64::from(payload.score))
        .bind(i64::from(payload.total_questions))
        .bind(i64::from(payload.correct_answers))
        .bind(payload.time_taken)
        .bind(payload.started_at)
        .bind(payload.completed_at)
        .execute(&mut *tx)
        .await
        .map_err(unavailable)?;
        let result_key = res.last_insert_rowid();

        for answer in &answers {
            sqlx::query(
                r"
                    INSERT INTO attempt_answers (result_id, question_id, selected_option, is_correct)
                    VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(result_key)
            .bind(id_i64("question_id", answer.question_id.value()).map_err(unavailable)?)
            .bind(i64::from(answer.selected.value()))
            .bind(i64::from(answer.is_correct))
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;
        }

        tx.commit().await.map_err(unavailable)?;

        let id = result_id_from_i64(result_key).map_err(unavailable)?;
        tracing::debug!(%quiz_id, result_id = %id, "stored attempt result");
        Ok(id)
    }
}

#[async_trait::async_trait]
impl ResultRepository for SqliteRepository {
    async fn get_result(&self, id: ResultId) -> Result<StoredResult, StorageError> {
        let result_key = id_i64("result_id", id.value())?;

        let row = sqlx::query(
            r"
                SELECT
                    id, quiz_id, score, total_questions, correct_answers,
                    time_taken, started_at, completed_at
                FROM attempt_results
                WHERE id = ?1
            ",
        )
        .bind(result_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;

        let answer_rows = sqlx::query(
            r"
                SELECT question_id, selected_option, is_correct
                FROM attempt_answers
                WHERE result_id = ?1
                ORDER BY question_id ASC
            ",
        )
        .bind(result_key)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut answers = Vec::with_capacity(answer_rows.len());
        for answer_row in &answer_rows {
            answers.push(map_answer_row(answer_row)?);
        }

        Ok(StoredResult {
            id: result_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
            quiz_id: quiz_id_from_i64(row.try_get::<i64, _>("quiz_id").map_err(ser)?)?,
            score: u32_from_i64("score", row.try_get::<i64, _>("score").map_err(ser)?)?,
            total_questions: u32_from_i64(
                "total_questions",
                row.try_get::<i64, _>("total_questions").map_err(ser)?,
            )?,
            correct_answers: u32_from_i64(
                "correct_answers",
                row.try_get::<i64, _>("correct_answers").map_err(ser)?,
            )?,
            time_taken: row.try_get("time_taken").map_err(ser)?,
            started_at: row.try_get("started_at").map_err(ser)?,
            completed_at: row.try_get("completed_at").map_err(ser)?,
            answers,
        })
    }
}
