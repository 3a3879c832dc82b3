use quiz_core::model::{Quiz, QuizId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{id_i64, map_question_row, quiz_id_from_i64, ser, u32_from_i64};
use crate::repository::{CatalogError, QuizCatalog, QuizStore, StorageError};

fn unavailable(e: sqlx::Error) -> CatalogError {
    CatalogError::Network(e.to_string())
}

fn invalid<E: core::fmt::Display>(e: E) -> CatalogError {
    CatalogError::Validation(e.to_string())
}

#[async_trait::async_trait]
impl QuizCatalog for SqliteRepository {
    async fn fetch_quiz(&self, id: QuizId) -> Result<Quiz, CatalogError> {
        let quiz_key = id_i64("quiz_id", id.value()).map_err(|_| CatalogError::NotFound(id))?;

        let row = sqlx::query(
            r"
                SELECT id, title, category, subcategory, time_duration
                FROM quizzes
                WHERE id = ?1
            ",
        )
        .bind(quiz_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?
        .ok_or(CatalogError::NotFound(id))?;

        let question_rows = sqlx::query(
            r"
                SELECT id, text, options, correct, difficulty
                FROM questions
                WHERE quiz_id = ?1
                ORDER BY position ASC
            ",
        )
        .bind(quiz_key)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        let mut questions = Vec::with_capacity(question_rows.len());
        for question_row in &question_rows {
            questions.push(map_question_row(question_row).map_err(invalid)?);
        }

        let time_duration = u32_from_i64(
            "time_duration",
            row.try_get::<i64, _>("time_duration").map_err(invalid)?,
        )
        .map_err(invalid)?;

        Quiz::new(
            id,
            row.try_get::<String, _>("title").map_err(invalid)?,
            row.try_get::<String, _>("category").map_err(invalid)?,
            row.try_get::<Option<String>, _>("subcategory")
                .map_err(invalid)?,
            time_duration,
            questions,
        )
        .map_err(invalid)
    }
}

#[async_trait::async_trait]
impl QuizStore for SqliteRepository {
    async fn upsert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError> {
        let quiz_key = id_i64("quiz_id", quiz.id().value())?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        sqlx::query(
            r"
                INSERT INTO quizzes (id, title, category, subcategory, time_duration)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    category = excluded.category,
                    subcategory = excluded.subcategory,
                    time_duration = excluded.time_duration
            ",
        )
        .bind(quiz_key)
        .bind(quiz.title())
        .bind(quiz.category())
        .bind(quiz.subcategory())
        .bind(i64::from(quiz.time_limit_minutes()))
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        sqlx::query("DELETE FROM questions WHERE quiz_id = ?1")
            .bind(quiz_key)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        for (position, question) in quiz.questions().iter().enumerate() {
            let options = serde_json::to_string(question.options()).map_err(ser)?;
            sqlx::query(
                r"
                    INSERT INTO questions (id, quiz_id, position, text, options, correct, difficulty)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ",
            )
            .bind(id_i64("question_id", question.id().value())?)
            .bind(quiz_key)
            .bind(i64::try_from(position).map_err(ser)?)
            .bind(question.prompt())
            .bind(options)
            .bind(i64::from(question.correct().value()))
            .bind(question.difficulty().map(|d| d.as_str()))
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn list_quizzes(&self, limit: u32) -> Result<Vec<(QuizId, String)>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, title
                FROM quizzes
                ORDER BY id ASC
                LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let id = quiz_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?;
            out.push((id, row.try_get::<String, _>("title").map_err(ser)?));
        }
        Ok(out)
    }
}
