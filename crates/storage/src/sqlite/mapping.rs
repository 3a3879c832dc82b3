use quiz_core::model::{
    Difficulty, OptionIndex, Question, QuestionId, QuizId, ResultId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::{StorageError, StoredAnswer};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn quiz_id_from_i64(v: i64) -> Result<QuizId, StorageError> {
    Ok(QuizId::new(i64_to_u64("quiz_id", v)?))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64("question_id", v)?))
}

pub(crate) fn result_id_from_i64(v: i64) -> Result<ResultId, StorageError> {
    Ok(ResultId::new(i64_to_u64("result_id", v)?))
}

pub(crate) fn option_from_i64(field: &'static str, v: i64) -> Result<OptionIndex, StorageError> {
    u8::try_from(v)
        .map(OptionIndex::new)
        .map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn map_question_row(row: &SqliteRow) -> Result<Question, StorageError> {
    let id = question_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?;
    let text: String = row.try_get("text").map_err(ser)?;
    let options: Vec<String> =
        serde_json::from_str(&row.try_get::<String, _>("options").map_err(ser)?).map_err(ser)?;
    let correct = option_from_i64("correct", row.try_get::<i64, _>("correct").map_err(ser)?)?;
    let difficulty = row
        .try_get::<Option<String>, _>("difficulty")
        .map_err(ser)?
        .map(|raw| raw.parse::<Difficulty>())
        .transpose()
        .map_err(ser)?;

    Question::new(id, text, options, correct, difficulty).map_err(ser)
}

pub(crate) fn map_answer_row(row: &SqliteRow) -> Result<StoredAnswer, StorageError> {
    Ok(StoredAnswer {
        question_id: question_id_from_i64(row.try_get::<i64, _>("question_id").map_err(ser)?)?,
        selected: option_from_i64(
            "selected_option",
            row.try_get::<i64, _>("selected_option").map_err(ser)?,
        )?,
        is_correct: row.try_get::<i64, _>("is_correct").map_err(ser)? != 0,
    })
}
