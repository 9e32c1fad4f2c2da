use time::PrimitiveDateTime;

use crate::db::models::Answer;
use crate::db::types::QuestionVariant;

pub(crate) const COLUMNS: &str = "\
    id, attempt_id, examinee_id, exam_id, variant, question_id, mcq_choice_id, \
    likert_value, true_false_value, essay_text, raw_value, created_at, updated_at";

pub(crate) struct UpsertAnswer<'a> {
    pub(crate) attempt_id: i64,
    pub(crate) examinee_id: i64,
    pub(crate) exam_id: i64,
    pub(crate) variant: QuestionVariant,
    pub(crate) question_id: i64,
    pub(crate) mcq_choice_id: Option<i64>,
    pub(crate) likert_value: Option<i32>,
    pub(crate) true_false_value: Option<bool>,
    pub(crate) essay_text: Option<&'a str>,
    pub(crate) raw_value: &'a str,
    pub(crate) now: PrimitiveDateTime,
}

/// Inserts the answer or overwrites the existing one for the same question.
pub(crate) async fn upsert(
    executor: impl sqlx::PgExecutor<'_>,
    params: UpsertAnswer<'_>,
) -> Result<Answer, sqlx::Error> {
    sqlx::query_as::<_, Answer>(&format!(
        "INSERT INTO answers (attempt_id, examinee_id, exam_id, variant, question_id, \
                              mcq_choice_id, likert_value, true_false_value, essay_text, \
                              raw_value, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11) \
         ON CONFLICT ON CONSTRAINT uq_answers_attempt_question DO UPDATE SET \
             examinee_id = EXCLUDED.examinee_id, \
             exam_id = EXCLUDED.exam_id, \
             mcq_choice_id = EXCLUDED.mcq_choice_id, \
             likert_value = EXCLUDED.likert_value, \
             true_false_value = EXCLUDED.true_false_value, \
             essay_text = EXCLUDED.essay_text, \
             raw_value = EXCLUDED.raw_value, \
             updated_at = EXCLUDED.updated_at \
         RETURNING {COLUMNS}"
    ))
    .bind(params.attempt_id)
    .bind(params.examinee_id)
    .bind(params.exam_id)
    .bind(params.variant)
    .bind(params.question_id)
    .bind(params.mcq_choice_id)
    .bind(params.likert_value)
    .bind(params.true_false_value)
    .bind(params.essay_text)
    .bind(params.raw_value)
    .bind(params.now)
    .fetch_one(executor)
    .await
}

pub(crate) async fn count_for_attempt(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: i64,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM answers WHERE attempt_id = $1")
        .bind(attempt_id)
        .fetch_one(executor)
        .await
}
