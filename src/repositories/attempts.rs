use time::PrimitiveDateTime;

use crate::db::models::Attempt;
use crate::db::types::AttemptStatus;

pub(crate) const COLUMNS: &str = "\
    id, examinee_id, exam_id, attempt_number, status, started_at, submitted_at, \
    duration_seconds, raw_score, scaled_score, metadata, created_at, updated_at";

pub(crate) struct CreateAttempt {
    pub(crate) examinee_id: i64,
    pub(crate) exam_id: i64,
    pub(crate) attempt_number: i32,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) metadata: serde_json::Value,
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: i64,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!("SELECT {COLUMNS} FROM attempts WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn find_by_number(
    executor: impl sqlx::PgExecutor<'_>,
    examinee_id: i64,
    exam_id: i64,
    attempt_number: i32,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM attempts \
         WHERE examinee_id = $1 AND exam_id = $2 AND attempt_number = $3"
    ))
    .bind(examinee_id)
    .bind(exam_id)
    .bind(attempt_number)
    .fetch_optional(executor)
    .await
}

/// Latest in-progress attempt created by the given session.
pub(crate) async fn find_open_for_session(
    executor: impl sqlx::PgExecutor<'_>,
    examinee_id: i64,
    exam_id: i64,
    session_key: &str,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM attempts \
         WHERE examinee_id = $1 AND exam_id = $2 AND status = $3 \
           AND metadata->>'session' = $4 \
         ORDER BY attempt_number DESC \
         LIMIT 1"
    ))
    .bind(examinee_id)
    .bind(exam_id)
    .bind(AttemptStatus::InProgress)
    .bind(session_key)
    .fetch_optional(executor)
    .await
}

/// Serializes attempt creation for one (examinee, exam) pair until the
/// surrounding transaction ends.
pub(crate) async fn lock_examinee_exam(
    executor: impl sqlx::PgExecutor<'_>,
    examinee_id: i64,
    exam_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(format!("attempt:{examinee_id}:{exam_id}"))
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn next_attempt_number(
    executor: impl sqlx::PgExecutor<'_>,
    examinee_id: i64,
    exam_id: i64,
) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COALESCE(MAX(attempt_number), 0) + 1 FROM attempts \
         WHERE examinee_id = $1 AND exam_id = $2",
    )
    .bind(examinee_id)
    .bind(exam_id)
    .fetch_one(executor)
    .await
}

/// Returns `None` when a row with the same attempt number already exists.
pub(crate) async fn insert_if_absent(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateAttempt,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "INSERT INTO attempts (examinee_id, exam_id, attempt_number, status, started_at, \
                               metadata, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $5, $5) \
         ON CONFLICT ON CONSTRAINT uq_attempts_examinee_exam_number DO NOTHING \
         RETURNING {COLUMNS}"
    ))
    .bind(params.examinee_id)
    .bind(params.exam_id)
    .bind(params.attempt_number)
    .bind(AttemptStatus::InProgress)
    .bind(params.started_at)
    .bind(sqlx::types::Json(params.metadata))
    .fetch_optional(executor)
    .await
}

/// Returns `None` unless the attempt was still in progress.
pub(crate) async fn mark_submitted(
    executor: impl sqlx::PgExecutor<'_>,
    id: i64,
    submitted_at: PrimitiveDateTime,
    duration_seconds: i32,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "UPDATE attempts \
         SET status = $2, submitted_at = $3, duration_seconds = $4, updated_at = $3 \
         WHERE id = $1 AND status = $5 \
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(AttemptStatus::Submitted)
    .bind(submitted_at)
    .bind(duration_seconds)
    .bind(AttemptStatus::InProgress)
    .fetch_optional(executor)
    .await
}
