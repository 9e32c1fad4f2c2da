use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::core::{metrics, time::primitive_now_utc};
use crate::db::models::{Attempt, Exam};
use crate::db::types::AttemptStatus;
use crate::repositories;
use crate::repositories::attempts::CreateAttempt;
use crate::services::error::FlowError;
use crate::services::session_context::{ExamineeSession, SessionStore};

/// Returns the attempt this session is working on for `exam`, starting a new
/// one when there is nothing to resume.
pub(crate) async fn resolve_attempt(
    pool: &PgPool,
    sessions: &SessionStore,
    session: &ExamineeSession,
    exam: &Exam,
) -> Result<Attempt, FlowError> {
    let examinee_id = session.examinee_id();

    if let Some(remembered) = sessions.remembered_attempt(session, exam.id).await? {
        if let Some(attempt) = repositories::attempts::find_by_id(pool, remembered).await? {
            if is_resumable(&attempt, examinee_id, exam.id) {
                return Ok(attempt);
            }
        }
    }

    let attempt = start_attempt(pool, session, exam.id).await?;
    sessions.remember_attempt(session, exam.id, attempt.id).await?;

    Ok(attempt)
}

pub(crate) fn is_resumable(attempt: &Attempt, examinee_id: i64, exam_id: i64) -> bool {
    attempt.examinee_id == examinee_id
        && attempt.exam_id == exam_id
        && attempt.status == AttemptStatus::InProgress
}

async fn start_attempt(
    pool: &PgPool,
    session: &ExamineeSession,
    exam_id: i64,
) -> Result<Attempt, FlowError> {
    let examinee_id = session.examinee_id();
    let mut tx = pool.begin().await?;

    repositories::attempts::lock_examinee_exam(&mut *tx, examinee_id, exam_id).await?;

    // A concurrent request from this session may have created it while we waited.
    if let Some(existing) = repositories::attempts::find_open_for_session(
        &mut *tx,
        examinee_id,
        exam_id,
        session.key(),
    )
    .await?
    {
        tx.commit().await?;
        return Ok(existing);
    }

    let attempt_number =
        repositories::attempts::next_attempt_number(&mut *tx, examinee_id, exam_id).await?;

    let inserted = repositories::attempts::insert_if_absent(
        &mut *tx,
        CreateAttempt {
            examinee_id,
            exam_id,
            attempt_number,
            started_at: primitive_now_utc(),
            metadata: serde_json::json!({ "session": session.key() }),
        },
    )
    .await?;

    let created = inserted.is_some();
    let attempt = match inserted {
        Some(attempt) => attempt,
        // Another request inserted this number first.
        None => {
            repositories::attempts::find_by_number(&mut *tx, examinee_id, exam_id, attempt_number)
                .await?
                .ok_or(FlowError::NotFound("Attempt"))?
        }
    };

    tx.commit().await?;

    if created {
        metrics::attempt_created();
        tracing::info!(
            attempt_id = attempt.id,
            examinee_id,
            exam_id,
            attempt_number = attempt.attempt_number,
            "Attempt started"
        );
    }

    Ok(attempt)
}

/// Marks an in-progress attempt submitted. A submitted attempt is returned
/// as is; expired and abandoned attempts are closed for good.
pub(crate) async fn finalize(pool: &PgPool, attempt_id: i64) -> Result<Attempt, FlowError> {
    let attempt = repositories::attempts::find_by_id(pool, attempt_id)
        .await?
        .ok_or(FlowError::NotFound("Attempt"))?;

    match attempt.status {
        AttemptStatus::InProgress => {}
        AttemptStatus::Submitted => return Ok(attempt),
        AttemptStatus::Expired | AttemptStatus::Abandoned => return Err(FlowError::AttemptClosed),
    }

    let submitted_at = primitive_now_utc();
    let duration = duration_seconds(attempt.started_at, submitted_at);

    match repositories::attempts::mark_submitted(pool, attempt_id, submitted_at, duration).await? {
        Some(updated) => {
            metrics::attempt_finalized();
            tracing::info!(
                attempt_id,
                examinee_id = updated.examinee_id,
                exam_id = updated.exam_id,
                duration_seconds = duration,
                "Attempt submitted"
            );
            Ok(updated)
        }
        None => {
            let current = repositories::attempts::find_by_id(pool, attempt_id)
                .await?
                .ok_or(FlowError::NotFound("Attempt"))?;
            if current.status == AttemptStatus::Submitted {
                Ok(current)
            } else {
                Err(FlowError::AttemptClosed)
            }
        }
    }
}

/// Whole seconds between start and submission, never negative.
pub(crate) fn duration_seconds(started_at: PrimitiveDateTime, submitted_at: PrimitiveDateTime) -> i32 {
    let seconds = (submitted_at - started_at).whole_seconds().max(0);
    i32::try_from(seconds).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    use crate::test_support;

    fn attempt(examinee_id: i64, exam_id: i64, status: AttemptStatus) -> Attempt {
        let now = datetime!(2025-03-01 09:00:00);
        Attempt {
            id: 1,
            examinee_id,
            exam_id,
            attempt_number: 1,
            status,
            started_at: now,
            submitted_at: None,
            duration_seconds: None,
            raw_score: None,
            scaled_score: None,
            metadata: sqlx::types::Json(serde_json::json!({})),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn duration_is_floored_to_whole_seconds() {
        let started = datetime!(2025-03-01 09:00:00);
        let submitted = datetime!(2025-03-01 09:01:30.9);
        assert_eq!(duration_seconds(started, submitted), 90);
    }

    #[test]
    fn duration_never_goes_negative() {
        let started = datetime!(2025-03-01 09:00:05);
        let submitted = datetime!(2025-03-01 09:00:00);
        assert_eq!(duration_seconds(started, submitted), 0);
    }

    #[test]
    fn only_matching_in_progress_attempts_resume() {
        assert!(is_resumable(&attempt(1, 2, AttemptStatus::InProgress), 1, 2));
        assert!(!is_resumable(&attempt(1, 2, AttemptStatus::Submitted), 1, 2));
        assert!(!is_resumable(&attempt(1, 2, AttemptStatus::Expired), 1, 2));
        assert!(!is_resumable(&attempt(9, 2, AttemptStatus::InProgress), 1, 2));
        assert!(!is_resumable(&attempt(1, 9, AttemptStatus::InProgress), 1, 2));
    }

    async fn first_exam(pool: &PgPool, exam_id: i64) -> Exam {
        repositories::exams::find_by_id(pool, exam_id)
            .await
            .expect("load exam")
            .expect("exam exists")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn racing_starts_in_one_session_share_an_attempt() {
        let ctx = test_support::setup_test_context().await;
        let fixture = test_support::seed_battery(ctx.state.db()).await;
        let pool = ctx.state.db();
        let sessions = ctx.state.sessions();
        let exam = first_exam(pool, fixture.first_exam_id).await;
        let (_, session) = sessions.open(fixture.examinee_id).await.expect("open session");

        let (a, b) = tokio::join!(
            resolve_attempt(pool, sessions, &session, &exam),
            resolve_attempt(pool, sessions, &session, &exam),
        );
        let (a, b) = (a.expect("first start"), b.expect("second start"));

        assert_eq!(a.id, b.id);
        assert_eq!(a.attempt_number, 1);
        assert_eq!(a.metadata.0["session"], session.key());
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attempts WHERE exam_id = $1")
            .bind(exam.id)
            .fetch_one(pool)
            .await
            .expect("count attempts");
        assert_eq!(rows, 1);

        let (_, other) = sessions.open(fixture.examinee_id).await.expect("open session");
        let next = resolve_attempt(pool, sessions, &other, &exam).await.expect("other start");
        assert_ne!(next.id, a.id);
        assert_eq!(next.attempt_number, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn racing_starts_from_two_sessions_get_distinct_numbers() {
        let ctx = test_support::setup_test_context().await;
        let fixture = test_support::seed_battery(ctx.state.db()).await;
        let pool = ctx.state.db();
        let sessions = ctx.state.sessions();
        let exam = first_exam(pool, fixture.first_exam_id).await;
        let (_, first) = sessions.open(fixture.examinee_id).await.expect("open session");
        let (_, second) = sessions.open(fixture.examinee_id).await.expect("open session");

        let (a, b) = tokio::join!(
            resolve_attempt(pool, sessions, &first, &exam),
            resolve_attempt(pool, sessions, &second, &exam),
        );
        let mut numbers = vec![
            a.expect("first start").attempt_number,
            b.expect("second start").attempt_number,
        ];
        numbers.sort_unstable();

        assert_eq!(numbers, vec![1, 2]);
    }

    #[tokio::test]
    async fn finalize_leaves_expired_attempt_closed() {
        let ctx = test_support::setup_test_context().await;
        let fixture = test_support::seed_battery(ctx.state.db()).await;
        let pool = ctx.state.db();
        let sessions = ctx.state.sessions();
        let exam = first_exam(pool, fixture.first_exam_id).await;
        let (_, session) = sessions.open(fixture.examinee_id).await.expect("open session");
        let attempt = resolve_attempt(pool, sessions, &session, &exam).await.expect("start");

        sqlx::query("UPDATE attempts SET status = 'expired' WHERE id = $1")
            .bind(attempt.id)
            .execute(pool)
            .await
            .expect("expire attempt");

        let result = finalize(pool, attempt.id).await;
        assert!(matches!(result, Err(FlowError::AttemptClosed)));

        let stored = repositories::attempts::find_by_id(pool, attempt.id)
            .await
            .expect("load attempt")
            .expect("attempt exists");
        assert_eq!(stored.status, AttemptStatus::Expired);
        assert_eq!(stored.submitted_at, None);
        assert_eq!(stored.duration_seconds, None);
    }

    #[tokio::test]
    async fn finalize_twice_keeps_first_submission() {
        let ctx = test_support::setup_test_context().await;
        let fixture = test_support::seed_battery(ctx.state.db()).await;
        let pool = ctx.state.db();
        let sessions = ctx.state.sessions();
        let exam = first_exam(pool, fixture.first_exam_id).await;
        let (_, session) = sessions.open(fixture.examinee_id).await.expect("open session");
        let attempt = resolve_attempt(pool, sessions, &session, &exam).await.expect("start");

        let first = finalize(pool, attempt.id).await.expect("first finalize");
        let second = finalize(pool, attempt.id).await.expect("second finalize");

        assert_eq!(first.status, AttemptStatus::Submitted);
        assert_eq!(first.submitted_at, second.submitted_at);
        assert_eq!(first.duration_seconds, second.duration_seconds);
    }
}
