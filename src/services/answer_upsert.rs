use sqlx::PgPool;

use crate::core::{metrics, time::primitive_now_utc};
use crate::db::models::{Answer, Attempt};
use crate::db::types::QuestionVariant;
use crate::repositories;
use crate::repositories::answers::UpsertAnswer;
use crate::services::error::FlowError;
use crate::services::question_catalog::QuestionKey;

/// A submitted value converted to the typed answer columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CoercedAnswer {
    pub(crate) mcq_choice_id: Option<i64>,
    pub(crate) likert_value: Option<i32>,
    pub(crate) true_false_value: Option<bool>,
    pub(crate) essay_text: Option<String>,
    pub(crate) raw_value: String,
}

/// `None` for blank input. Unparseable numbers keep only the raw value.
pub(crate) fn coerce(variant: QuestionVariant, raw: &str) -> Option<CoercedAnswer> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let mut answer = CoercedAnswer {
        mcq_choice_id: None,
        likert_value: None,
        true_false_value: None,
        essay_text: None,
        raw_value: raw.to_string(),
    };

    match variant {
        QuestionVariant::Mcq => answer.mcq_choice_id = raw.parse().ok(),
        QuestionVariant::Likert => answer.likert_value = raw.parse().ok(),
        // Exact match only; "true" and "1" are stored as false.
        QuestionVariant::TrueFalse => answer.true_false_value = Some(raw == "True"),
        QuestionVariant::Essay => answer.essay_text = Some(raw.to_string()),
    }

    Some(answer)
}

/// Upserts every non-blank value in one transaction and returns how many rows
/// were written.
pub(crate) async fn save_answers(
    pool: &PgPool,
    attempt: &Attempt,
    examinee_id: i64,
    exam_id: i64,
    submitted: &[(QuestionKey, String)],
) -> Result<usize, FlowError> {
    let written = write_batch(pool, attempt, examinee_id, exam_id, submitted).await?;
    Ok(written.len())
}

/// Single-question variant of [`save_answers`]; returns the stored row, or
/// `None` when the value was blank.
pub(crate) async fn save_answer(
    pool: &PgPool,
    attempt: &Attempt,
    examinee_id: i64,
    exam_id: i64,
    key: QuestionKey,
    raw: &str,
) -> Result<Option<Answer>, FlowError> {
    let written =
        write_batch(pool, attempt, examinee_id, exam_id, &[(key, raw.to_string())]).await?;
    Ok(written.into_iter().next())
}

fn ensure_owner(attempt: &Attempt, examinee_id: i64, exam_id: i64) -> Result<(), FlowError> {
    if attempt.examinee_id != examinee_id || attempt.exam_id != exam_id {
        return Err(FlowError::InvalidSessionContext(
            "Attempt does not belong to this examinee and exam",
        ));
    }
    Ok(())
}

async fn write_batch(
    pool: &PgPool,
    attempt: &Attempt,
    examinee_id: i64,
    exam_id: i64,
    submitted: &[(QuestionKey, String)],
) -> Result<Vec<Answer>, FlowError> {
    ensure_owner(attempt, examinee_id, exam_id)?;

    let coerced: Vec<(QuestionKey, CoercedAnswer)> = submitted
        .iter()
        .filter_map(|(key, raw)| coerce(key.variant, raw).map(|answer| (*key, answer)))
        .collect();
    if coerced.is_empty() {
        return Ok(Vec::new());
    }

    let now = primitive_now_utc();
    let mut tx = pool.begin().await?;
    let mut written = Vec::with_capacity(coerced.len());

    for (key, answer) in &coerced {
        let stored = repositories::answers::upsert(
            &mut *tx,
            UpsertAnswer {
                attempt_id: attempt.id,
                examinee_id: attempt.examinee_id,
                exam_id: attempt.exam_id,
                variant: key.variant,
                question_id: key.id,
                mcq_choice_id: answer.mcq_choice_id,
                likert_value: answer.likert_value,
                true_false_value: answer.true_false_value,
                essay_text: answer.essay_text.as_deref(),
                raw_value: &answer.raw_value,
                now,
            },
        )
        .await?;
        written.push(stored);
    }

    tx.commit().await?;

    metrics::answers_saved(written.len() as u64);
    tracing::debug!(attempt_id = attempt.id, saved = written.len(), "Answers saved");

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::attempt_lifecycle;
    use crate::test_support;

    #[test]
    fn blank_values_are_skipped() {
        assert_eq!(coerce(QuestionVariant::Essay, ""), None);
        assert_eq!(coerce(QuestionVariant::Mcq, "   \t"), None);
    }

    #[test]
    fn true_false_matches_exact_literal() {
        assert_eq!(coerce(QuestionVariant::TrueFalse, "True").unwrap().true_false_value, Some(true));
        assert_eq!(coerce(QuestionVariant::TrueFalse, " True ").unwrap().true_false_value, Some(true));
        assert_eq!(coerce(QuestionVariant::TrueFalse, "true").unwrap().true_false_value, Some(false));

        let maybe = coerce(QuestionVariant::TrueFalse, "maybe").unwrap();
        assert_eq!(maybe.true_false_value, Some(false));
        assert_eq!(maybe.raw_value, "maybe");
    }

    #[test]
    fn unparseable_numbers_keep_raw_value_only() {
        let mcq = coerce(QuestionVariant::Mcq, "abc").unwrap();
        assert_eq!(mcq.mcq_choice_id, None);
        assert_eq!(mcq.raw_value, "abc");

        let likert = coerce(QuestionVariant::Likert, "4.5").unwrap();
        assert_eq!(likert.likert_value, None);
    }

    #[test]
    fn numeric_values_are_parsed() {
        assert_eq!(coerce(QuestionVariant::Mcq, " 12 ").unwrap().mcq_choice_id, Some(12));
        assert_eq!(coerce(QuestionVariant::Likert, "5").unwrap().likert_value, Some(5));
    }

    #[test]
    fn essay_keeps_trimmed_text() {
        let essay = coerce(QuestionVariant::Essay, "  Because it rains.  ").unwrap();
        assert_eq!(essay.essay_text.as_deref(), Some("Because it rains."));
        assert_eq!(essay.raw_value, "Because it rains.");
        assert_eq!(essay.mcq_choice_id, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_saves_to_one_question_keep_a_single_row() {
        let ctx = test_support::setup_test_context().await;
        let fixture = test_support::seed_battery(ctx.state.db()).await;
        let pool = ctx.state.db();
        let exam = repositories::exams::find_by_id(pool, fixture.first_exam_id)
            .await
            .expect("load exam")
            .expect("exam exists");
        let (_, session) = ctx.state.sessions().open(fixture.examinee_id).await.expect("session");
        let attempt =
            attempt_lifecycle::resolve_attempt(pool, ctx.state.sessions(), &session, &exam)
                .await
                .expect("start");

        let key = QuestionKey::new(QuestionVariant::Likert, fixture.likert_id);
        let first = [(key, "2".to_string())];
        let second = [(key, "5".to_string())];
        let (a, b) = tokio::join!(
            save_answers(pool, &attempt, fixture.examinee_id, exam.id, &first),
            save_answers(pool, &attempt, fixture.examinee_id, exam.id, &second),
        );
        assert_eq!(a.expect("first save"), 1);
        assert_eq!(b.expect("second save"), 1);

        let rows: Vec<(Option<i32>, String)> = sqlx::query_as(
            "SELECT likert_value, raw_value FROM answers WHERE attempt_id = $1",
        )
        .bind(attempt.id)
        .fetch_all(pool)
        .await
        .expect("answers");
        assert_eq!(rows.len(), 1);
        let (value, raw) = &rows[0];
        assert!(matches!(value, Some(2) | Some(5)), "unexpected value {value:?}");
        assert_eq!(raw, &value.map(|v| v.to_string()).unwrap_or_default());
    }
}
