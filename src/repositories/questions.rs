use sqlx::PgPool;

use crate::db::models::{LikertOption, McqChoice, QuestionRow};
use crate::db::types::QuestionVariant;

fn select_for(variant: QuestionVariant) -> &'static str {
    match variant {
        QuestionVariant::Likert => {
            "SELECT id, exam_id, sort_order, NULL::text AS question_text, NULL::text AS statement, \
             NULL::text AS prompt, text, scale_id, NULL::text AS explanation \
             FROM likert_questions WHERE exam_id = $1 ORDER BY sort_order, id"
        }
        QuestionVariant::Mcq => {
            "SELECT id, exam_id, sort_order, question_text, NULL::text AS statement, \
             NULL::text AS prompt, NULL::text AS text, NULL::bigint AS scale_id, \
             NULL::text AS explanation \
             FROM mcq_questions WHERE exam_id = $1 ORDER BY sort_order, id"
        }
        QuestionVariant::TrueFalse => {
            "SELECT id, exam_id, sort_order, NULL::text AS question_text, statement, \
             NULL::text AS prompt, NULL::text AS text, NULL::bigint AS scale_id, \
             NULL::text AS explanation \
             FROM true_false_questions WHERE exam_id = $1 ORDER BY sort_order, id"
        }
        QuestionVariant::Essay => {
            "SELECT id, exam_id, sort_order, NULL::text AS question_text, NULL::text AS statement, \
             prompt, NULL::text AS text, NULL::bigint AS scale_id, explanation \
             FROM essay_questions WHERE exam_id = $1 ORDER BY sort_order, id"
        }
    }
}

fn table_for(variant: QuestionVariant) -> &'static str {
    match variant {
        QuestionVariant::Likert => "likert_questions",
        QuestionVariant::Mcq => "mcq_questions",
        QuestionVariant::TrueFalse => "true_false_questions",
        QuestionVariant::Essay => "essay_questions",
    }
}

pub(crate) async fn list_for_exam(
    pool: &PgPool,
    variant: QuestionVariant,
    exam_id: i64,
) -> Result<Vec<QuestionRow>, sqlx::Error> {
    sqlx::query_as::<_, QuestionRow>(select_for(variant)).bind(exam_id).fetch_all(pool).await
}

pub(crate) async fn likert_options_for_scales(
    pool: &PgPool,
    scale_ids: &[i64],
) -> Result<Vec<LikertOption>, sqlx::Error> {
    if scale_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, LikertOption>(
        "SELECT id, scale_id, label, value FROM likert_options \
         WHERE scale_id = ANY($1) ORDER BY scale_id, id",
    )
    .bind(scale_ids)
    .fetch_all(pool)
    .await
}

pub(crate) async fn mcq_choices_for_questions(
    pool: &PgPool,
    question_ids: &[i64],
) -> Result<Vec<McqChoice>, sqlx::Error> {
    if question_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, McqChoice>(
        "SELECT id, question_id, choice_text FROM mcq_choices \
         WHERE question_id = ANY($1) ORDER BY question_id, id",
    )
    .bind(question_ids)
    .fetch_all(pool)
    .await
}

pub(crate) async fn belongs_to_exam(
    pool: &PgPool,
    variant: QuestionVariant,
    question_id: i64,
    exam_id: i64,
) -> Result<bool, sqlx::Error> {
    let found: Option<i64> = sqlx::query_scalar(&format!(
        "SELECT id FROM {} WHERE id = $1 AND exam_id = $2",
        table_for(variant)
    ))
    .bind(question_id)
    .bind(exam_id)
    .fetch_optional(pool)
    .await?;

    Ok(found.is_some())
}

pub(crate) async fn count_for_exam(pool: &PgPool, exam_id: i64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT (SELECT COUNT(*) FROM likert_questions WHERE exam_id = $1) \
              + (SELECT COUNT(*) FROM mcq_questions WHERE exam_id = $1) \
              + (SELECT COUNT(*) FROM true_false_questions WHERE exam_id = $1) \
              + (SELECT COUNT(*) FROM essay_questions WHERE exam_id = $1)",
    )
    .bind(exam_id)
    .fetch_one(pool)
    .await
}
