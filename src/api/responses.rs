use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentExaminee;
use crate::core::state::AppState;
use crate::db::models::{Attempt, Examinee};
use crate::db::types::QuestionVariant;
use crate::repositories;
use crate::schemas::responses::{
    AttemptResponse, ProgressResponse, SaveAnswerRequest, SaveAnswerResponse,
    SubmitAttemptResponse,
};
use crate::services::error::FlowError;
use crate::services::question_catalog::QuestionKey;
use crate::services::{answer_upsert, attempt_lifecycle};


pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/start/:exam_id", post(start_attempt))
        .route("/save", post(save_answer))
        .route("/submit/:attempt_id", post(submit_attempt))
        .route("/attempts/:attempt_id/progress", get(attempt_progress))
}

async fn ping() -> &'static str {
    "responses ok"
}

async fn start_attempt(
    State(state): State<AppState>,
    current: CurrentExaminee,
    Path(exam_id): Path<i64>,
) -> Result<Json<AttemptResponse>, ApiError> {
    let exam = repositories::exams::find_by_id(state.db(), exam_id)
        .await
        .map_err(FlowError::from)?
        .ok_or(FlowError::NotFound("Exam"))?;

    if exam.battery_id != current.examinee.battery_id {
        return Err(FlowError::InvalidSessionContext("Exam is not part of your battery").into());
    }

    let attempt =
        attempt_lifecycle::resolve_attempt(state.db(), state.sessions(), &current.session, &exam)
            .await?;

    Ok(Json(AttemptResponse::from(&attempt)))
}

async fn save_answer(
    State(state): State<AppState>,
    current: CurrentExaminee,
    Json(payload): Json<SaveAnswerRequest>,
) -> Result<Json<SaveAnswerResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let variant = QuestionVariant::parse(&payload.variant)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown variant '{}'", payload.variant)))?;
    let raw = value_text(&payload.value)
        .ok_or_else(|| ApiError::BadRequest("value must be a string, number or boolean".into()))?;

    let attempt = owned_attempt(&state, &current.examinee, payload.attempt_id).await?;
    if attempt.status.is_terminal() {
        return Err(FlowError::AttemptClosed.into());
    }

    let belongs = repositories::questions::belongs_to_exam(
        state.db(),
        variant,
        payload.question_id,
        payload.exam_id,
    )
    .await
    .map_err(FlowError::from)?;
    if !belongs {
        return Err(FlowError::NotFound("Question").into());
    }

    let answer = answer_upsert::save_answer(
        state.db(),
        &attempt,
        current.examinee.id,
        payload.exam_id,
        QuestionKey::new(variant, payload.question_id),
        &raw,
    )
    .await?
    .ok_or_else(|| ApiError::BadRequest("value must not be empty".into()))?;

    Ok(Json(SaveAnswerResponse { status: "saved", answer_id: answer.id }))
}

async fn submit_attempt(
    State(state): State<AppState>,
    current: CurrentExaminee,
    Path(attempt_id): Path<i64>,
) -> Result<Json<SubmitAttemptResponse>, ApiError> {
    let attempt = owned_attempt(&state, &current.examinee, attempt_id).await?;
    let finalized = attempt_lifecycle::finalize(state.db(), attempt.id).await?;

    Ok(Json(SubmitAttemptResponse::from(&finalized)))
}

async fn attempt_progress(
    State(state): State<AppState>,
    current: CurrentExaminee,
    Path(attempt_id): Path<i64>,
) -> Result<Json<ProgressResponse>, ApiError> {
    let attempt = owned_attempt(&state, &current.examinee, attempt_id).await?;

    let answered = repositories::answers::count_for_attempt(state.db(), attempt.id)
        .await
        .map_err(FlowError::from)?;
    let total = repositories::questions::count_for_exam(state.db(), attempt.exam_id)
        .await
        .map_err(FlowError::from)?;

    Ok(Json(ProgressResponse {
        attempt_id: attempt.id,
        status: attempt.status,
        answered,
        total,
        progress_percent: progress_percent(answered, total),
    }))
}

async fn owned_attempt(
    state: &AppState,
    examinee: &Examinee,
    attempt_id: i64,
) -> Result<Attempt, ApiError> {
    let attempt = repositories::attempts::find_by_id(state.db(), attempt_id)
        .await
        .map_err(FlowError::from)?
        .ok_or(FlowError::NotFound("Attempt"))?;

    if attempt.examinee_id != examinee.id {
        return Err(FlowError::InvalidSessionContext("Invalid examinee context").into());
    }

    Ok(attempt)
}

/// Text form of a JSON answer value. Booleans use the `True`/`False` literals
/// the true/false coercion expects.
fn value_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(text) => Some(text.clone()),
        serde_json::Value::Number(number) => Some(number.to_string()),
        serde_json::Value::Bool(true) => Some("True".to_string()),
        serde_json::Value::Bool(false) => Some("False".to_string()),
        _ => None,
    }
}

/// Rounded share of answered questions; 0 for an exam without questions.
fn progress_percent(answered: i64, total: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    ((answered as f64 / total as f64) * 100.0).round() as i64
}
