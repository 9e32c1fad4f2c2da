use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde_json::json;

use crate::api::guards;
use crate::core::state::AppState;
use crate::db::types::QuestionVariant;
use crate::schemas::responses::EssayAutosaveRequest;
use crate::services::question_catalog::QuestionKey;

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/save-essay", any(save_essay))
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Keeps an in-progress essay in the session cache. Nothing reaches the
/// database until the page itself is submitted.
async fn save_essay(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if method != Method::POST {
        return error(StatusCode::BAD_REQUEST, "Invalid request");
    }

    let current = match guards::resolve_examinee(&state, &headers).await {
        Ok(current) => current,
        Err(err) => return error(err.status(), err.detail()),
    };

    let payload: EssayAutosaveRequest = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => return error(StatusCode::BAD_REQUEST, format!("Invalid JSON: {err}")),
    };

    let Some(question_id) = parse_question_id(&payload.question_id) else {
        return error(StatusCode::BAD_REQUEST, "question_id must be a positive integer");
    };

    let max_chars = state.settings().exam().essay_autosave_max_chars;
    if payload.answer.chars().count() > max_chars {
        return error(
            StatusCode::BAD_REQUEST,
            format!("answer exceeds {max_chars} characters"),
        );
    }

    let key = QuestionKey::new(QuestionVariant::Essay, question_id);
    let cached = state.sessions().cache_answers(&current.session, &[(key, payload.answer)]).await;
    if let Err(err) = cached {
        tracing::error!(error = %err, "Failed to autosave essay");
        return error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save answer");
    }

    Json(json!({ "status": "saved" })).into_response()
}

fn parse_question_id(value: &serde_json::Value) -> Option<i64> {
    let id = match value {
        serde_json::Value::Number(number) => number.as_i64(),
        serde_json::Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }?;
    (id > 0).then_some(id)
}
