use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::db::models::Examinee;
use crate::repositories;
use crate::services::session_context::ExamineeSession;

/// The signed-in examinee and the session the request arrived with.
pub(crate) struct CurrentExaminee {
    pub(crate) examinee: Examinee,
    pub(crate) session: ExamineeSession,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentExaminee {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        resolve_examinee(state, &parts.headers).await
    }
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub(crate) async fn resolve_examinee(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<CurrentExaminee, ApiError> {
    let token = bearer_token(headers).ok_or(ApiError::Unauthorized("Not authenticated"))?;

    let session = state
        .sessions()
        .resolve(token)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to read session"))?
        .ok_or(ApiError::Unauthorized("Session expired or invalid"))?;

    let examinee = repositories::examinees::find_by_id(state.db(), session.examinee_id())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load examinee"))?;

    let Some(examinee) = examinee else {
        return Err(ApiError::Unauthorized("Examinee not found"));
    };

    if !examinee.is_active {
        return Err(ApiError::Unauthorized("Examinee account is disabled"));
    }

    Ok(CurrentExaminee { examinee, session })
}
