use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentExaminee;
use crate::core::security;
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::auth::{LoginRequest, LoginResponse};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/login", post(login)).route("/logout", post(logout))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let examinee = repositories::examinees::find_by_username(state.db(), payload.username.trim())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch examinee"))?;

    let Some(examinee) = examinee else {
        return Err(ApiError::Unauthorized("Incorrect username or password"));
    };

    let valid = security::verify_password(&payload.password, &examinee.hashed_password)
        .map_err(|e| ApiError::internal(e, "Failed to verify password"))?;

    if !valid || !examinee.is_active {
        return Err(ApiError::Unauthorized("Incorrect username or password"));
    }

    let (session_token, _) = state
        .sessions()
        .open(examinee.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to open session"))?;

    tracing::info!(examinee_id = examinee.id, "Examinee signed in");

    Ok(Json(LoginResponse {
        session_token,
        token_type: "bearer".to_string(),
        examinee_id: examinee.id,
        full_name: examinee.full_name,
    }))
}

async fn logout(
    State(state): State<AppState>,
    current: CurrentExaminee,
) -> Result<StatusCode, ApiError> {
    state
        .sessions()
        .close(&current.session)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to close session"))?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::test_support;

    #[tokio::test]
    async fn login_opens_session_and_logout_closes_it() {
        let ctx = test_support::setup_test_context().await;
        let battery_id = test_support::insert_battery(ctx.state.db(), "Aptitude").await;
        let examinee =
            test_support::insert_examinee(ctx.state.db(), "amira", "s3cret-pass", battery_id)
                .await;

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({"username": "amira", "password": "s3cret-pass"})),
            ))
            .await
            .expect("login");
        assert_eq!(response.status(), StatusCode::OK);
        let body = test_support::read_json(response).await;
        assert_eq!(body["examinee_id"], examinee.id);
        let token = body["session_token"].as_str().expect("token").to_string();

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/v1/auth/logout",
                Some(&token),
                None,
            ))
            .await
            .expect("logout");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(Method::GET, "/api/v1/battery", Some(&token), None))
            .await
            .expect("battery");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_rejects_wrong_password() {
        let ctx = test_support::setup_test_context().await;
        let battery_id = test_support::insert_battery(ctx.state.db(), "Aptitude").await;
        test_support::insert_examinee(ctx.state.db(), "amira", "s3cret-pass", battery_id).await;

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({"username": "amira", "password": "wrong"})),
            ))
            .await
            .expect("login");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = test_support::read_json(response).await;
        assert_eq!(body["detail"], "Incorrect username or password");
    }
}
