use axum::{
    extract::{Form, Query, State},
    routing::get,
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentExaminee;
use crate::core::state::AppState;
use crate::schemas::battery::{BatteryPageResponse, BatteryQuery, BatteryResponse, CompletedAttempt};
use crate::services::battery_progress::{self, BatteryView, PageSubmission, SubmitOutcome};


pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/", get(view_page).post(submit_page))
}

async fn view_page(
    State(state): State<AppState>,
    current: CurrentExaminee,
    Query(query): Query<BatteryQuery>,
) -> Result<Json<BatteryResponse>, ApiError> {
    let view = battery_progress::view(
        state.db(),
        state.sessions(),
        &current.session,
        &current.examinee,
        query.exam,
    )
    .await?;

    let response = match view {
        BatteryView::NoExams => BatteryResponse::NoExams,
        BatteryView::Completed => BatteryResponse::Completed { attempt: None, saved: 0 },
        BatteryView::AtExam(page) => {
            BatteryResponse::AtExam(BatteryPageResponse::from_page(page, None))
        }
    };

    Ok(Json(response))
}

async fn submit_page(
    State(state): State<AppState>,
    current: CurrentExaminee,
    Query(query): Query<BatteryQuery>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<Json<BatteryResponse>, ApiError> {
    let submission = PageSubmission::from_form(fields);
    let auto_submit = submission.auto_submit;

    let outcome = battery_progress::submit(
        state.db(),
        state.sessions(),
        &current.session,
        &current.examinee,
        query.exam,
        submission,
    )
    .await?;

    let response = match outcome {
        SubmitOutcome::NoExams => BatteryResponse::NoExams,
        SubmitOutcome::Incomplete { page, warning } => {
            BatteryResponse::Incomplete(BatteryPageResponse::from_page(page, Some(warning)))
        }
        SubmitOutcome::Advanced { next_index, attempt, saved } => {
            tracing::info!(
                examinee_id = current.examinee.id,
                attempt_id = attempt.id,
                next_exam = next_index,
                auto_submit,
                "Battery page accepted"
            );
            BatteryResponse::Advanced { next_exam: next_index, attempt_id: attempt.id, saved }
        }
        SubmitOutcome::Completed { attempt, saved } => {
            tracing::info!(examinee_id = current.examinee.id, auto_submit, "Battery completed");
            BatteryResponse::Completed {
                attempt: attempt.as_ref().map(CompletedAttempt::from),
                saved,
            }
        }
    };

    Ok(Json(response))
}
