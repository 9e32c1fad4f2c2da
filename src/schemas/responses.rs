use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Attempt;
use crate::db::types::AttemptStatus;

#[derive(Debug, Serialize)]
pub(crate) struct AttemptResponse {
    pub(crate) attempt_id: i64,
    pub(crate) exam_id: i64,
    pub(crate) attempt_number: i32,
    pub(crate) status: AttemptStatus,
    pub(crate) started_at: String,
}

impl From<&Attempt> for AttemptResponse {
    fn from(attempt: &Attempt) -> Self {
        Self {
            attempt_id: attempt.id,
            exam_id: attempt.exam_id,
            attempt_number: attempt.attempt_number,
            status: attempt.status,
            started_at: format_primitive(attempt.started_at),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SaveAnswerRequest {
    #[validate(range(min = 1, message = "attempt_id must be positive"))]
    pub(crate) attempt_id: i64,
    #[validate(range(min = 1, message = "exam_id must be positive"))]
    pub(crate) exam_id: i64,
    #[validate(range(min = 1, message = "question_id must be positive"))]
    pub(crate) question_id: i64,
    #[serde(alias = "qtype")]
    pub(crate) variant: String,
    /// String, number or boolean; stored as its text form.
    pub(crate) value: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub(crate) struct SaveAnswerResponse {
    pub(crate) status: &'static str,
    pub(crate) answer_id: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitAttemptResponse {
    pub(crate) status: &'static str,
    pub(crate) attempt_id: i64,
    pub(crate) submitted_at: Option<String>,
    pub(crate) duration_seconds: Option<i32>,
}

impl From<&Attempt> for SubmitAttemptResponse {
    fn from(attempt: &Attempt) -> Self {
        Self {
            status: "submitted",
            attempt_id: attempt.id,
            submitted_at: attempt.submitted_at.map(format_primitive),
            duration_seconds: attempt.duration_seconds,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ProgressResponse {
    pub(crate) attempt_id: i64,
    pub(crate) status: AttemptStatus,
    pub(crate) answered: i64,
    pub(crate) total: i64,
    pub(crate) progress_percent: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EssayAutosaveRequest {
    pub(crate) question_id: serde_json::Value,
    #[serde(default)]
    pub(crate) answer: String,
}
