use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{AttemptStatus, QuestionVariant};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Examinee {
    pub(crate) id: i64,
    pub(crate) username: String,
    #[serde(skip_serializing)]
    pub(crate) hashed_password: String,
    pub(crate) battery_id: i64,
    pub(crate) full_name: String,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Exam {
    pub(crate) id: i64,
    pub(crate) battery_id: i64,
    pub(crate) title: String,
    pub(crate) time_limit_minutes: Option<i32>,
    pub(crate) sort_order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Attempt {
    pub(crate) id: i64,
    pub(crate) examinee_id: i64,
    pub(crate) exam_id: i64,
    pub(crate) attempt_number: i32,
    pub(crate) status: AttemptStatus,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
    pub(crate) duration_seconds: Option<i32>,
    pub(crate) raw_score: Option<f64>,
    pub(crate) scaled_score: Option<f64>,
    pub(crate) metadata: Json<serde_json::Value>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Answer {
    pub(crate) id: i64,
    pub(crate) attempt_id: i64,
    pub(crate) examinee_id: i64,
    pub(crate) exam_id: i64,
    pub(crate) variant: QuestionVariant,
    pub(crate) question_id: i64,
    pub(crate) mcq_choice_id: Option<i64>,
    pub(crate) likert_value: Option<i32>,
    pub(crate) true_false_value: Option<bool>,
    pub(crate) essay_text: Option<String>,
    pub(crate) raw_value: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// One question row from any variant table. Each table fills the single text
/// column it defines and leaves the others NULL.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct QuestionRow {
    pub(crate) id: i64,
    pub(crate) exam_id: i64,
    pub(crate) sort_order: i32,
    pub(crate) question_text: Option<String>,
    pub(crate) statement: Option<String>,
    pub(crate) prompt: Option<String>,
    pub(crate) text: Option<String>,
    pub(crate) scale_id: Option<i64>,
    pub(crate) explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct LikertOption {
    pub(crate) id: i64,
    pub(crate) scale_id: i64,
    pub(crate) label: String,
    pub(crate) value: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct McqChoice {
    pub(crate) id: i64,
    pub(crate) question_id: i64,
    pub(crate) choice_text: String,
}
