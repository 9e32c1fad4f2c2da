use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::time::format_primitive;
use crate::db::models::{Attempt, Exam};
use crate::db::types::QuestionVariant;
use crate::services::battery_progress::BatteryPage;
use crate::services::question_catalog::{Question, QuestionDetail};

#[derive(Debug, Deserialize)]
pub(crate) struct BatteryQuery {
    #[serde(default)]
    pub(crate) exam: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamSummary {
    pub(crate) id: i64,
    pub(crate) title: String,
    pub(crate) time_limit_minutes: Option<i32>,
}

impl From<&Exam> for ExamSummary {
    fn from(exam: &Exam) -> Self {
        Self { id: exam.id, title: exam.title.clone(), time_limit_minutes: exam.time_limit_minutes }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    /// Form field to post the answer under.
    pub(crate) field: String,
    pub(crate) variant: QuestionVariant,
    pub(crate) id: i64,
    pub(crate) text: String,
    pub(crate) ordinal: i32,
    #[serde(flatten)]
    pub(crate) detail: QuestionDetail,
}

impl From<Question> for QuestionResponse {
    fn from(question: Question) -> Self {
        Self {
            field: question.key.field_name(),
            variant: question.key.variant,
            id: question.key.id,
            text: question.display_text,
            ordinal: question.ordinal,
            detail: question.detail,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct BatteryPageResponse {
    pub(crate) exam: ExamSummary,
    pub(crate) exam_index: usize,
    pub(crate) position: usize,
    pub(crate) total_exams: usize,
    pub(crate) has_next: bool,
    pub(crate) progress_percent: u8,
    pub(crate) questions: Vec<QuestionResponse>,
    /// Previously entered values keyed by form field.
    pub(crate) answers: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) warning: Option<String>,
}

impl BatteryPageResponse {
    pub(crate) fn from_page(page: BatteryPage, warning: Option<&str>) -> Self {
        let answers = page
            .cached_answers
            .into_iter()
            .map(|(key, value)| (key.field_name(), value))
            .collect();

        Self {
            exam: ExamSummary::from(&page.exam),
            exam_index: page.index,
            position: page.index + 1,
            total_exams: page.total,
            has_next: page.has_next,
            progress_percent: page.progress_percent,
            questions: page.questions.into_iter().map(QuestionResponse::from).collect(),
            answers,
            warning: warning.map(str::to_string),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CompletedAttempt {
    pub(crate) attempt_id: i64,
    pub(crate) submitted_at: Option<String>,
    pub(crate) duration_seconds: Option<i32>,
}

impl From<&Attempt> for CompletedAttempt {
    fn from(attempt: &Attempt) -> Self {
        Self {
            attempt_id: attempt.id,
            submitted_at: attempt.submitted_at.map(format_primitive),
            duration_seconds: attempt.duration_seconds,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub(crate) enum BatteryResponse {
    NoExams,
    Completed {
        #[serde(skip_serializing_if = "Option::is_none")]
        attempt: Option<CompletedAttempt>,
        saved: usize,
    },
    AtExam(BatteryPageResponse),
    Incomplete(BatteryPageResponse),
    Advanced {
        next_exam: usize,
        attempt_id: i64,
        saved: usize,
    },
}
