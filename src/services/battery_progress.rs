use std::collections::HashMap;

use sqlx::PgPool;

use crate::db::models::{Attempt, Exam, Examinee};
use crate::db::types::QuestionVariant;
use crate::repositories;
use crate::services::error::FlowError;
use crate::services::question_catalog::{self, Question, QuestionKey};
use crate::services::session_context::{ExamineeSession, SessionStore};
use crate::services::{answer_upsert, attempt_lifecycle};

pub(crate) const WARNING_NOTHING_ANSWERED: &str = "Please answer all questions before continuing.";
pub(crate) const WARNING_SOME_UNANSWERED: &str =
    "You have unanswered questions. Please complete them before continuing.";

/// One exam of the battery as presented to the examinee.
#[derive(Debug, Clone)]
pub(crate) struct BatteryPage {
    pub(crate) exam: Exam,
    pub(crate) index: usize,
    pub(crate) total: usize,
    pub(crate) has_next: bool,
    pub(crate) progress_percent: u8,
    pub(crate) questions: Vec<Question>,
    pub(crate) cached_answers: HashMap<QuestionKey, String>,
}

#[derive(Debug)]
pub(crate) enum BatteryView {
    NoExams,
    Completed,
    AtExam(BatteryPage),
}

#[derive(Debug)]
pub(crate) enum SubmitOutcome {
    NoExams,
    Incomplete { page: BatteryPage, warning: &'static str },
    Advanced { next_index: usize, attempt: Attempt, saved: usize },
    /// `attempt` is the finalized attempt of the last exam, absent when the
    /// index was already past the end.
    Completed { attempt: Option<Attempt>, saved: usize },
}

/// A posted page: raw form fields plus the timeout flag.
#[derive(Debug, Default)]
pub(crate) struct PageSubmission {
    pub(crate) fields: Vec<(String, String)>,
    pub(crate) auto_submit: bool,
}

impl PageSubmission {
    pub(crate) fn from_form(fields: Vec<(String, String)>) -> Self {
        let auto_submit =
            fields.iter().any(|(name, value)| name == "auto_submit" && value.trim() == "1");
        Self { fields, auto_submit }
    }
}

pub(crate) async fn view(
    pool: &PgPool,
    sessions: &SessionStore,
    session: &ExamineeSession,
    examinee: &Examinee,
    index: usize,
) -> Result<BatteryView, FlowError> {
    let exams = repositories::exams::list_for_battery(pool, examinee.battery_id).await?;
    if exams.is_empty() {
        return Ok(BatteryView::NoExams);
    }

    let total = exams.len();
    let Some(exam) = exams.into_iter().nth(index) else {
        return Ok(BatteryView::Completed);
    };

    let questions = question_catalog::load_questions(pool, exam.id).await?;
    let page = build_page(sessions, session, exam, index, total, questions).await?;

    Ok(BatteryView::AtExam(page))
}

/// Accepts one page of answers. Incomplete pages write nothing to the
/// database unless `auto_submit` is set.
pub(crate) async fn submit(
    pool: &PgPool,
    sessions: &SessionStore,
    session: &ExamineeSession,
    examinee: &Examinee,
    index: usize,
    submission: PageSubmission,
) -> Result<SubmitOutcome, FlowError> {
    let exams = repositories::exams::list_for_battery(pool, examinee.battery_id).await?;
    if exams.is_empty() {
        return Ok(SubmitOutcome::NoExams);
    }

    let total = exams.len();
    let Some(exam) = exams.into_iter().nth(index) else {
        return Ok(SubmitOutcome::Completed { attempt: None, saved: 0 });
    };

    let questions = question_catalog::load_questions(pool, exam.id).await?;
    let submitted = collect_answers(&submission.fields, &questions)?;
    let (answered, unanswered) = partition(&questions, &submitted);

    sessions.cache_answers(session, &answered).await?;

    if !submission.auto_submit {
        if let Some(warning) = completeness_warning(answered.len(), unanswered.len()) {
            let page = build_page(sessions, session, exam, index, total, questions).await?;
            return Ok(SubmitOutcome::Incomplete { page, warning });
        }
    }

    let attempt = attempt_lifecycle::resolve_attempt(pool, sessions, session, &exam).await?;
    let saved =
        answer_upsert::save_answers(pool, &attempt, examinee.id, exam.id, &answered).await?;

    if index + 1 < total {
        return Ok(SubmitOutcome::Advanced { next_index: index + 1, attempt, saved });
    }

    let finalized = attempt_lifecycle::finalize(pool, attempt.id).await?;
    Ok(SubmitOutcome::Completed { attempt: Some(finalized), saved })
}

/// Maps form fields onto this page's questions. Accepts `q_<variant>_<id>`
/// and the older `q_<id>` when exactly one question on the page has that id.
/// Fields that match no question are ignored.
pub(crate) fn collect_answers(
    fields: &[(String, String)],
    questions: &[Question],
) -> Result<HashMap<QuestionKey, String>, FlowError> {
    let mut answers = HashMap::new();

    for (name, value) in fields {
        let Some(rest) = name.strip_prefix("q_") else {
            continue;
        };

        let key = match rest.rsplit_once('_') {
            Some((variant, id)) => {
                let (Some(variant), Ok(id)) = (QuestionVariant::parse(variant), id.parse::<i64>())
                else {
                    continue;
                };
                Some(QuestionKey::new(variant, id))
                    .filter(|key| questions.iter().any(|question| question.key == *key))
            }
            None => {
                let Ok(id) = rest.parse::<i64>() else {
                    continue;
                };
                let mut matching = questions.iter().filter(|question| question.key.id == id);
                match (matching.next(), matching.next()) {
                    (Some(question), None) => Some(question.key),
                    (Some(_), Some(_)) => {
                        return Err(FlowError::MalformedInput(format!(
                            "Field {name} matches more than one question; use q_<variant>_<id>"
                        )));
                    }
                    _ => None,
                }
            }
        };

        if let Some(key) = key {
            answers.insert(key, value.clone());
        }
    }

    Ok(answers)
}

/// Splits the page into answered values (trimmed, in question order) and the
/// keys left blank.
pub(crate) fn partition(
    questions: &[Question],
    submitted: &HashMap<QuestionKey, String>,
) -> (Vec<(QuestionKey, String)>, Vec<QuestionKey>) {
    let mut answered = Vec::new();
    let mut unanswered = Vec::new();

    for question in questions {
        let value = submitted.get(&question.key).map(|value| value.trim()).unwrap_or_default();
        if value.is_empty() {
            unanswered.push(question.key);
        } else {
            answered.push((question.key, value.to_string()));
        }
    }

    (answered, unanswered)
}

pub(crate) fn completeness_warning(answered: usize, unanswered: usize) -> Option<&'static str> {
    match (answered, unanswered) {
        (_, 0) => None,
        (0, _) => Some(WARNING_NOTHING_ANSWERED),
        _ => Some(WARNING_SOME_UNANSWERED),
    }
}

pub(crate) fn progress_percent(index: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = ((index + 1).min(total) * 100) / total;
    u8::try_from(percent).unwrap_or(100)
}

async fn build_page(
    sessions: &SessionStore,
    session: &ExamineeSession,
    exam: Exam,
    index: usize,
    total: usize,
    questions: Vec<Question>,
) -> Result<BatteryPage, FlowError> {
    let keys: Vec<QuestionKey> = questions.iter().map(|question| question.key).collect();
    let cached_answers = sessions.cached_answers(session, &keys).await?;

    Ok(BatteryPage {
        exam,
        index,
        total,
        has_next: index + 1 < total,
        progress_percent: progress_percent(index, total),
        questions,
        cached_answers,
    })
}
