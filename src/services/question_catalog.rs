use std::collections::HashMap;

use serde::Serialize;
use sqlx::PgPool;

use crate::db::models::{LikertOption, McqChoice, QuestionRow};
use crate::db::types::QuestionVariant;
use crate::repositories;
use crate::services::error::FlowError;

pub(crate) const UNTITLED: &str = "Untitled";

/// Labels offered when a Likert question's scale has no options of its own.
pub(crate) const DEFAULT_LIKERT_SCALE: [(i64, &str); 5] = [
    (5, "Strongly Agree"),
    (4, "Agree"),
    (3, "Neutral"),
    (2, "Disagree"),
    (1, "Strongly Disagree"),
];

/// Identity of a question across the four variant tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub(crate) struct QuestionKey {
    pub(crate) variant: QuestionVariant,
    pub(crate) id: i64,
}

impl QuestionKey {
    pub(crate) fn new(variant: QuestionVariant, id: i64) -> Self {
        Self { variant, id }
    }

    /// Form field carrying this question's answer, e.g. `q_mcq_12`.
    pub(crate) fn field_name(self) -> String {
        format!("q_{}_{}", self.variant.as_str(), self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ChoiceOption {
    pub(crate) value: i64,
    pub(crate) label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum QuestionDetail {
    Likert { options: Vec<ChoiceOption> },
    Mcq { choices: Vec<ChoiceOption> },
    TrueFalse,
    Essay { explanation: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct Question {
    pub(crate) key: QuestionKey,
    pub(crate) exam_id: i64,
    pub(crate) display_text: String,
    pub(crate) ordinal: i32,
    pub(crate) detail: QuestionDetail,
}

/// All questions of an exam, every variant, in presentation order.
pub(crate) async fn load_questions(pool: &PgPool, exam_id: i64) -> Result<Vec<Question>, FlowError> {
    repositories::exams::find_by_id(pool, exam_id).await?.ok_or(FlowError::NotFound("Exam"))?;

    let mut rows = Vec::new();
    for variant in QuestionVariant::ALL {
        let fetched = repositories::questions::list_for_exam(pool, variant, exam_id).await?;
        rows.extend(fetched.into_iter().map(|row| (variant, row)));
    }

    let mut scale_ids: Vec<i64> = rows
        .iter()
        .filter(|(variant, _)| *variant == QuestionVariant::Likert)
        .filter_map(|(_, row)| row.scale_id)
        .collect();
    scale_ids.sort_unstable();
    scale_ids.dedup();

    let mcq_ids: Vec<i64> = rows
        .iter()
        .filter(|(variant, _)| *variant == QuestionVariant::Mcq)
        .map(|(_, row)| row.id)
        .collect();

    let likert_options = group_likert_options(
        repositories::questions::likert_options_for_scales(pool, &scale_ids).await?,
    );
    let mcq_choices =
        group_mcq_choices(repositories::questions::mcq_choices_for_questions(pool, &mcq_ids).await?);

    let mut questions: Vec<Question> = rows
        .into_iter()
        .map(|(variant, row)| project(variant, row, &likert_options, &mcq_choices))
        .collect();
    sort_questions(&mut questions);

    Ok(questions)
}

/// First non-blank text column, in the order question_text, statement, prompt, text.
pub(crate) fn display_text(row: &QuestionRow) -> Option<&str> {
    [&row.question_text, &row.statement, &row.prompt, &row.text]
        .into_iter()
        .filter_map(|value| value.as_deref())
        .map(str::trim)
        .find(|value| !value.is_empty())
}

pub(crate) fn sort_questions(questions: &mut [Question]) {
    questions.sort_by_key(|question| {
        (question.ordinal, question.key.variant.rank(), question.key.id)
    });
}

fn project(
    variant: QuestionVariant,
    row: QuestionRow,
    likert_options: &HashMap<i64, Vec<ChoiceOption>>,
    mcq_choices: &HashMap<i64, Vec<ChoiceOption>>,
) -> Question {
    let display_text = match display_text(&row) {
        Some(text) => text.to_string(),
        None => {
            tracing::warn!(
                exam_id = row.exam_id,
                question_id = row.id,
                variant = variant.as_str(),
                "Question has no display text"
            );
            UNTITLED.to_string()
        }
    };

    let detail = match variant {
        QuestionVariant::Likert => {
            let options = row
                .scale_id
                .and_then(|scale_id| likert_options.get(&scale_id))
                .filter(|options| !options.is_empty())
                .cloned()
                .unwrap_or_else(default_likert_options);
            QuestionDetail::Likert { options }
        }
        QuestionVariant::Mcq => QuestionDetail::Mcq {
            choices: mcq_choices.get(&row.id).cloned().unwrap_or_default(),
        },
        QuestionVariant::TrueFalse => QuestionDetail::TrueFalse,
        QuestionVariant::Essay => {
            QuestionDetail::Essay { explanation: row.explanation.unwrap_or_default() }
        }
    };

    Question {
        key: QuestionKey::new(variant, row.id),
        exam_id: row.exam_id,
        display_text,
        ordinal: row.sort_order,
        detail,
    }
}

fn default_likert_options() -> Vec<ChoiceOption> {
    DEFAULT_LIKERT_SCALE
        .iter()
        .map(|(value, label)| ChoiceOption { value: *value, label: (*label).to_string() })
        .collect()
}

fn group_likert_options(options: Vec<LikertOption>) -> HashMap<i64, Vec<ChoiceOption>> {
    let mut grouped: HashMap<i64, Vec<ChoiceOption>> = HashMap::new();
    for option in options {
        grouped
            .entry(option.scale_id)
            .or_default()
            .push(ChoiceOption { value: i64::from(option.value), label: option.label });
    }
    grouped
}

fn group_mcq_choices(choices: Vec<McqChoice>) -> HashMap<i64, Vec<ChoiceOption>> {
    let mut grouped: HashMap<i64, Vec<ChoiceOption>> = HashMap::new();
    for choice in choices {
        grouped
            .entry(choice.question_id)
            .or_default()
            .push(ChoiceOption { value: choice.id, label: choice.choice_text });
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, sort_order: i32) -> QuestionRow {
        QuestionRow {
            id,
            exam_id: 1,
            sort_order,
            question_text: None,
            statement: None,
            prompt: None,
            text: None,
            scale_id: None,
            explanation: None,
        }
    }

    #[test]
    fn display_text_follows_column_priority() {
        let mut question = row(1, 0);
        question.text = Some("likert text".into());
        question.prompt = Some("  ".into());
        assert_eq!(display_text(&question), Some("likert text"));

        question.statement = Some("a statement".into());
        assert_eq!(display_text(&question), Some("a statement"));

        question.question_text = Some("the question".into());
        assert_eq!(display_text(&question), Some("the question"));
    }

    #[test]
    fn missing_text_projects_as_untitled() {
        let projected =
            project(QuestionVariant::TrueFalse, row(3, 0), &HashMap::new(), &HashMap::new());
        assert_eq!(projected.display_text, UNTITLED);
        assert_eq!(projected.detail, QuestionDetail::TrueFalse);
    }

    #[test]
    fn likert_without_scale_options_uses_default_scale() {
        let mut likert = row(4, 0);
        likert.text = Some("I enjoy puzzles".into());
        likert.scale_id = Some(9);

        let projected = project(QuestionVariant::Likert, likert, &HashMap::new(), &HashMap::new());
        let QuestionDetail::Likert { options } = projected.detail else {
            panic!("expected likert detail");
        };
        assert_eq!(options.len(), 5);
        assert_eq!(options[0], ChoiceOption { value: 5, label: "Strongly Agree".into() });
        assert_eq!(options[4].value, 1);
    }

    #[test]
    fn mcq_choices_are_attached_by_question() {
        let choices = group_mcq_choices(vec![
            McqChoice { id: 10, question_id: 2, choice_text: "Paris".into() },
            McqChoice { id: 11, question_id: 2, choice_text: "Rome".into() },
            McqChoice { id: 12, question_id: 3, choice_text: "Other".into() },
        ]);

        let projected = project(QuestionVariant::Mcq, row(2, 0), &HashMap::new(), &choices);
        let QuestionDetail::Mcq { choices } = projected.detail else {
            panic!("expected mcq detail");
        };
        assert_eq!(choices.iter().map(|c| c.value).collect::<Vec<_>>(), vec![10, 11]);
    }

    #[test]
    fn ordering_uses_ordinal_then_variant_rank_then_id() {
        let empty = HashMap::new();
        let mut questions = vec![
            project(QuestionVariant::TrueFalse, row(1, 0), &empty, &empty),
            project(QuestionVariant::Essay, row(50, 2), &empty, &empty),
            project(QuestionVariant::Likert, row(99, 0), &empty, &empty),
            project(QuestionVariant::Mcq, row(7, 1), &empty, &empty),
            project(QuestionVariant::Mcq, row(3, 1), &empty, &empty),
        ];

        sort_questions(&mut questions);

        let keys: Vec<(QuestionVariant, i64)> =
            questions.iter().map(|q| (q.key.variant, q.key.id)).collect();
        assert_eq!(
            keys,
            vec![
                (QuestionVariant::Likert, 99),
                (QuestionVariant::TrueFalse, 1),
                (QuestionVariant::Mcq, 3),
                (QuestionVariant::Mcq, 7),
                (QuestionVariant::Essay, 50),
            ]
        );
    }

    #[test]
    fn field_name_includes_variant() {
        assert_eq!(QuestionKey::new(QuestionVariant::TrueFalse, 4).field_name(), "q_true_false_4");
    }
}
