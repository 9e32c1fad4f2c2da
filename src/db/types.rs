use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "attemptstatus", rename_all = "snake_case")]
pub(crate) enum AttemptStatus {
    InProgress,
    Submitted,
    Expired,
    Abandoned,
}

impl AttemptStatus {
    pub(crate) fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

/// The four question shapes. Each lives in its own table with its own id space,
/// so a question is only identified by `(variant, id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "questionvariant", rename_all = "snake_case")]
pub(crate) enum QuestionVariant {
    Likert,
    Mcq,
    TrueFalse,
    Essay,
}

impl QuestionVariant {
    pub(crate) const ALL: [QuestionVariant; 4] =
        [Self::Likert, Self::Mcq, Self::Essay, Self::TrueFalse];

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Likert => "likert",
            Self::Mcq => "mcq",
            Self::TrueFalse => "true_false",
            Self::Essay => "essay",
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "likert" | "likertquestion" => Some(Self::Likert),
            "mcq" | "mcqquestion" | "multiple_choice" => Some(Self::Mcq),
            "true_false" | "truefalse" | "truefalsequestion" => Some(Self::TrueFalse),
            "essay" | "essayquestion" => Some(Self::Essay),
            _ => None,
        }
    }

    /// Tie-break rank among questions sharing an ordinal.
    pub(crate) fn rank(self) -> u8 {
        match self {
            Self::Likert => 0,
            Self::Mcq => 1,
            Self::Essay => 2,
            Self::TrueFalse => 3,
        }
    }
}
