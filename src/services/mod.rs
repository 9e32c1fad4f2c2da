pub(crate) mod answer_upsert;
pub(crate) mod attempt_lifecycle;
pub(crate) mod battery_progress;
pub(crate) mod error;
pub(crate) mod question_catalog;
pub(crate) mod session_context;
