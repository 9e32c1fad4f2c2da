use crate::db::models::Exam;

pub(crate) const COLUMNS: &str = "id, battery_id, title, time_limit_minutes, sort_order";

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: i64,
) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// Exams of a battery in presentation order.
pub(crate) async fn list_for_battery(
    executor: impl sqlx::PgExecutor<'_>,
    battery_id: i64,
) -> Result<Vec<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "SELECT {COLUMNS} FROM exams WHERE battery_id = $1 ORDER BY sort_order ASC, id ASC"
    ))
    .bind(battery_id)
    .fetch_all(executor)
    .await
}
