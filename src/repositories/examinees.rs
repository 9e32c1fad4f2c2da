use crate::db::models::Examinee;

pub(crate) const COLUMNS: &str = "\
    id, username, hashed_password, battery_id, full_name, is_active, created_at, updated_at";

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: i64,
) -> Result<Option<Examinee>, sqlx::Error> {
    sqlx::query_as::<_, Examinee>(&format!("SELECT {COLUMNS} FROM examinees WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn find_by_username(
    executor: impl sqlx::PgExecutor<'_>,
    username: &str,
) -> Result<Option<Examinee>, sqlx::Error> {
    sqlx::query_as::<_, Examinee>(&format!("SELECT {COLUMNS} FROM examinees WHERE username = $1"))
        .bind(username)
        .fetch_optional(executor)
        .await
}
