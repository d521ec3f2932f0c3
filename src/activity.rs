//! Append-only audit trail of what users did to each other.
//!
//! Nothing in the workflow reads these rows back; they exist for analytics.

use serde::Serialize;
use sqlx::SqliteExecutor;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum ActivityAction {
    /// Sending a request, and also accepting one.
    Followed,
    Rejected,
    Withdrew,
    Viewed,
}

#[cfg(test)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ActivityLogEntry {
    #[sqlx(try_from = "String")]
    pub user_id: Uuid,
    #[sqlx(try_from = "String")]
    pub receiver_id: Uuid,
    pub action: ActivityAction,
}

/// Pass the open transaction of the transition so the entry commits (or rolls
/// back) together with it.
pub async fn append(
    executor: impl SqliteExecutor<'_>,
    user_id: Uuid,
    receiver_id: Uuid,
    action: ActivityAction,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO activity_log (id,user_id,receiver_id,action,created_at) VALUES (?,?,?,?,?)")
        .bind(Uuid::now_v7().to_string())
        .bind(user_id.to_string())
        .bind(receiver_id.to_string())
        .bind(action)
        .bind(OffsetDateTime::now_utc())
        .execute(executor)
        .await?;

    tracing::debug!(%user_id, %receiver_id, ?action, "activity logged");
    Ok(())
}

/// Entries written by `user_id`, oldest first.
#[cfg(test)]
pub(crate) async fn entries_by(
    executor: impl SqliteExecutor<'_>,
    user_id: Uuid,
) -> Result<Vec<ActivityLogEntry>, sqlx::Error> {
    sqlx::query_as("SELECT user_id,receiver_id,action FROM activity_log WHERE user_id=? ORDER BY rowid")
        .bind(user_id.to_string())
        .fetch_all(executor)
        .await
}
