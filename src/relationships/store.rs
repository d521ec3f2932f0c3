//! Sole access path to the `relationships` table.
//!
//! Status changes are single conditional statements so that a stale read can
//! never overwrite a newer answer.

use sqlx::SqliteExecutor;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::PublicUser;

use super::{Relationship, RelationshipStatus, RelationshipWithUser};

const RELATIONSHIP_COLUMNS: &str = "id,follower_user_id,followed_user_id,status,created_at,updated_at";

pub async fn insert_pending(
    executor: impl SqliteExecutor<'_>,
    follower: Uuid,
    followed: Uuid,
) -> Result<Relationship, sqlx::Error> {
    let now = OffsetDateTime::now_utc();
    sqlx::query_as(&format!(
        "INSERT INTO relationships ({RELATIONSHIP_COLUMNS}) VALUES (?,?,?,'pending',?,?) RETURNING {RELATIONSHIP_COLUMNS}"
    ))
    .bind(Uuid::now_v7().to_string())
    .bind(follower.to_string())
    .bind(followed.to_string())
    .bind(now)
    .bind(now)
    .fetch_one(executor)
    .await
}

pub async fn find_by_id(executor: impl SqliteExecutor<'_>, id: Uuid) -> Result<Option<Relationship>, sqlx::Error> {
    sqlx::query_as(&format!("SELECT {RELATIONSHIP_COLUMNS} FROM relationships WHERE id=?"))
        .bind(id.to_string())
        .fetch_optional(executor)
        .await
}

/// The relationship occupying the unordered pair `{a, b}`, whoever initiated it.
pub async fn find_between(
    executor: impl SqliteExecutor<'_>,
    a: Uuid,
    b: Uuid,
) -> Result<Option<Relationship>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {RELATIONSHIP_COLUMNS} FROM relationships
         WHERE (follower_user_id=?1 AND followed_user_id=?2) OR (follower_user_id=?2 AND followed_user_id=?1)"
    ))
    .bind(a.to_string())
    .bind(b.to_string())
    .fetch_optional(executor)
    .await
}

/// Moves a pending relationship addressed to `recipient` to `to`. `None` means
/// nothing matched the precondition: missing, wrong recipient, or no longer pending.
pub async fn resolve_pending(
    executor: impl SqliteExecutor<'_>,
    id: Uuid,
    recipient: Uuid,
    to: RelationshipStatus,
) -> Result<Option<Relationship>, sqlx::Error> {
    sqlx::query_as(&format!(
        "UPDATE relationships SET status=?, updated_at=?
         WHERE id=? AND followed_user_id=? AND status='pending'
         RETURNING {RELATIONSHIP_COLUMNS}"
    ))
    .bind(to)
    .bind(OffsetDateTime::now_utc())
    .bind(id.to_string())
    .bind(recipient.to_string())
    .fetch_optional(executor)
    .await
}

/// Deletes a pending relationship initiated by `follower`, returning it.
pub async fn delete_pending(
    executor: impl SqliteExecutor<'_>,
    id: Uuid,
    follower: Uuid,
) -> Result<Option<Relationship>, sqlx::Error> {
    sqlx::query_as(&format!(
        "DELETE FROM relationships
         WHERE id=? AND follower_user_id=? AND status='pending'
         RETURNING {RELATIONSHIP_COLUMNS}"
    ))
    .bind(id.to_string())
    .bind(follower.to_string())
    .fetch_optional(executor)
    .await
}

/// SQL condition that holds when the users referenced by `a` and `b` (column
/// names or placeholders) are matched. The single definition of a match, shared
/// with the chat queries.
pub(crate) fn matched_condition(a: &str, b: &str) -> String {
    format!(
        "EXISTS (SELECT 1 FROM relationships rel WHERE rel.status='matched' \
         AND ((rel.follower_user_id={a} AND rel.followed_user_id={b}) \
           OR (rel.follower_user_id={b} AND rel.followed_user_id={a})))"
    )
}

/// Whether `a` and `b` are matched, in either direction. Always hits the store.
pub async fn is_matched(executor: impl SqliteExecutor<'_>, a: Uuid, b: Uuid) -> Result<bool, sqlx::Error> {
    let (matched,): (i64,) = sqlx::query_as(&format!("SELECT {}", matched_condition("?1", "?2")))
        .bind(a.to_string())
        .bind(b.to_string())
        .fetch_one(executor)
        .await?;
    Ok(matched != 0)
}

#[derive(Debug, Clone, Copy)]
pub enum Listing {
    /// Matched, either side.
    Matches,
    /// Pending, addressed to the user.
    Received,
    /// Pending, initiated by the user.
    Sent,
}

impl Listing {
    fn filter(&self) -> &'static str {
        match self {
            Listing::Matches => "r.status='matched' AND (r.follower_user_id=?1 OR r.followed_user_id=?1)",
            Listing::Received => "r.status='pending' AND r.followed_user_id=?1",
            Listing::Sent => "r.status='pending' AND r.follower_user_id=?1",
        }
    }
}

#[derive(sqlx::FromRow)]
struct CounterpartyRow {
    #[sqlx(flatten)]
    relationship: Relationship,
    #[sqlx(try_from = "String")]
    user_id: Uuid,
    user_username: String,
    user_alias: String,
    user_summary: Option<String>,
    user_created_at: OffsetDateTime,
}

impl From<CounterpartyRow> for RelationshipWithUser {
    fn from(row: CounterpartyRow) -> Self {
        RelationshipWithUser {
            relationship: row.relationship,
            user: PublicUser {
                id: row.user_id,
                username: row.user_username,
                alias: row.user_alias,
                summary: row.user_summary,
                created_at: row.user_created_at,
            },
        }
    }
}

/// Relationships of `user_id` joined with the other party's public profile,
/// most recently changed first.
pub async fn list_with_counterparty(
    executor: impl SqliteExecutor<'_>,
    user_id: Uuid,
    listing: Listing,
) -> Result<Vec<RelationshipWithUser>, sqlx::Error> {
    let rows: Vec<CounterpartyRow> = sqlx::query_as(&format!(
        "SELECT r.id, r.follower_user_id, r.followed_user_id, r.status, r.created_at, r.updated_at,
                u.id AS user_id, u.username AS user_username, u.alias AS user_alias,
                u.summary AS user_summary, u.created_at AS user_created_at
         FROM relationships r
         JOIN users u ON u.id = CASE WHEN r.follower_user_id=?1 THEN r.followed_user_id ELSE r.follower_user_id END
         WHERE {}
         ORDER BY julianday(r.updated_at) DESC, r.rowid DESC",
        listing.filter()
    ))
    .bind(user_id.to_string())
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(RelationshipWithUser::from).collect())
}
