use sqlx::SqliteExecutor;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{relationships::store::matched_condition, users::PublicUser};

use super::{Conversation, Message};

const MESSAGE_COLUMNS: &str = "id,sender_id,receiver_id,message,status,created_at";

/// Inserts an unread message if, and only if, the pair is matched at this
/// instant. `None` means it was not.
pub async fn insert_if_matched(
    executor: impl SqliteExecutor<'_>,
    sender: Uuid,
    receiver: Uuid,
    text: &str,
) -> Result<Option<Message>, sqlx::Error> {
    sqlx::query_as(&format!(
        "INSERT INTO messages ({MESSAGE_COLUMNS})
         SELECT ?1, ?2, ?3, ?4, 'UNREAD', ?5
         WHERE {}
         RETURNING {MESSAGE_COLUMNS}",
        matched_condition("?2", "?3")
    ))
    .bind(Uuid::now_v7().to_string())
    .bind(sender.to_string())
    .bind(receiver.to_string())
    .bind(text)
    .bind(OffsetDateTime::now_utc())
    .fetch_optional(executor)
    .await
}

/// Every message exchanged by `a` and `b`, oldest first; same-instant messages
/// keep insertion order.
pub async fn between(executor: impl SqliteExecutor<'_>, a: Uuid, b: Uuid) -> Result<Vec<Message>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages
         WHERE (sender_id=?1 AND receiver_id=?2) OR (sender_id=?2 AND receiver_id=?1)
         ORDER BY julianday(created_at), rowid"
    ))
    .bind(a.to_string())
    .bind(b.to_string())
    .fetch_all(executor)
    .await
}

/// Flips everything `sender` sent to `receiver` to READ in one statement.
pub async fn mark_read(executor: impl SqliteExecutor<'_>, receiver: Uuid, sender: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE messages SET status='READ' WHERE receiver_id=? AND sender_id=? AND status='UNREAD'")
        .bind(receiver.to_string())
        .bind(sender.to_string())
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// Unread messages addressed to `receiver` from users it is currently matched with.
pub async fn unread_count(executor: impl SqliteExecutor<'_>, receiver: Uuid) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as(&format!(
        "SELECT COUNT(*) FROM messages m
         WHERE m.receiver_id=?1 AND m.status='UNREAD' AND {}",
        matched_condition("?1", "m.sender_id")
    ))
    .bind(receiver.to_string())
    .fetch_one(executor)
    .await?;
    Ok(count)
}

#[derive(sqlx::FromRow)]
struct ConversationRow {
    #[sqlx(flatten)]
    message: Message,
    unread_count: i64,
    #[sqlx(try_from = "String")]
    user_id: Uuid,
    user_username: String,
    user_alias: String,
    user_summary: Option<String>,
    user_created_at: OffsetDateTime,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Conversation {
            user: PublicUser {
                id: row.user_id,
                username: row.user_username,
                alias: row.user_alias,
                summary: row.user_summary,
                created_at: row.user_created_at,
            },
            last_message: row.message,
            has_unread: row.unread_count > 0,
            unread_count: row.unread_count,
        }
    }
}

/// One row per counterparty `user_id` has exchanged messages with and is still
/// matched with, newest conversation first.
pub async fn conversations(executor: impl SqliteExecutor<'_>, user_id: Uuid) -> Result<Vec<Conversation>, sqlx::Error> {
    let rows: Vec<ConversationRow> = sqlx::query_as(&format!(
        "WITH mine AS (
             SELECT m.id, m.sender_id, m.receiver_id, m.message, m.status, m.created_at, m.rowid AS seq,
                    CASE WHEN m.sender_id=?1 THEN m.receiver_id ELSE m.sender_id END AS other_id
             FROM messages m
             WHERE m.sender_id=?1 OR m.receiver_id=?1
         ),
         ranked AS (
             SELECT mine.*,
                    ROW_NUMBER() OVER (PARTITION BY other_id ORDER BY julianday(created_at) DESC, seq DESC) AS rn,
                    SUM(CASE WHEN receiver_id=?1 AND status='UNREAD' THEN 1 ELSE 0 END)
                        OVER (PARTITION BY other_id) AS unread_count
             FROM mine
         )
         SELECT r.id, r.sender_id, r.receiver_id, r.message, r.status, r.created_at, r.unread_count,
                u.id AS user_id, u.username AS user_username, u.alias AS user_alias,
                u.summary AS user_summary, u.created_at AS user_created_at
         FROM ranked r
         JOIN users u ON u.id = r.other_id
         WHERE r.rn = 1 AND {}
         ORDER BY julianday(r.created_at) DESC, r.seq DESC",
        matched_condition("?1", "r.other_id")
    ))
    .bind(user_id.to_string())
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(Conversation::from).collect())
}
