//! Direct messages between matched users. Nothing here reads or writes a
//! conversation without first confirming the pair is matched.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{relationships::store::is_matched, users::directory, CoreError, CoreResult};

use super::{store, Conversation, Message};

const MESSAGE_MAX_CHARS: usize = 2000;

const NOT_MATCHED: &str = "only matched connections may message";

pub async fn send_message(db_pool: &SqlitePool, sender_id: Uuid, receiver_id: Uuid, text: &str) -> CoreResult<Message> {
    if !directory::exists(db_pool, receiver_id).await? {
        return Err(CoreError::NotFound("user"));
    }
    if !is_matched(db_pool, sender_id, receiver_id).await? {
        return Err(CoreError::Forbidden(NOT_MATCHED));
    }

    let text = text.trim();
    if text.is_empty() {
        return Err(CoreError::Invalid("message must not be empty"));
    }
    if text.chars().count() > MESSAGE_MAX_CHARS {
        return Err(CoreError::Invalid("message is too long"));
    }

    // the insert re-checks the match itself, so a match removed in between
    // still cannot produce a message
    let message = store::insert_if_matched(db_pool, sender_id, receiver_id, text)
        .await?
        .ok_or(CoreError::Forbidden(NOT_MATCHED))?;

    tracing::debug!(message_id = %message.id, %sender_id, %receiver_id, "message sent");
    Ok(message)
}

/// Returns the conversation as it was before this call marked anything read.
pub async fn get_messages(db_pool: &SqlitePool, actor_id: Uuid, other_id: Uuid) -> CoreResult<Vec<Message>> {
    if !directory::exists(db_pool, other_id).await? {
        return Err(CoreError::NotFound("user"));
    }
    if !is_matched(db_pool, actor_id, other_id).await? {
        return Err(CoreError::Forbidden(NOT_MATCHED));
    }

    let messages = store::between(db_pool, actor_id, other_id).await?;

    match store::mark_read(db_pool, actor_id, other_id).await {
        Ok(0) => {}
        Ok(marked) => tracing::debug!(%actor_id, %other_id, marked, "messages marked read"),
        Err(err) => tracing::warn!(%actor_id, %other_id, error = %err, "failed to mark messages read"),
    }

    Ok(messages)
}

pub async fn get_conversations(db_pool: &SqlitePool, actor_id: Uuid) -> CoreResult<Vec<Conversation>> {
    Ok(store::conversations(db_pool, actor_id).await?)
}

pub async fn get_unread_count(db_pool: &SqlitePool, actor_id: Uuid) -> CoreResult<i64> {
    Ok(store::unread_count(db_pool, actor_id).await?)
}
