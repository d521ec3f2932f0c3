pub mod gateway;
mod handlers;
pub mod store;

use axum::{routing::{get, post}, Router};
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{users::PublicUser, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/send", post(handlers::send))
        .route("/messages/{user_id}", get(handlers::messages))
        .route("/conversations", get(handlers::conversations))
        .route("/unread", get(handlers::unread))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum MessageStatus {
    Unread,
    Read,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[sqlx(try_from = "String")]
    pub id: Uuid,
    #[sqlx(try_from = "String")]
    pub sender_id: Uuid,
    #[sqlx(try_from = "String")]
    pub receiver_id: Uuid,
    pub message: String,
    pub status: MessageStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The latest message exchanged with one matched user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub user: PublicUser,
    pub last_message: Message,
    pub unread_count: i64,
    pub has_unread: bool,
}
