use axum::{debug_handler, extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{extract::{JsonBody, PathParam}, session::Actor, AppResult, AppState};

use super::{gateway, Conversation, Message};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SendMessageBody {
    receiver_id: Uuid,
    message: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn send(
    State(db_pool): State<SqlitePool>,
    Actor(actor_id): Actor,
    JsonBody(SendMessageBody { receiver_id, message }): JsonBody<SendMessageBody>,
) -> AppResult<(StatusCode, Json<Message>)> {
    let message = gateway::send_message(&db_pool, actor_id, receiver_id, &message).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[debug_handler(state = AppState)]
pub(crate) async fn messages(
    State(db_pool): State<SqlitePool>,
    Actor(actor_id): Actor,
    PathParam(user_id): PathParam<Uuid>,
) -> AppResult<Json<Vec<Message>>> {
    Ok(Json(gateway::get_messages(&db_pool, actor_id, user_id).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn conversations(
    State(db_pool): State<SqlitePool>,
    Actor(actor_id): Actor,
) -> AppResult<Json<Vec<Conversation>>> {
    Ok(Json(gateway::get_conversations(&db_pool, actor_id).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn unread(
    State(db_pool): State<SqlitePool>,
    Actor(actor_id): Actor,
) -> AppResult<Json<Value>> {
    let unread_count = gateway::get_unread_count(&db_pool, actor_id).await?;
    Ok(Json(json!({ "unreadCount": unread_count })))
}
