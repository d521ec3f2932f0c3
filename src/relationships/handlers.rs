use axum::{debug_handler, extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{extract::{JsonBody, PathParam}, session::Actor, AppResult, AppState};

use super::{service, Decision, Relationship, RelationshipWithUser};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SendRequestBody {
    followed_user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RespondBody {
    status: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct PairStatus {
    relationship: Option<Relationship>,
    matched: bool,
}

#[debug_handler(state = AppState)]
pub(crate) async fn send_request(
    State(db_pool): State<SqlitePool>,
    Actor(actor_id): Actor,
    JsonBody(SendRequestBody { followed_user_id }): JsonBody<SendRequestBody>,
) -> AppResult<(StatusCode, Json<Relationship>)> {
    let relationship = service::send_request(&db_pool, actor_id, followed_user_id).await?;
    Ok((StatusCode::CREATED, Json(relationship)))
}

#[debug_handler(state = AppState)]
pub(crate) async fn respond(
    State(db_pool): State<SqlitePool>,
    Actor(actor_id): Actor,
    PathParam(relationship_id): PathParam<Uuid>,
    JsonBody(RespondBody { status }): JsonBody<RespondBody>,
) -> AppResult<Json<Relationship>> {
    let decision: Decision = status.parse()?;
    Ok(Json(service::respond_to_request(&db_pool, actor_id, relationship_id, decision).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn withdraw(
    State(db_pool): State<SqlitePool>,
    Actor(actor_id): Actor,
    PathParam(relationship_id): PathParam<Uuid>,
) -> AppResult<Json<Value>> {
    service::withdraw_request(&db_pool, actor_id, relationship_id).await?;
    Ok(Json(json!({ "message": "Request withdrawn" })))
}

#[debug_handler(state = AppState)]
pub(crate) async fn matches(
    State(db_pool): State<SqlitePool>,
    Actor(actor_id): Actor,
) -> AppResult<Json<Vec<RelationshipWithUser>>> {
    Ok(Json(service::get_matches(&db_pool, actor_id).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn received(
    State(db_pool): State<SqlitePool>,
    Actor(actor_id): Actor,
) -> AppResult<Json<Vec<RelationshipWithUser>>> {
    Ok(Json(service::get_received_requests(&db_pool, actor_id).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn sent(
    State(db_pool): State<SqlitePool>,
    Actor(actor_id): Actor,
) -> AppResult<Json<Vec<RelationshipWithUser>>> {
    Ok(Json(service::get_sent_requests(&db_pool, actor_id).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn with_user(
    State(db_pool): State<SqlitePool>,
    Actor(actor_id): Actor,
    PathParam(user_id): PathParam<Uuid>,
) -> AppResult<Json<PairStatus>> {
    let (relationship, matched) = service::relationship_with(&db_pool, actor_id, user_id).await?;
    Ok(Json(PairStatus { relationship, matched }))
}
