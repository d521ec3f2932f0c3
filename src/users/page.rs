use axum::{debug_handler, extract::State, Json};
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{extract::{JsonBody, PathParam}, session::Actor, AppResult, AppState, CoreError};

use super::{directory::{self, ProfileUpdate}, PublicUser, User};

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateMeBody {
    alias: Option<String>,
    summary: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn me(
    State(db_pool): State<SqlitePool>,
    Actor(actor_id): Actor,
) -> AppResult<Json<User>> {
    let user = directory::find_by_id(&db_pool, actor_id)
        .await
        .map_err(CoreError::from)?
        .ok_or(CoreError::NotFound("user"))?;
    Ok(Json(user))
}

#[debug_handler(state = AppState)]
pub(crate) async fn update_me(
    State(db_pool): State<SqlitePool>,
    Actor(actor_id): Actor,
    JsonBody(UpdateMeBody { alias, summary }): JsonBody<UpdateMeBody>,
) -> AppResult<Json<User>> {
    let user = directory::update_profile(&db_pool, actor_id, ProfileUpdate { alias, summary }).await?;
    tracing::info!(user_id = %actor_id, "profile updated");
    Ok(Json(user))
}

#[debug_handler(state = AppState)]
pub(crate) async fn profile(
    State(db_pool): State<SqlitePool>,
    Actor(actor_id): Actor,
    PathParam(user_id): PathParam<Uuid>,
) -> AppResult<Json<PublicUser>> {
    Ok(Json(directory::view_profile(&db_pool, actor_id, user_id).await?))
}
