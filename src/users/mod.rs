pub mod directory;
mod page;

use axum::{routing::get, Router};
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(page::me).put(page::update_me))
        .route("/{id}", get(page::profile))
}

/// A user as the owner sees it. `provider_id` links the record to the identity
/// provider and never leaves the server.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[sqlx(try_from = "String")]
    pub id: Uuid,
    #[serde(skip)]
    pub provider_id: String,
    pub username: String,
    pub email: Option<String>,
    pub alias: String,
    pub summary: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// What other users may see.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    #[sqlx(try_from = "String")]
    pub id: Uuid,
    pub username: String,
    pub alias: String,
    pub summary: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        PublicUser {
            id: user.id,
            username: user.username,
            alias: user.alias,
            summary: user.summary,
            created_at: user.created_at,
        }
    }
}
