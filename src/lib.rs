pub mod activity;
pub mod appresult;
pub mod auth;
pub mod chats;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod relationships;
pub mod session;
pub mod users;

use anyhow::anyhow;
use axum::{debug_handler, extract::{FromRef, State}, routing::get, Json, Router};
use serde_json::{json, Value};
use sqlx::SqlitePool;

pub use appresult::{AppError, AppResult};
pub use error::{CoreError, CoreResult};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub clients: auth::Clients,
}

/// Every route of the API, without session or transport layers.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(auth::router())
        .nest("/users", users::router())
        .nest("/relationships", relationships::router())
        .nest("/chats", chats::router())
}

#[debug_handler(state = AppState)]
async fn health(State(db_pool): State<SqlitePool>) -> AppResult<Json<Value>> {
    sqlx::query("SELECT 1").execute(&db_pool).await.map_err(CoreError::from)?;
    Ok(Json(json!({ "status": "ok" })))
}

pub trait GetField {
    fn get_str_field(&self, field: &str) -> anyhow::Result<String>;
    fn get_obj_field(&self, field: &str) -> anyhow::Result<&Value>;
}

impl GetField for Value {
    fn get_str_field(&self, field: &str) -> anyhow::Result<String> {
        Ok(
            self.get(field)
            .ok_or(anyhow!("expected {field} in response"))?
            .as_str()
            .ok_or(anyhow!("expected {field} to be a string"))?
            .to_owned()
        )
    }

    fn get_obj_field(&self, field: &str) -> anyhow::Result<&Value> {
        self.get(field)
        .ok_or(anyhow!("expected {field} in {self}"))
    }
}
