use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;
use uuid::Uuid;

use crate::{AppError, CoreError};

pub const USER_ID: &str = "user_id";
pub const CSRF_STATE: &str = "csrf_state";
pub const PKCE_VERIFIER: &str = "pkce_verifier";
pub const RETURN_URL: &str = "return_url";

/// The signed-in user performing the request.
///
/// Handlers take this instead of reading the session themselves, so every
/// operation below the HTTP layer receives the actor as a plain argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor(pub Uuid);

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|_| CoreError::Unauthenticated)?;

        match session.get::<Uuid>(USER_ID).await? {
            Some(user_id) => Ok(Actor(user_id)),
            None => Err(CoreError::Unauthenticated.into()),
        }
    }
}
