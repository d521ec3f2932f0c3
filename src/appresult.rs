use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::CoreError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

fn status_of(err: &CoreError) -> StatusCode {
    use CoreError::*;
    match err {
        NotFound(_) => StatusCode::NOT_FOUND,
        Duplicate(_) | InvalidState(_) | InvalidTransition(_) | Invalid(_) => StatusCode::BAD_REQUEST,
        Forbidden(_) => StatusCode::FORBIDDEN,
        Unauthenticated => StatusCode::UNAUTHORIZED,
        Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn rejected(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": "invalid", "message": message }))).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(rejection) = self.0.downcast_ref::<JsonRejection>() {
            return rejected(rejection.status(), rejection.body_text());
        }
        if let Some(rejection) = self.0.downcast_ref::<PathRejection>() {
            return rejected(rejection.status(), rejection.body_text());
        }

        let Some(err) = self.0.downcast_ref::<CoreError>() else {
            tracing::error!(error = %self.0, backtrace = %self.0.backtrace(), "unhandled error");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal", "message": "internal server error" })),
            )
                .into_response();
        };

        let status = status_of(err);
        let body = match err {
            CoreError::Duplicate(existing) => json!({
                "error": err.kind(),
                "message": err.to_string(),
                "relationship": existing,
            }),
            CoreError::Unavailable(source) => {
                tracing::error!(error = %source, "store unavailable");
                json!({ "error": err.kind(), "message": "service temporarily unavailable" })
            }
            _ => json!({ "error": err.kind(), "message": err.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
