mod handlers;
pub mod service;
pub mod store;

use std::{fmt, str::FromStr};

use axum::{routing::{delete, get, post, put}, Router};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{users::PublicUser, AppState, CoreError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/request", post(handlers::send_request))
        .route("/{id}/status", put(handlers::respond))
        .route("/withdraw/{id}", delete(handlers::withdraw))
        .route("/matches", get(handlers::matches))
        .route("/received", get(handlers::received))
        .route("/sent", get(handlers::sent))
        .route("/with/{user_id}", get(handlers::with_user))
}

/// `Pending` is the only non-terminal status. Withdrawal deletes the row
/// instead of adding a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RelationshipStatus {
    Pending,
    Matched,
    Rejected,
}

impl RelationshipStatus {
    pub fn as_str(&self) -> &'static str {
        use RelationshipStatus::*;
        match self {
            Pending => "pending",
            Matched => "matched",
            Rejected => "rejected",
        }
    }
}

impl fmt::Display for RelationshipStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The recipient's answer to a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Matched,
    Rejected,
}

impl FromStr for Decision {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "matched" => Ok(Decision::Matched),
            "rejected" => Ok(Decision::Rejected),
            other => Err(CoreError::InvalidTransition(format!(
                "status must be \"matched\" or \"rejected\", got {other:?}"
            ))),
        }
    }
}

impl From<Decision> for RelationshipStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Matched => RelationshipStatus::Matched,
            Decision::Rejected => RelationshipStatus::Rejected,
        }
    }
}

/// A directed proposal: `follower_user_id` asked, `followed_user_id` answers.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    #[sqlx(try_from = "String")]
    pub id: Uuid,
    #[sqlx(try_from = "String")]
    pub follower_user_id: Uuid,
    #[sqlx(try_from = "String")]
    pub followed_user_id: Uuid,
    pub status: RelationshipStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelationshipWithUser {
    pub relationship: Relationship,
    pub user: PublicUser,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decisions_parse_strictly() {
        assert_eq!("matched".parse::<Decision>().unwrap(), Decision::Matched);
        assert_eq!("rejected".parse::<Decision>().unwrap(), Decision::Rejected);

        for bad in ["pending", "MATCHED", "", "accepted"] {
            assert!(matches!(bad.parse::<Decision>(), Err(CoreError::InvalidTransition(_))));
        }
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_value(RelationshipStatus::Matched).unwrap(), "matched");
        assert_eq!(RelationshipStatus::Pending.to_string(), "pending");
    }
}
