use sqlx::{SqliteExecutor, SqlitePool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    activity::{self, ActivityAction},
    CoreError, CoreResult,
};

use super::{PublicUser, User};

const USER_COLUMNS: &str = "id,provider_id,username,email,alias,summary,created_at,updated_at";

const ALIAS_MAX: usize = 64;
const SUMMARY_MAX: usize = 1000;

pub struct NewUser<'a> {
    pub provider_id: &'a str,
    pub username: &'a str,
    pub email: Option<&'a str>,
    pub alias: &'a str,
}

pub async fn create_user(db_pool: &SqlitePool, new_user: NewUser<'_>) -> Result<User, sqlx::Error> {
    let now = OffsetDateTime::now_utc();
    sqlx::query_as(&format!(
        "INSERT INTO users ({USER_COLUMNS}) VALUES (?,?,?,?,?,NULL,?,?) RETURNING {USER_COLUMNS}"
    ))
    .bind(Uuid::now_v7().to_string())
    .bind(new_user.provider_id)
    .bind(new_user.username)
    .bind(new_user.email)
    .bind(new_user.alias)
    .bind(now)
    .bind(now)
    .fetch_one(db_pool)
    .await
}

pub async fn find_by_id(executor: impl SqliteExecutor<'_>, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id=?"))
        .bind(id.to_string())
        .fetch_optional(executor)
        .await
}

pub async fn find_by_provider_id(
    executor: impl SqliteExecutor<'_>,
    provider_id: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE provider_id=?"))
        .bind(provider_id)
        .fetch_optional(executor)
        .await
}

pub async fn exists(executor: impl SqliteExecutor<'_>, id: Uuid) -> Result<bool, sqlx::Error> {
    let found: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM users WHERE id=?")
        .bind(id.to_string())
        .fetch_optional(executor)
        .await?;
    Ok(found.is_some())
}

pub async fn public_profile(executor: impl SqliteExecutor<'_>, id: Uuid) -> Result<Option<PublicUser>, sqlx::Error> {
    sqlx::query_as("SELECT id,username,alias,summary,created_at FROM users WHERE id=?")
        .bind(id.to_string())
        .fetch_optional(executor)
        .await
}

/// Fields a user may change about themselves. `None` leaves the field as is;
/// an empty summary clears it.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub alias: Option<String>,
    pub summary: Option<String>,
}

pub async fn update_profile(db_pool: &SqlitePool, id: Uuid, update: ProfileUpdate) -> CoreResult<User> {
    let alias = match update.alias.as_deref().map(str::trim) {
        Some("") => return Err(CoreError::Invalid("alias must not be empty")),
        Some(alias) if alias.chars().count() > ALIAS_MAX => {
            return Err(CoreError::Invalid("alias is too long"));
        }
        other => other,
    };
    let summary = match update.summary.as_deref().map(str::trim) {
        Some(summary) if summary.chars().count() > SUMMARY_MAX => {
            return Err(CoreError::Invalid("summary is too long"));
        }
        Some(summary) => Some(Some(summary).filter(|s| !s.is_empty())),
        None => None,
    };

    let updated: Option<User> = sqlx::query_as(&format!(
        "UPDATE users SET alias=COALESCE(?,alias), summary=CASE WHEN ? THEN ? ELSE summary END, updated_at=? WHERE id=? RETURNING {USER_COLUMNS}"
    ))
    .bind(alias)
    .bind(summary.is_some())
    .bind(summary.flatten())
    .bind(OffsetDateTime::now_utc())
    .bind(id.to_string())
    .fetch_optional(db_pool)
    .await?;

    updated.ok_or(CoreError::NotFound("user"))
}

/// Looks up `target` on behalf of `viewer`, recording the view unless users
/// are looking at themselves.
pub async fn view_profile(db_pool: &SqlitePool, viewer: Uuid, target: Uuid) -> CoreResult<PublicUser> {
    let mut tx = db_pool.begin().await?;

    let profile = public_profile(&mut *tx, target)
        .await?
        .ok_or(CoreError::NotFound("user"))?;

    if viewer != target {
        activity::append(&mut *tx, viewer, target, ActivityAction::Viewed).await?;
    }

    tx.commit().await?;
    Ok(profile)
}

#[cfg(test)]
pub(crate) async fn seed_user(db_pool: &SqlitePool, username: &str) -> User {
    create_user(
        db_pool,
        NewUser {
            provider_id: &format!("test|{username}"),
            username,
            email: Some(&format!("{username}@example.com")),
            alias: username,
        },
    )
    .await
    .unwrap()
}
