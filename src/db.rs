use std::{str::FromStr, time::Duration};

use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

// The pair index is what makes concurrent duplicate requests safe: whichever
// insert loses gets a unique violation, never a second row.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id          TEXT PRIMARY KEY NOT NULL,
    provider_id TEXT NOT NULL UNIQUE,
    username    TEXT NOT NULL UNIQUE,
    email       TEXT UNIQUE,
    alias       TEXT NOT NULL,
    summary     TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS relationships (
    id               TEXT PRIMARY KEY NOT NULL,
    follower_user_id TEXT NOT NULL REFERENCES users (id),
    followed_user_id TEXT NOT NULL REFERENCES users (id),
    status           TEXT NOT NULL CHECK (status IN ('pending', 'matched', 'rejected')),
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL,
    CHECK (follower_user_id <> followed_user_id)
);

CREATE UNIQUE INDEX IF NOT EXISTS relationships_pair ON relationships (
    MIN(follower_user_id, followed_user_id),
    MAX(follower_user_id, followed_user_id)
);
CREATE INDEX IF NOT EXISTS relationships_followed ON relationships (followed_user_id, status);
CREATE INDEX IF NOT EXISTS relationships_follower ON relationships (follower_user_id, status);

CREATE TABLE IF NOT EXISTS messages (
    id          TEXT PRIMARY KEY NOT NULL,
    sender_id   TEXT NOT NULL REFERENCES users (id),
    receiver_id TEXT NOT NULL REFERENCES users (id),
    message     TEXT NOT NULL,
    status      TEXT NOT NULL CHECK (status IN ('UNREAD', 'READ')),
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS messages_pair ON messages (sender_id, receiver_id, created_at);
CREATE INDEX IF NOT EXISTS messages_unread ON messages (receiver_id, status);

CREATE TABLE IF NOT EXISTS activity_log (
    id          TEXT PRIMARY KEY NOT NULL,
    user_id     TEXT NOT NULL REFERENCES users (id),
    receiver_id TEXT NOT NULL REFERENCES users (id),
    action      TEXT NOT NULL CHECK (action IN ('FOLLOWED', 'REJECTED', 'WITHDREW', 'VIEWED')),
    created_at  TEXT NOT NULL
);
"#;

/// Opens the pool and applies the schema.
///
/// In-memory URLs get exactly one connection that never idles out, otherwise
/// each connection would see its own empty database.
pub async fn connect(url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool_options = if url.contains(":memory:") {
        SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(Duration::from_secs(600))
    };

    let db_pool = pool_options.connect_with(options).await?;
    migrate(&db_pool).await?;
    Ok(db_pool)
}

pub async fn migrate(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(db_pool).await?;
    Ok(())
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    connect("sqlite::memory:", 1).await.unwrap()
}
