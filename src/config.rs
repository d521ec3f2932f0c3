use std::{net::SocketAddr, path::PathBuf};

use anyhow::{anyhow, Context};

/// Process configuration, read from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub bind_addr: SocketAddr,
    pub public_url: String,
    pub client_secrets_path: PathBuf,
    pub session_inactivity_minutes: i64,
    pub session_secure: bool,
    pub cors_origin: Option<String>,
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Config> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
        let database_url = lookup("DATABASE_URL").ok_or(anyhow!("DATABASE_URL must be set"))?;

        let db_max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", 16)?;
        if db_max_connections == 0 {
            return Err(anyhow!("DB_MAX_CONNECTIONS must be at least 1"));
        }

        let bind_addr: SocketAddr = lookup("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_owned())
            .parse()
            .context("BIND_ADDR is not a socket address")?;

        let public_url = lookup("PUBLIC_URL")
            .unwrap_or_else(|| "http://localhost:8080".to_owned())
            .trim_end_matches('/')
            .to_owned();

        Ok(Config {
            database_url,
            db_max_connections,
            bind_addr,
            public_url,
            client_secrets_path: lookup("CLIENT_SECRETS_PATH")
                .unwrap_or_else(|| "client_secret.json".to_owned())
                .into(),
            session_inactivity_minutes: parse_or(&lookup, "SESSION_INACTIVITY_MINUTES", 60)?,
            session_secure: parse_or(&lookup, "SESSION_SECURE", false)?,
            cors_origin: lookup("CORS_ORIGIN").filter(|origin| !origin.trim().is_empty()),
            log_json: parse_or(&lookup, "LOG_JSON", false)?,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("{key}={raw:?} is invalid")),
        None => Ok(default),
    }
}
