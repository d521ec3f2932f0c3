use axum::{routing::get, Router};
use rand::seq::IndexedRandom;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{users::{directory::{self, NewUser}, User}, AppState, CoreError, CoreResult};

mod clients;
mod login;
mod lockin;
mod logout;

pub use clients::{ClientProvider, Clients};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login/{provider}", get(login::login))
        .route("/lockin/{provider}", get(lockin::lockin))
        .route("/logout", get(logout::logout))
}

const ADJECTIVES: [&str; 25] = [
    "Quick", "Lazy", "Mysterious", "Jolly", "Brave", "Silent", "Witty", "Fierce",
    "Clever", "Gentle", "Wild", "Calm", "Bold", "Shy", "Proud", "Happy", "Sad",
    "Eager", "Fancy", "Rusty", "Golden", "Silver", "Bright", "Dark", "Lucky",
];

const NOUNS: [&str; 24] = [
    "Fox", "Bear", "Eagle", "Wolf", "Dragon", "Tiger", "Lion", "Owl", "Rabbit",
    "Falcon", "Hawk", "Shark", "Panda", "Kitten", "Puppy", "Phoenix", "Griffin",
    "Unicorn", "Turtle", "Dolphin", "Whale", "Elephant", "Giraffe", "Zebra",
];

/// First sign-in: a generated username and a random alias the user can change later.
///
/// A concurrent first sign-in with the same provider account returns the user
/// the other request created. An email already registered to another account
/// is refused.
pub(crate) async fn create_user(db_pool: &SqlitePool, provider_id: &str, email: Option<&str>) -> CoreResult<User> {
    let username = "user".to_owned() + &Uuid::now_v7().simple().to_string();
    let alias = random_alias();

    let created = directory::create_user(
        db_pool,
        NewUser { provider_id, username: &username, email, alias: &alias },
    )
    .await;

    match created {
        Ok(user) => Ok(user),
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
            match directory::find_by_provider_id(db_pool, provider_id).await? {
                Some(user) => Ok(user),
                None => Err(CoreError::Invalid("email is already registered to another account")),
            }
        }
        Err(err) => Err(err.into()),
    }
}

fn random_alias() -> String {
    let mut rng = rand::rng();
    format!(
        "{} {}",
        ADJECTIVES.choose(&mut rng).unwrap_or(&"Quiet"),
        NOUNS.choose(&mut rng).unwrap_or(&"Dove"),
    )
}

/// Only same-site paths are followed after sign-in or sign-out.
pub(crate) fn safe_return_url(url: &str) -> Option<&str> {
    (url.starts_with('/') && !url.starts_with("//") && !url.contains('\\')).then_some(url)
}
