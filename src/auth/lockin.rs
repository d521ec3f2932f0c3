use anyhow::anyhow;
use axum::{debug_handler, extract::{Path, Query, State}, response::Redirect};
use oauth2::{AuthorizationCode, CsrfToken, PkceCodeVerifier, TokenResponse};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{
    session::{CSRF_STATE, PKCE_VERIFIER, RETURN_URL, USER_ID},
    users::directory,
    AppResult, AppState, CoreError, GetField,
};

use super::{clients::ClientProvider, create_user, Clients};

#[derive(Deserialize)]
pub struct LockinQuery {
    pub state: Option<String>,
    pub code: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FirebaseRequest {
    post_body: String,
    request_uri: String,
    return_idp_credential: bool,
    return_secure_token: bool,
}

#[debug_handler(state = AppState)]
pub(crate) async fn lockin(
    Path(provider): Path<ClientProvider>,
    Query(LockinQuery { state, code }): Query<LockinQuery>,
    State(db_pool): State<SqlitePool>,
    State(clients): State<Clients>,
    session: Session,
) -> AppResult<Redirect> {
    let state = CsrfToken::new(state.ok_or(CoreError::Invalid("OAuth: without state"))?);
    let code = AuthorizationCode::new(code.ok_or(CoreError::Invalid("OAuth: without code"))?);

    let Some(stored_state) = session.remove::<String>(CSRF_STATE).await? else {
        return Err(CoreError::Invalid("no sign-in in progress").into());
    };
    if state.secret().as_str() != stored_state.as_str() {
        return Err(CoreError::Invalid("csrf tokens don't match").into());
    }

    let Some(pkce_verifier) = session.remove::<String>(PKCE_VERIFIER).await? else {
        return Err(CoreError::Invalid("no sign-in in progress").into());
    };

    let client = clients.get_client(provider)?;
    let firebase_idpurl = clients.firebase_idpurl.ok_or(anyhow!("firebase is not configured"))?;
    let http_client = reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .build()?;
    let token_result = client
        .exchange_code(code)
        .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
        .request_async(&http_client)
        .await?;

    let access_token = token_result.access_token().secret();
    let body: serde_json::Value = http_client.post(firebase_idpurl)
        .json(&FirebaseRequest {
            post_body: format!("access_token={access_token}&providerId={}", provider.id()),
            request_uri: "http://localhost/".to_owned(),
            return_idp_credential: true,
            return_secure_token: true,
        })
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let provider_id = body.get_str_field("localId")?;
    let email = body.get_str_field("email").ok();

    let user = match directory::find_by_provider_id(&db_pool, &provider_id).await.map_err(CoreError::from)? {
        Some(user) => {
            tracing::info!(user_id = %user.id, %provider, "welcome back");
            user
        }
        None => {
            let user = create_user(&db_pool, &provider_id, email.as_deref()).await?;
            tracing::info!(user_id = %user.id, username = %user.username, %provider, "new user signed up");
            user
        }
    };

    session.cycle_id().await?;
    session.insert(USER_ID, user.id).await?;

    let return_url = session.remove::<String>(RETURN_URL).await?.unwrap_or("/".to_string());
    Ok(Redirect::to(return_url.as_str()))
}
