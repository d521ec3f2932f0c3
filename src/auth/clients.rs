use std::{fmt, path::Path};

use anyhow::{anyhow, Context};
use oauth2::{basic::BasicClient, AuthUrl, ClientId, ClientSecret, EndpointNotSet, EndpointSet, RedirectUrl, TokenUrl};
use serde::Deserialize;
use serde_json::Value;

use crate::{CoreError, GetField};

type HappyClient = BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClientProvider {
    Google,
    Github,
}

impl ClientProvider {
    pub fn id(&self) -> &str {
        use ClientProvider::*;
        match self {
            Google => "google.com",
            Github => "github.com",
        }
    }

    fn slug(&self) -> &str {
        use ClientProvider::*;
        match self {
            Google => "google",
            Github => "github",
        }
    }

    fn endpoints(&self) -> (&'static str, &'static str) {
        use ClientProvider::*;
        match self {
            Google => ("https://accounts.google.com/o/oauth2/auth", "https://oauth2.googleapis.com/token"),
            Github => ("https://github.com/login/oauth/authorize", "https://github.com/login/oauth/access_token"),
        }
    }
}

impl fmt::Display for ClientProvider {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// OAuth clients for the sign-in providers plus the Firebase endpoint that
/// turns a provider token into an account id.
#[derive(Clone, Default)]
pub struct Clients {
    pub(crate) firebase_idpurl: Option<String>,
    google_client: Option<HappyClient>,
    github_client: Option<HappyClient>,
}

impl Clients {
    /// No provider configured; every login attempt is refused.
    pub fn disabled() -> Clients {
        Clients::default()
    }

    /// Reads the secrets file. A missing file disables sign-in instead of
    /// failing start-up, so the API can still run behind another gateway.
    pub fn load(path: &Path, public_url: &str) -> anyhow::Result<Clients> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "client secrets not found, OAuth sign-in disabled");
            return Ok(Clients::disabled());
        }
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let json: Value = serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        Clients::from_json(&json, public_url)
    }

    pub fn from_json(json: &Value, public_url: &str) -> anyhow::Result<Clients> {
        let firebase_idpurl = format!(
            "https://identitytoolkit.googleapis.com/v1/accounts:signInWithIdp?key={}",
            json.get_obj_field("firebase")?.get_str_field("apikey")?
        );

        Ok(Clients {
            firebase_idpurl: Some(firebase_idpurl),
            google_client: build_client(json, ClientProvider::Google, public_url)?,
            github_client: build_client(json, ClientProvider::Github, public_url)?,
        })
    }

    pub fn get_client(&self, provider: ClientProvider) -> Result<HappyClient, CoreError> {
        use ClientProvider::*;
        match provider {
            Google => self.google_client.clone(),
            Github => self.github_client.clone(),
        }
        .ok_or(CoreError::NotFound("login provider"))
    }
}

fn build_client(json: &Value, provider: ClientProvider, public_url: &str) -> anyhow::Result<Option<HappyClient>> {
    let Some(json) = json.get(provider.slug()) else {
        return Ok(None);
    };
    let client_id = ClientId::new(json.get_str_field("client_id")?);
    let client_secret = ClientSecret::new(json.get_str_field("client_secret")?);

    let (auth_url, token_url) = provider.endpoints();
    let auth_url = AuthUrl::new(auth_url.to_owned())?;
    let token_url = TokenUrl::new(token_url.to_owned())?;
    let redirect_url = RedirectUrl::new(format!("{public_url}/lockin/{}", provider.slug()))
        .map_err(|err| anyhow!("PUBLIC_URL does not form a valid redirect url: {err}"))?;

    Ok(Some(
        BasicClient::new(client_id)
            .set_client_secret(client_secret)
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url),
    ))
}
