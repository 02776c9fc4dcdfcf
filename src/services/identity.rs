//! OAuth2 client-credentials tokens for the drive API.

use crate::errors::{IntakeError, IntakeResult, response_text};
use serde::Deserialize;
use std::{
    fmt,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;
use tracing::debug;

pub const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Tokens are refreshed this long before they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct ClientCredentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Fetches and caches bearer tokens for the storage backend.
pub struct TokenProvider {
    http: reqwest::Client,
    login_base_url: String,
    credentials: ClientCredentials,
    cache: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(
        http: reqwest::Client,
        login_base_url: impl Into<String>,
        credentials: ClientCredentials,
    ) -> Self {
        Self {
            http,
            login_base_url: login_base_url.into(),
            credentials,
            cache: Mutex::new(None),
        }
    }

    /// A valid bearer token, reusing the cached one while it has time left.
    pub async fn token(&self) -> IntakeResult<String> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if Instant::now() + REFRESH_MARGIN < cached.expires_at {
                return Ok(cached.value.clone());
            }
        }

        let fresh = self.fetch().await?;
        debug!(expires_in = fresh.expires_in, "acquired access token");
        let value = fresh.access_token.clone();
        *cache = Some(CachedToken {
            value: fresh.access_token,
            expires_at: Instant::now() + Duration::from_secs(fresh.expires_in),
        });
        Ok(value)
    }

    async fn fetch(&self) -> IntakeResult<TokenResponse> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.login_base_url.trim_end_matches('/'),
            self.credentials.tenant_id
        );
        let resp = self
            .http
            .post(&url)
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("scope", GRAPH_SCOPE),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = response_text(resp).await;
            return Err(IntakeError::Auth {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp.json().await?)
    }
}
