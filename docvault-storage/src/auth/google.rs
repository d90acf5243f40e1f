//! Google OAuth 2.0 for installed applications.
//!
//! Refresh goes straight to the token endpoint. First-time consent uses the
//! loopback flow: a throwaway axum listener on `127.0.0.1:<ephemeral>`
//! receives the redirect carrying the authorization code, which is then
//! exchanged (with PKCE) for an access/refresh token pair.

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration as ChronoDuration, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info};

use super::session::AuthFlow;
use super::token::OAuthToken;
use crate::error::{Result, StorageError};

/// Scope granting access to files the application itself created.
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Application credentials as downloaded from the Google Cloud console.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Parse a `credentials.json` file (`installed` or `web` section).
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ClientSecretsFile = serde_json::from_str(json)
            .map_err(|e| StorageError::Config(format!("invalid client secrets: {}", e)))?;
        file.installed.or(file.web).ok_or_else(|| {
            StorageError::Config(
                "client secrets must contain an 'installed' or 'web' section".to_string(),
            )
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            StorageError::Config(format!(
                "cannot read client secrets {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&contents)
    }
}

/// Receives the consent URL during the interactive flow.
pub type UrlOpener = Arc<dyn Fn(&str) + Send + Sync>;

/// Google implementation of [`AuthFlow`].
pub struct GoogleOAuth {
    client: reqwest::Client,
    secrets: ClientSecrets,
    scopes: Vec<String>,
    callback_timeout: Duration,
    opener: UrlOpener,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

type CallbackSender = Arc<Mutex<Option<oneshot::Sender<CallbackParams>>>>;

impl GoogleOAuth {
    pub fn new(secrets: ClientSecrets) -> Self {
        Self {
            client: reqwest::Client::new(),
            secrets,
            scopes: vec![DRIVE_FILE_SCOPE.to_string()],
            callback_timeout: Duration::from_secs(300),
            opener: Arc::new(|url: &str| {
                info!("Authorization required, open this URL in a browser: {}", url);
                eprintln!("\nPlease visit this URL to authorize docvault:\n\n    {}\n", url);
            }),
        }
    }

    /// Load client secrets from `credentials.json`.
    pub fn from_credentials_file(path: &Path) -> Result<Self> {
        Ok(Self::new(ClientSecrets::from_file(path)?))
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// How long to wait for the browser redirect before giving up.
    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = timeout;
        self
    }

    /// Replace the default "print the URL" behaviour.
    pub fn with_url_opener(mut self, opener: UrlOpener) -> Self {
        self.opener = opener;
        self
    }

    pub fn secrets(&self) -> &ClientSecrets {
        &self.secrets
    }

    /// Build the consent URL for the given loopback redirect.
    pub fn authorize_url(&self, redirect_uri: &str, state: &str, challenge: &str) -> Result<String> {
        let mut url = url::Url::parse(&self.secrets.auth_uri)
            .map_err(|e| StorageError::Config(format!("invalid auth_uri: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.secrets.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", state)
            .append_pair("code_challenge", challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");
        Ok(url.to_string())
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<OAuthToken> {
        let mut form: Vec<(&str, &str)> = params.to_vec();
        form.push(("client_id", self.secrets.client_id.as_str()));
        if let Some(secret) = self.secrets.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        let response = self
            .client
            .post(&self.secrets.token_uri)
            .form(&form)
            .send()
            .await
            .map_err(|e| StorageError::Auth(format!("token endpoint unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(StorageError::Auth(format!(
                "token endpoint returned {}: {}",
                status, text
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Auth(format!("unreadable token response: {}", e)))?;

        let scopes = match body.scope {
            Some(s) => s.split_whitespace().map(str::to_string).collect(),
            None => self.scopes.clone(),
        };

        Ok(OAuthToken {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
            expiry: body
                .expires_in
                .map(|secs| Utc::now() + ChronoDuration::seconds(secs)),
            scopes,
        })
    }
}

/// Generate a PKCE `(verifier, challenge)` pair.
pub fn generate_pkce() -> (String, String) {
    let raw = format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    );
    let verifier = URL_SAFE_NO_PAD.encode(raw.as_bytes());

    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    let challenge = URL_SAFE_NO_PAD.encode(hasher.finalize());

    (verifier, challenge)
}

async fn callback(
    State(sender): State<CallbackSender>,
    Query(params): Query<CallbackParams>,
) -> Html<&'static str> {
    let failed = params.error.is_some();
    if let Some(tx) = sender.lock().await.take() {
        let _ = tx.send(params);
    }
    if failed {
        Html("<html><body>Authorization was denied. You may close this window.</body></html>")
    } else {
        Html("<html><body>Authorization complete. You may close this window.</body></html>")
    }
}

#[async_trait]
impl AuthFlow for GoogleOAuth {
    async fn refresh(&self, token: &OAuthToken) -> Result<OAuthToken> {
        let refresh = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| StorageError::Auth("token has no refresh token".to_string()))?;
        debug!("Requesting refreshed access token");
        self.token_request(&[("grant_type", "refresh_token"), ("refresh_token", refresh)])
            .await
    }

    async fn authorize(&self) -> Result<OAuthToken> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://127.0.0.1:{}/", port);

        let (verifier, challenge) = generate_pkce();
        let state = uuid::Uuid::new_v4().simple().to_string();
        let url = self.authorize_url(&redirect_uri, &state, &challenge)?;

        let (code_tx, code_rx) = oneshot::channel::<CallbackParams>();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let sender: CallbackSender = Arc::new(Mutex::new(Some(code_tx)));
        let router = Router::new().route("/", get(callback)).with_state(sender);

        let server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = stop_rx.await;
                })
                .await
        });

        debug!(port, "Waiting for OAuth redirect");
        (self.opener)(&url);

        let received = tokio::time::timeout(self.callback_timeout, code_rx).await;
        let _ = stop_tx.send(());
        let _ = server.await;

        let params = match received {
            Ok(Ok(params)) => params,
            Ok(Err(_)) => {
                return Err(StorageError::Auth("callback listener closed".to_string()));
            }
            Err(_) => {
                return Err(StorageError::Auth(format!(
                    "no authorization received within {}s",
                    self.callback_timeout.as_secs()
                )));
            }
        };

        if let Some(error) = params.error {
            return Err(StorageError::Auth(format!("consent denied: {}", error)));
        }
        if params.state.as_deref() != Some(state.as_str()) {
            return Err(StorageError::Auth("state mismatch in OAuth redirect".to_string()));
        }
        let code = params
            .code
            .ok_or_else(|| StorageError::Auth("redirect carried no code".to_string()))?;

        info!("Authorization code received, exchanging for tokens");
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("code_verifier", verifier.as_str()),
        ])
        .await
    }
}
