//! Lightweight OAuth2 Authorization Code flow for the Google Tasks API.
//!
//! 1. Opens browser to authorization URL (with a CSRF `state`)
//! 2. Listens on localhost for the redirect
//! 3. Exchanges the code for an access token (+ refresh token)
//! 4. Stores tokens in a JSON token file
//!
//! [`GoogleAuth`] then hands out access tokens, refreshing them when they
//! are within 60 seconds of expiry.

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::prelude::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::error::OAuthError;
use crate::storage::{data_dir, GoogleConfig};

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const TASKS_SCOPE: &str = "https://www.googleapis.com/auth/tasks";

const EXPIRY_BUFFER_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>, // Unix timestamp
    pub token_type: String,
    pub scope: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub service_name: String,
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
    pub redirect_port: u16,
}

impl OAuthConfig {
    /// Google Tasks client built from the `[google]` config section.
    pub fn google_tasks(google: &GoogleConfig) -> Self {
        Self {
            service_name: "google".to_string(),
            client_id: google.client_id.clone(),
            client_secret: google.client_secret.clone(),
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            scopes: vec![TASKS_SCOPE.to_string()],
            redirect_port: google.redirect_port,
        }
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/callback", self.redirect_port)
    }

    pub fn auth_url_full(&self, state: &str) -> String {
        let scopes = self.scopes.join(" ");
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&state={}",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri()),
            urlencoding::encode(&scopes),
            urlencoding::encode(state),
        )
    }

    fn ensure_configured(&self) -> Result<(), OAuthError> {
        if self.client_id.trim().is_empty() || self.client_secret.trim().is_empty() {
            return Err(OAuthError::CredentialsNotConfigured {
                service: self.service_name.clone(),
            });
        }
        Ok(())
    }
}

/// JSON file holding [`OAuthTokens`].
#[derive(Debug, Clone)]
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `<data_dir>/google_token.json`.
    pub fn google() -> Result<Self, OAuthError> {
        let dir = data_dir().map_err(|e| OAuthError::Storage(e.to_string()))?;
        Ok(Self::new(dir.join("google_token.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when no tokens have been stored yet.
    pub fn load(&self) -> Result<Option<OAuthTokens>, OAuthError> {
        match std::fs::read_to_string(&self.path) {
            Ok(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| OAuthError::Storage(format!("{}: {e}", self.path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(OAuthError::Storage(format!("{}: {e}", self.path.display()))),
        }
    }

    pub fn save(&self, tokens: &OAuthTokens) -> Result<(), OAuthError> {
        let json = serde_json::to_string_pretty(tokens)
            .map_err(|e| OAuthError::Storage(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| OAuthError::Storage(e.to_string()))?;
        }
        std::fs::write(&self.path, json)
            .map_err(|e| OAuthError::Storage(format!("{}: {e}", self.path.display())))
    }

    pub fn delete(&self) -> Result<(), OAuthError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OAuthError::Storage(e.to_string())),
        }
    }
}

/// Generate a cryptographically random state parameter for CSRF protection.
pub fn generate_csrf_state() -> Result<String, OAuthError> {
    let mut bytes = [0u8; 32];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| OAuthError::AuthorizationFailed(format!("failed to generate state: {e}")))?;
    Ok(BASE64_URL_SAFE_NO_PAD.encode(bytes))
}

/// Run the full OAuth2 flow: open browser -> listen for callback -> exchange code.
///
/// `show_url` receives the authorization URL so the caller can print it for
/// headless machines where no browser opens.
pub async fn authorize(
    http: &Client,
    config: &OAuthConfig,
    token_file: &TokenFile,
    timeout: Duration,
    show_url: impl FnOnce(&str),
) -> Result<OAuthTokens, OAuthError> {
    config.ensure_configured()?;

    let state = generate_csrf_state()?;
    let auth_url = config.auth_url_full(&state);

    let listener = TcpListener::bind(("127.0.0.1", config.redirect_port))
        .await
        .map_err(|e| OAuthError::AuthorizationFailed(format!("cannot listen for callback: {e}")))?;

    show_url(&auth_url);
    if let Err(e) = open::that(&auth_url) {
        tracing::warn!(error = %e, "could not open browser; use the printed URL");
    }

    let code = tokio::time::timeout(timeout, wait_for_callback(&listener, &state))
        .await
        .map_err(|_| OAuthError::CallbackTimeout {
            timeout_secs: timeout.as_secs(),
        })??;
    drop(listener);

    let tokens = exchange_code(http, config, &code).await?;
    token_file.save(&tokens)?;
    tracing::info!(path = %token_file.path().display(), "stored Google OAuth tokens");

    Ok(tokens)
}

async fn wait_for_callback(listener: &TcpListener, expected_state: &str) -> Result<String, OAuthError> {
    loop {
        let (mut stream, _) = listener
            .accept()
            .await
            .map_err(|e| OAuthError::InvalidCallback(format!("listener error: {e}")))?;

        let mut buf = [0u8; 8192];
        let n = stream
            .read(&mut buf)
            .await
            .map_err(|e| OAuthError::InvalidCallback(format!("read failed: {e}")))?;
        if n == 0 {
            continue;
        }
        let request = String::from_utf8_lossy(&buf[..n]);

        let outcome = parse_callback_request(&request, expected_state);
        let (status, title, message) = match &outcome {
            Ok(_) => ("200 OK", "Connected", "Google Tasks authentication succeeded."),
            Err(CallbackError::NotCallback) => ("404 Not Found", "OAuth Error", "Callback endpoint not found."),
            Err(CallbackError::Fatal(_)) => ("400 Bad Request", "OAuth Error", "Authentication failed. Please retry."),
        };
        send_html_response(&mut stream, status, title, message).await;

        match outcome {
            Ok(code) => return Ok(code),
            Err(CallbackError::NotCallback) => continue,
            Err(CallbackError::Fatal(e)) => return Err(e),
        }
    }
}

#[derive(Debug)]
enum CallbackError {
    /// Some other request hit the listener (favicon etc.); keep waiting.
    NotCallback,
    Fatal(OAuthError),
}

/// Extract the authorization code from a raw `GET /callback?...` request.
fn parse_callback_request(request: &str, expected_state: &str) -> Result<String, CallbackError> {
    let first_line = request.lines().next().unwrap_or_default();
    let mut parts = first_line.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();

    if method != "GET" {
        return Err(CallbackError::NotCallback);
    }

    let url = url::Url::parse(&format!("http://localhost{target}"))
        .map_err(|e| CallbackError::Fatal(OAuthError::InvalidCallback(e.to_string())))?;
    if url.path() != "/callback" {
        return Err(CallbackError::NotCallback);
    }

    let param = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    };

    if let Some(err) = param("error") {
        let msg = param("error_description").unwrap_or(err);
        return Err(CallbackError::Fatal(OAuthError::AuthorizationFailed(msg)));
    }

    match param("state") {
        Some(state) if state == expected_state => {}
        Some(_) => {
            return Err(CallbackError::Fatal(OAuthError::InvalidCallback(
                "state mismatch".to_string(),
            )))
        }
        None => {
            return Err(CallbackError::Fatal(OAuthError::InvalidCallback(
                "missing state".to_string(),
            )))
        }
    }

    param("code").ok_or_else(|| {
        CallbackError::Fatal(OAuthError::InvalidCallback("missing code".to_string()))
    })
}

async fn send_html_response(
    stream: &mut tokio::net::TcpStream,
    status: &str,
    title: &str,
    message: &str,
) {
    let body = format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{title}</title></head><body><h2>{title}</h2><p>{message}</p><p>You can close this tab.</p></body></html>"
    );
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.flush().await;
}

/// Exchange authorization code for tokens.
async fn exchange_code(
    http: &Client,
    config: &OAuthConfig,
    code: &str,
) -> Result<OAuthTokens, OAuthError> {
    let redirect_uri = config.redirect_uri();
    let params = [
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("code", code),
        ("grant_type", "authorization_code"),
        ("redirect_uri", redirect_uri.as_str()),
    ];

    let body = post_token_form(http, &config.token_url, &params)
        .await
        .map_err(OAuthError::TokenExchangeFailed)?;

    tokens_from_body(&body, None).map_err(OAuthError::TokenExchangeFailed)
}

/// Refresh an access token using a refresh token.
pub async fn refresh_token(
    http: &Client,
    config: &OAuthConfig,
    refresh: &str,
) -> Result<OAuthTokens, OAuthError> {
    let params = [
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("refresh_token", refresh),
        ("grant_type", "refresh_token"),
    ];

    let body = post_token_form(http, &config.token_url, &params)
        .await
        .map_err(OAuthError::TokenRefreshFailed)?;

    // Google omits refresh_token on refresh; keep the one we have.
    tokens_from_body(&body, Some(refresh)).map_err(OAuthError::TokenRefreshFailed)
}

async fn post_token_form(
    http: &Client,
    token_url: &str,
    params: &[(&str, &str)],
) -> Result<serde_json::Value, String> {
    let resp = http
        .post(token_url)
        .form(params)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    let body: serde_json::Value = resp.json().await.map_err(|e| e.to_string())?;

    if let Some(error) = body.get("error") {
        return Err(format!("OAuth error: {error}"));
    }
    Ok(body)
}

fn tokens_from_body(
    body: &serde_json::Value,
    previous_refresh: Option<&str>,
) -> Result<OAuthTokens, String> {
    let access_token = body["access_token"]
        .as_str()
        .filter(|t| !t.is_empty())
        .ok_or("missing access_token in token response")?
        .to_string();

    let expires_in = body.get("expires_in").and_then(|v| v.as_i64());
    let expires_at = expires_in.map(|ei| chrono::Utc::now().timestamp() + ei);

    Ok(OAuthTokens {
        access_token,
        refresh_token: body
            .get("refresh_token")
            .and_then(|v| v.as_str())
            .map(String::from)
            .or_else(|| previous_refresh.map(String::from)),
        expires_at,
        token_type: body["token_type"].as_str().unwrap_or("Bearer").to_string(),
        scope: body.get("scope").and_then(|v| v.as_str()).map(String::from),
    })
}

/// Check if tokens are expired at `now` (with 60s buffer).
pub fn is_expired(tokens: &OAuthTokens, now: i64) -> bool {
    match tokens.expires_at {
        Some(exp) => now > exp - EXPIRY_BUFFER_SECS,
        None => false,
    }
}

/// Something that can hand out a bearer token.
#[allow(async_fn_in_trait)]
pub trait TokenSource {
    async fn access_token(&self) -> Result<String, OAuthError>;
}

/// A fixed token (tests, or tokens minted elsewhere).
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, OAuthError> {
        Ok(self.0.clone())
    }
}

/// Token-file backed Google credentials with automatic refresh.
#[derive(Debug, Clone)]
pub struct GoogleAuth {
    config: OAuthConfig,
    token_file: TokenFile,
    http: Client,
}

impl GoogleAuth {
    pub fn new(config: OAuthConfig, token_file: TokenFile, http: Client) -> Self {
        Self {
            config,
            token_file,
            http,
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    pub fn token_file(&self) -> &TokenFile {
        &self.token_file
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.token_file.load(), Ok(Some(_)))
    }
}

impl TokenSource for GoogleAuth {
    /// Return a valid access token, refreshing if expired.
    async fn access_token(&self) -> Result<String, OAuthError> {
        let tokens = self
            .token_file
            .load()?
            .ok_or_else(|| OAuthError::NotAuthenticated {
                service: self.config.service_name.clone(),
            })?;

        if !is_expired(&tokens, chrono::Utc::now().timestamp()) {
            return Ok(tokens.access_token);
        }

        let refresh = tokens
            .refresh_token
            .as_deref()
            .ok_or(OAuthError::TokenExpired)?;

        tracing::debug!("refreshing Google access token");
        let refreshed = refresh_token(&self.http, &self.config, refresh).await?;
        self.token_file.save(&refreshed)?;
        Ok(refreshed.access_token)
    }
}
