//! Email/password authentication against the backend's auth service.

use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use thiserror::Error;

use super::session::{AuthUser, Session};

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("{message}")]
    Rejected { status: u16, message: String },
}

/// Result of a sign-up request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// The account is usable right away
    SignedIn(Session),
    /// The account exists but the email address must be confirmed first
    ConfirmationRequired { email: String },
}

/// Token response as the auth service returns it
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: AuthUser,
}

impl From<TokenResponse> for Session {
    fn from(token: TokenResponse) -> Self {
        let expires_at = token
            .expires_at
            .or_else(|| token.expires_in.map(|secs| Utc::now().timestamp() + secs));
        Self {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at,
            user: token.user,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub struct AuthClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AuthClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, AuthError> {
        let base_url = base_url.trim_end_matches('/').to_string();

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(AuthError::InvalidUrl("URL must start with http:// or https://".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let response = self
            .client
            .post(self.url("token?grant_type=password"))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        let token: TokenResponse = check(response).await?.json().await?;
        log::info!("Auth: signed in as {}", token.user.id);
        Ok(token.into())
    }

    /// Register a new account. The display name defaults to the local part
    /// of the email address.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<SignUpOutcome, AuthError> {
        let display_name = display_name
            .map(str::to_string)
            .unwrap_or_else(|| default_display_name(email));
        let response = self
            .client
            .post(self.url("signup"))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "data": { "display_name": display_name },
            }))
            .send()
            .await?;
        let body: serde_json::Value = check(response).await?.json().await?;
        parse_sign_up(body, email)
    }

    /// Exchange the refresh token for a fresh session
    pub async fn refresh(&self, session: &Session) -> Result<Session, AuthError> {
        let response = self
            .client
            .post(self.url("token?grant_type=refresh_token"))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "refresh_token": session.refresh_token }))
            .send()
            .await?;
        let token: TokenResponse = check(response).await?.json().await?;
        log::debug!("Auth: refreshed session for {}", token.user.id);
        Ok(token.into())
    }

    pub async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        let response = self
            .client
            .post(self.url("logout"))
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// Ask the auth service to email a password reset link
    pub async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        let response = self
            .client
            .post(self.url("recover"))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

async fn check(response: Response) -> Result<Response, AuthError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    Err(AuthError::Rejected {
        status: status.as_u16(),
        message: error_message(status, &text),
    })
}

fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|e| e.error_description.or(e.msg).or(e.message).or(e.error))
        .unwrap_or_else(|| format!("auth request failed with status {}", status.as_u16()))
}

fn default_display_name(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

fn parse_sign_up(body: serde_json::Value, email: &str) -> Result<SignUpOutcome, AuthError> {
    if body.get("access_token").is_some() {
        let token: TokenResponse = serde_json::from_value(body)?;
        return Ok(SignUpOutcome::SignedIn(token.into()));
    }
    Ok(SignUpOutcome::ConfirmationRequired {
        email: email.to_string(),
    })
}
