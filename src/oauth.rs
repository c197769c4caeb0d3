//! OAuth2 authorization-code negotiation.
//!
//! [`AuthorizationNegotiator`] walks `NotStarted -> AwaitingCode ->
//! Completed`. Waiting for the user to paste a code is not a blocking call:
//! [`AuthorizationNegotiator::begin`] returns the URL to visit and the
//! caller re-enters with [`AuthorizationNegotiator::exchange`] once the code
//! arrives. A failed exchange leaves the negotiator waiting so the user can
//! retry with a fresh code.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Request};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::config::OAuthClientConfig;
use crate::credential::{CredentialStore, OAuthBundle};
use crate::error::{CaptionError, Result};

/// Successful token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Space-separated granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
}

/// Performs the code-for-token call against the token endpoint.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn exchange_code(&self, client: &OAuthClientConfig, code: &str) -> Result<TokenResponse>;
}

/// Token exchange over HTTP (`application/x-www-form-urlencoded` POST).
#[derive(Debug)]
pub struct HttpTokenExchanger {
    client: Client,
}

impl HttpTokenExchanger {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build the authorization-code grant request for `code`.
    pub fn token_request(&self, client: &OAuthClientConfig, code: &str) -> Result<Request> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", client.redirect_uri.as_str()),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
        ];

        self.client
            .post(&client.token_uri)
            .form(&params)
            .build()
            .map_err(|e| {
                CaptionError::config(format!("invalid token_uri '{}': {e}", client.token_uri))
            })
    }
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[async_trait]
impl TokenExchanger for HttpTokenExchanger {
    #[instrument(skip(self, client, code), fields(token_uri = %client.token_uri))]
    async fn exchange_code(&self, client: &OAuthClientConfig, code: &str) -> Result<TokenResponse> {
        let request = self.token_request(client, code)?;
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| CaptionError::Exchange(format!("token endpoint unreachable: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CaptionError::Exchange(format!("failed to read token response: {e}")))?;
        debug!(status = %status, "Token endpoint responded");

        parse_token_response(status.as_u16(), &body)
    }
}

/// Interpret a token endpoint reply.
fn parse_token_response(status: u16, body: &str) -> Result<TokenResponse> {
    if !(200..300).contains(&status) {
        let detail = match serde_json::from_str::<TokenErrorResponse>(body) {
            Ok(err) => match err.error_description {
                Some(desc) => format!("{} ({desc})", err.error),
                None => err.error,
            },
            Err(_) => body.trim().to_string(),
        };
        return Err(CaptionError::Exchange(format!("HTTP {status}: {detail}")));
    }

    let token: TokenResponse = serde_json::from_str(body)
        .map_err(|e| CaptionError::Exchange(format!("malformed token response: {e}")))?;
    if token.access_token.is_empty() {
        return Err(CaptionError::Exchange("token response has no access_token".into()));
    }
    Ok(token)
}

/// Nonce tying an authorization URL to its code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationState {
    nonce: String,
}

impl AuthorizationState {
    fn generate() -> Self {
        Self {
            nonce: Uuid::new_v4().simple().to_string(),
        }
    }

    #[must_use]
    pub fn nonce(&self) -> &str {
        &self.nonce
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    NotStarted,
    AwaitingCode { state: AuthorizationState, url: String },
    Completed,
}

/// Coarse view of the negotiation progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationStatus {
    NotStarted,
    AwaitingCode,
    Completed,
}

/// Drives one authorization-code grant to completion.
#[derive(Debug)]
pub struct AuthorizationNegotiator {
    client: OAuthClientConfig,
    phase: Phase,
}

impl AuthorizationNegotiator {
    #[must_use]
    pub fn new(client: OAuthClientConfig) -> Self {
        Self {
            client,
            phase: Phase::NotStarted,
        }
    }

    #[must_use]
    pub fn status(&self) -> NegotiationStatus {
        match self.phase {
            Phase::NotStarted => NegotiationStatus::NotStarted,
            Phase::AwaitingCode { .. } => NegotiationStatus::AwaitingCode,
            Phase::Completed => NegotiationStatus::Completed,
        }
    }

    /// Build the authorization URL and start waiting for a code.
    ///
    /// Repeated calls while waiting return the same URL.
    pub fn begin(&mut self) -> Result<String> {
        match &self.phase {
            Phase::AwaitingCode { url, .. } => return Ok(url.clone()),
            Phase::Completed => {
                return Err(CaptionError::config("authorization already completed"));
            }
            Phase::NotStarted => {}
        }

        self.client.validate()?;
        let state = AuthorizationState::generate();
        let url = authorization_url(&self.client, &state)?;
        info!("Authorization URL issued");

        self.phase = Phase::AwaitingCode {
            state,
            url: url.clone(),
        };
        Ok(url)
    }

    /// Exchange a user-supplied code for tokens and hand them to `store`.
    ///
    /// `input` may be the bare code or the full redirect URL the browser
    /// landed on; in the latter case its `state` must match the issued one.
    pub async fn exchange(
        &mut self,
        input: &str,
        exchanger: &dyn TokenExchanger,
        store: &mut CredentialStore,
    ) -> Result<()> {
        let expected = match &self.phase {
            Phase::NotStarted => {
                return Err(CaptionError::config(
                    "no authorization URL has been issued yet",
                ));
            }
            Phase::Completed => {
                return Err(CaptionError::config("authorization already completed"));
            }
            Phase::AwaitingCode { state, .. } => state.clone(),
        };

        let code = extract_code(input, &expected)?;
        let token = match exchanger.exchange_code(&self.client, &code).await {
            Ok(token) => token,
            Err(e) => {
                warn!("Authorization code exchange failed");
                return Err(e);
            }
        };

        let scopes = token.scope.as_deref().map_or_else(
            || self.client.scopes.clone(),
            |s| s.split_whitespace().map(str::to_string).collect(),
        );
        let bundle = OAuthBundle {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            token_type: token.token_type.unwrap_or_else(|| "Bearer".to_string()),
            token_uri: self.client.token_uri.clone(),
            client_id: self.client.client_id.clone(),
            client_secret: self.client.client_secret.clone(),
            scopes,
            obtained_at: Utc::now(),
        };

        store.set_oauth_bundle(bundle)?;
        self.phase = Phase::Completed;
        info!("Authorization completed");
        Ok(())
    }
}

fn authorization_url(client: &OAuthClientConfig, state: &AuthorizationState) -> Result<String> {
    let mut url = Url::parse(&client.auth_uri).map_err(|e| {
        CaptionError::config(format!("invalid auth_uri '{}': {e}", client.auth_uri))
    })?;

    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &client.client_id)
        .append_pair("redirect_uri", &client.redirect_uri)
        .append_pair("scope", &client.scopes.join(" "))
        .append_pair("state", state.nonce())
        .append_pair("access_type", "offline")
        .append_pair("include_granted_scopes", "true");

    Ok(url.into())
}

fn extract_code(input: &str, expected: &AuthorizationState) -> Result<String> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CaptionError::input("authorization code is empty"));
    }

    let Ok(redirect) = Url::parse(input) else {
        return Ok(input.to_string());
    };
    if !matches!(redirect.scheme(), "http" | "https") {
        return Ok(input.to_string());
    }

    let mut code = None;
    let mut state = None;
    for (key, value) in redirect.query_pairs() {
        match &*key {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => {
                return Err(CaptionError::Exchange(format!("authorization denied: {value}")));
            }
            _ => {}
        }
    }

    if state.as_deref() != Some(expected.nonce()) {
        return Err(CaptionError::Exchange(
            "redirect state does not match the issued authorization request".into(),
        ));
    }
    code.filter(|c| !c.is_empty())
        .ok_or_else(|| CaptionError::input("redirect URL carries no code"))
}
