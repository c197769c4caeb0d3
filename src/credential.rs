//! Session-scoped credential holder.
//!
//! A session owns exactly one [`CredentialStore`]. It starts empty and
//! accepts a single credential, either a static API key installed at
//! startup or an OAuth bundle produced by the authorization flow. There is
//! no refresh, so the stored credential never changes afterwards.

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{CaptionError, Result};

/// Token bundle obtained from an authorization-code exchange.
#[derive(Clone)]
pub struct OAuthBundle {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    pub scopes: Vec<String>,
    pub obtained_at: DateTime<Utc>,
}

// Tokens and the client secret stay out of logs and panic messages.
impl fmt::Debug for OAuthBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthBundle")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("token_type", &self.token_type)
            .field("token_uri", &self.token_uri)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scopes", &self.scopes)
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}

/// The credential used to authenticate caption API calls.
#[derive(Clone, PartialEq)]
pub enum Credential {
    /// Static key sent as the `key` query parameter.
    ApiKey(String),
    /// Delegated credential sent as a bearer token.
    OAuth(OAuthBundle),
}

impl PartialEq for OAuthBundle {
    fn eq(&self, other: &Self) -> bool {
        self.access_token == other.access_token
            && self.refresh_token == other.refresh_token
            && self.client_id == other.client_id
            && self.scopes == other.scopes
    }
}

impl Credential {
    /// Short human-readable name of the credential kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ApiKey(_) => "api key",
            Self::OAuth(_) => "oauth",
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            Self::OAuth(bundle) => f.debug_tuple("OAuth").field(bundle).finish(),
        }
    }
}

/// Holds at most one credential for the lifetime of a session.
#[derive(Debug, Default)]
pub struct CredentialStore {
    active: Option<Credential>,
}

impl CredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The active credential, or `None` before anything was stored.
    #[must_use]
    pub fn active(&self) -> Option<&Credential> {
        self.active.as_ref()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_none()
    }

    pub fn set_api_key(&mut self, key: impl Into<String>) -> Result<()> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(CaptionError::config("API key is empty"));
        }
        self.install(Credential::ApiKey(key))
    }

    pub fn set_oauth_bundle(&mut self, bundle: OAuthBundle) -> Result<()> {
        self.install(Credential::OAuth(bundle))
    }

    fn install(&mut self, credential: Credential) -> Result<()> {
        if let Some(existing) = &self.active {
            return Err(CaptionError::config(format!(
                "session already holds an {} credential",
                existing.kind()
            )));
        }
        debug!(kind = credential.kind(), "Credential installed");
        self.active = Some(credential);
        Ok(())
    }
}
