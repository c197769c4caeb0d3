//! Configuration loaded from `~/.config/capgrab/config.toml`.
//!
//! The file selects the authentication mode. API-key mode needs a single
//! key; OAuth mode needs a client record, given inline or through a Google
//! "client secrets" JSON file. Configuration is read once at startup and
//! anything missing is fatal before the first network call.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{CaptionError, Result};

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8501";
pub const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/youtube.force-ssl";

/// OAuth2 client registration used by the authorization-code grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_uri: String,
    pub token_uri: String,
    pub scopes: Vec<String>,
}

impl OAuthClientConfig {
    /// Check that every field the grant needs is present.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("redirect_uri", &self.redirect_uri),
            ("auth_uri", &self.auth_uri),
            ("token_uri", &self.token_uri),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if !missing.is_empty() {
            return Err(CaptionError::config(format!(
                "OAuth client config is missing {}",
                missing.join(", ")
            )));
        }
        if self.scopes.iter().all(|s| s.trim().is_empty()) {
            return Err(CaptionError::config("OAuth client config requests no scopes"));
        }
        Ok(())
    }
}

/// How caption API calls are authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    ApiKey(String),
    OAuth(OAuthClientConfig),
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub auth: AuthMode,
    pub api_base: String,
}

impl Config {
    /// Configuration for API-key mode with the default API base.
    #[must_use]
    pub fn with_api_key(key: impl Into<String>) -> Self {
        Self {
            auth: AuthMode::ApiKey(key.into()),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Load configuration from `path` (or the default location).
    ///
    /// `api_key` comes from `--api-key` / `CAPGRAB_API_KEY` and, when set,
    /// selects API-key mode without reading any file.
    pub fn load(path: Option<&Path>, api_key: Option<String>) -> Result<Self> {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            debug!("Using API key from command line or environment");
            return Ok(Self::with_api_key(key));
        }

        let path = path.map_or_else(default_config_path, Path::to_path_buf);
        if !path.exists() {
            return Err(CaptionError::config(format!(
                "no configuration found at {}. Create it or pass --api-key",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(&path).map_err(|e| {
            CaptionError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        debug!(path = %path.display(), "Loading configuration");
        Self::from_toml_str(&content, base_dir)
    }

    /// Parse a TOML document. Relative paths resolve against `base_dir`.
    pub fn from_toml_str(content: &str, base_dir: &Path) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)
            .map_err(|e| CaptionError::config(format!("invalid TOML: {e}")))?;
        file.resolve(base_dir)
    }
}

/// Return the default configuration file path.
#[must_use]
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("capgrab")
        .join("config.toml")
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum ModeName {
    ApiKey,
    #[serde(alias = "oauth2")]
    Oauth,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    mode: Option<ModeName>,
    api_key: Option<String>,
    api_base: Option<String>,
    oauth: Option<OAuthSection>,
}

#[derive(Debug, Default, Deserialize)]
struct OAuthSection {
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
    auth_uri: Option<String>,
    token_uri: Option<String>,
    scopes: Option<Vec<String>>,
    client_secrets_file: Option<PathBuf>,
}

/// Google's downloadable client secrets file (`client_secret_*.json`).
#[derive(Debug, Deserialize)]
struct GoogleClientSecrets {
    installed: Option<GoogleClient>,
    web: Option<GoogleClient>,
}

#[derive(Debug, Deserialize)]
struct GoogleClient {
    client_id: String,
    client_secret: String,
    auth_uri: Option<String>,
    token_uri: Option<String>,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

impl ConfigFile {
    fn resolve(self, base_dir: &Path) -> Result<Config> {
        let mode = match self.mode {
            Some(mode) => mode,
            None if self.api_key.is_some() => ModeName::ApiKey,
            None if self.oauth.is_some() => ModeName::Oauth,
            None => {
                return Err(CaptionError::config(
                    "configuration defines neither api_key nor an [oauth] section",
                ))
            }
        };

        let auth = match mode {
            ModeName::ApiKey => {
                let key = self
                    .api_key
                    .filter(|k| !k.trim().is_empty())
                    .ok_or_else(|| CaptionError::config("api_key mode requires api_key"))?;
                AuthMode::ApiKey(key)
            }
            ModeName::Oauth => {
                let section = self
                    .oauth
                    .ok_or_else(|| CaptionError::config("oauth mode requires an [oauth] section"))?;
                let client = section.resolve(base_dir)?;
                client.validate()?;
                AuthMode::OAuth(client)
            }
        };

        Ok(Config {
            auth,
            api_base: self.api_base.unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        })
    }
}

impl OAuthSection {
    fn resolve(self, base_dir: &Path) -> Result<OAuthClientConfig> {
        let google = match &self.client_secrets_file {
            Some(file) => Some(load_client_secrets(&base_dir.join(file))?),
            None => None,
        };

        let from_google = |pick: fn(&GoogleClient) -> Option<String>| google.as_ref().and_then(pick);

        Ok(OAuthClientConfig {
            client_id: self
                .client_id
                .or_else(|| from_google(|g| Some(g.client_id.clone())))
                .unwrap_or_default(),
            client_secret: self
                .client_secret
                .or_else(|| from_google(|g| Some(g.client_secret.clone())))
                .unwrap_or_default(),
            redirect_uri: self
                .redirect_uri
                .or_else(|| from_google(|g| g.redirect_uris.first().cloned()))
                .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
            auth_uri: self
                .auth_uri
                .or_else(|| from_google(|g| g.auth_uri.clone()))
                .unwrap_or_else(|| DEFAULT_AUTH_URI.to_string()),
            token_uri: self
                .token_uri
                .or_else(|| from_google(|g| g.token_uri.clone()))
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            scopes: self.scopes.unwrap_or_else(|| vec![DEFAULT_SCOPE.to_string()]),
        })
    }
}

fn load_client_secrets(path: &Path) -> Result<GoogleClient> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        CaptionError::config(format!("failed to read {}: {e}", path.display()))
    })?;
    parse_client_secrets(&content)
        .map_err(|e| CaptionError::config(format!("{}: {e}", path.display())))
}

fn parse_client_secrets(content: &str) -> std::result::Result<GoogleClient, String> {
    let secrets: GoogleClientSecrets =
        serde_json::from_str(content).map_err(|e| format!("invalid client secrets JSON: {e}"))?;
    secrets
        .installed
        .or(secrets.web)
        .ok_or_else(|| "client secrets JSON has neither \"installed\" nor \"web\"".to_string())
}
