//! Deployment configuration.
//!
//! Provider registrations (client identifiers, authorities, redirect URIs,
//! scopes) are deployment data and live in a TOML file rather than in code.
//! A provider section that is absent means that provider is not configured.
//!
//! ```toml
//! log_level = "info"
//!
//! [store]
//! prefer_keyring = true
//!
//! [outlook]
//! client_id = "4c8d9669-0000-0000-0000-000000000000"
//! redirect_uri = "http://localhost:8400/auth"
//!
//! [google]
//! client_id = "1234.apps.googleusercontent.com"
//! redirect_uri = "http://127.0.0.1:8401/oauth2redirect"
//! ```

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::store::Secret;

/// Multi-tenant Microsoft identity platform authority.
pub const DEFAULT_OUTLOOK_AUTHORITY: &str = "https://login.microsoftonline.com/common";

/// Microsoft Graph endpoint for the signed-in user's profile.
pub const DEFAULT_GRAPH_PROFILE_URL: &str = "https://graph.microsoft.com/v1.0/me";

pub const DEFAULT_GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const DEFAULT_GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Error loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignonConfig {
    /// Logging level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub store: StoreConfig,

    pub outlook: Option<OutlookConfig>,

    pub google: Option<GoogleConfig>,

    /// Path to the configuration file that was loaded.
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Default for SignonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            store: StoreConfig::default(),
            outlook: None,
            google: None,
            config_path: PathBuf::new(),
        }
    }
}

/// Secret store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_true")]
    pub prefer_keyring: bool,

    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            prefer_keyring: true,
            service_name: default_service_name(),
        }
    }
}

/// Microsoft identity platform registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlookConfig {
    /// Registered application (client) identifier.
    pub client_id: String,

    /// Redirect endpoint registered for the application.
    pub redirect_uri: String,

    #[serde(default = "default_outlook_authority")]
    pub authority: String,

    #[serde(default = "default_outlook_scopes")]
    pub scopes: Vec<String>,

    #[serde(default = "default_graph_profile_url")]
    pub profile_url: String,

    #[serde(default = "default_profile_timeout_secs")]
    pub profile_timeout_secs: u64,
}

impl OutlookConfig {
    /// Registration with the default authority, scopes and profile endpoint.
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            authority: default_outlook_authority(),
            scopes: default_outlook_scopes(),
            profile_url: default_graph_profile_url(),
            profile_timeout_secs: default_profile_timeout_secs(),
        }
    }

    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into();
        self
    }

    pub fn with_profile_url(mut self, url: impl Into<String>) -> Self {
        self.profile_url = url.into();
        self
    }
}

/// Google OAuth client registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,

    /// Desktop clients are issued a (non-confidential) secret.
    #[serde(default)]
    pub client_secret: Option<Secret>,

    pub redirect_uri: String,

    #[serde(default = "default_google_scopes")]
    pub scopes: Vec<String>,

    #[serde(default = "default_google_auth_url")]
    pub auth_url: String,

    #[serde(default = "default_google_token_url")]
    pub token_url: String,
}

impl GoogleConfig {
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: redirect_uri.into(),
            scopes: default_google_scopes(),
            auth_url: default_google_auth_url(),
            token_url: default_google_token_url(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_service_name() -> String {
    "signon".to_string()
}

fn default_outlook_authority() -> String {
    DEFAULT_OUTLOOK_AUTHORITY.to_string()
}

fn default_outlook_scopes() -> Vec<String> {
    vec![
        "https://graph.microsoft.com/User.Read".to_string(),
        "https://graph.microsoft.com/Mail.Read".to_string(),
    ]
}

fn default_graph_profile_url() -> String {
    DEFAULT_GRAPH_PROFILE_URL.to_string()
}

fn default_profile_timeout_secs() -> u64 {
    10
}

fn default_google_scopes() -> Vec<String> {
    vec!["openid".to_string(), "email".to_string(), "profile".to_string()]
}

fn default_google_auth_url() -> String {
    DEFAULT_GOOGLE_AUTH_URL.to_string()
}

fn default_google_token_url() -> String {
    DEFAULT_GOOGLE_TOKEN_URL.to_string()
}

/// Default location of `signon.toml` in the platform config directory.
pub fn default_config_path() -> PathBuf {
    ProjectDirs::from("dev", "signon", "signon")
        .map(|d| d.config_dir().join("signon.toml"))
        .unwrap_or_else(|| PathBuf::from("signon.toml"))
}

/// Load configuration from the default location, or defaults if absent.
pub fn load_config() -> Result<SignonConfig, ConfigError> {
    load_from_path(default_config_path())
}

/// Load configuration from `path`, or defaults if the file does not exist.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<SignonConfig, ConfigError> {
    let path = path.as_ref();

    let mut config = if path.exists() {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        tracing::debug!("no config at {:?}, using defaults", path);
        SignonConfig::default()
    };

    config.config_path = path.to_path_buf();
    Ok(config)
}
