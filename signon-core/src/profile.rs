//! Authenticated profile lookup against Microsoft Graph.
//!
//! The Microsoft token exchange does not return profile data, so the Outlook
//! adapter follows it with `GET /v1.0/me`. Failures here are reported as
//! [`ProfileError`] and absorbed by the adapter.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::store::Secret;

/// Why a profile lookup failed.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("invalid profile URL: {0}")]
    InvalidUrl(String),

    #[error("profile request failed: {0}")]
    Transport(String),

    #[error("profile request returned HTTP {0}")]
    Status(u16),

    #[error("profile response is not JSON: {0}")]
    InvalidJson(String),

    #[error("profile response is not a JSON object")]
    NotAnObject,
}

/// Profile fields read from the Graph `me` resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphProfile {
    pub mail: Option<String>,
    pub user_principal_name: Option<String>,
    pub display_name: Option<String>,
}

impl GraphProfile {
    /// Extract the known string fields from a JSON payload.
    ///
    /// Fields with non-string values are treated as absent.
    pub fn from_json(value: &Value) -> Result<Self, ProfileError> {
        let object = value.as_object().ok_or(ProfileError::NotAnObject)?;
        let field = |name: &str| object.get(name).and_then(Value::as_str).map(str::to_string);

        Ok(Self {
            mail: field("mail"),
            user_principal_name: field("userPrincipalName"),
            display_name: field("displayName"),
        })
    }

    /// Best email address: `mail`, falling back to the user principal name.
    pub fn email(&self) -> Option<&str> {
        self.mail
            .as_deref()
            .or(self.user_principal_name.as_deref())
    }
}

/// Fetches the signed-in user's profile with a bearer token.
#[async_trait]
pub trait ProfileFetcher: Send + Sync {
    async fn fetch_profile(&self, access_token: &Secret) -> Result<GraphProfile, ProfileError>;
}

/// [`ProfileFetcher`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct GraphProfileFetcher {
    http: reqwest::Client,
    endpoint: Url,
}

impl GraphProfileFetcher {
    /// Create a fetcher for `endpoint` with a request timeout.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ProfileError> {
        let endpoint = Url::parse(endpoint).map_err(|e| ProfileError::InvalidUrl(e.to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProfileError::Transport(e.to_string()))?;

        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ProfileFetcher for GraphProfileFetcher {
    async fn fetch_profile(&self, access_token: &Secret) -> Result<GraphProfile, ProfileError> {
        tracing::debug!(endpoint = %self.endpoint, "fetching Graph profile");

        let response = self
            .http
            .get(self.endpoint.clone())
            .header(AUTHORIZATION, format!("Bearer {}", access_token.expose()))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ProfileError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProfileError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ProfileError::Transport(e.to_string()))?;
        let value: Value =
            serde_json::from_slice(&body).map_err(|e| ProfileError::InvalidJson(e.to_string()))?;

        GraphProfile::from_json(&value)
    }
}
