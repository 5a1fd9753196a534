//! Microsoft (Outlook) sign-in.
//!
//! Two stages:
//!
//! 1. Interactive token acquisition against the Microsoft identity platform.
//!    Preconditions are checked fail-fast: presentation surface, root
//!    controller, authority URL, authority, public client application. Any
//!    setup failure is a non-retryable `Configuration` error. The account
//!    picker is shown on every attempt (`Prompt::SelectAccount`).
//! 2. Profile enrichment via Microsoft Graph. The user is already
//!    authenticated at this point, so a failed lookup degrades the result
//!    (no email, no display name) instead of failing the sign-in.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::adapter::SignInAdapter;
use crate::config::OutlookConfig;
use crate::error::{AuthError, ProviderError};
use crate::model::{AuthResult, ProviderKind};
use crate::presentation::{PresentationContext, RootController};
use crate::profile::{GraphProfileFetcher, ProfileFetcher};
use crate::store::Secret;

/// Validated Microsoft identity platform authority, e.g.
/// `https://login.microsoftonline.com/common`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authority {
    url: Url,
    tenant: String,
}

impl Authority {
    /// Build an authority from a parsed URL.
    ///
    /// The URL must use `https`, name a host, and have the tenant
    /// (`common`, `organizations`, a tenant id, ...) as its first path segment.
    pub fn new(url: Url) -> Result<Self, String> {
        if url.scheme() != "https" {
            return Err(format!("authority must use https, got {}", url.scheme()));
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err("authority has no host".to_string());
        }
        let tenant = url
            .path_segments()
            .and_then(|mut segments| segments.next())
            .filter(|segment| !segment.is_empty())
            .ok_or_else(|| "authority has no tenant segment".to_string())?
            .to_string();

        Ok(Self { url, tenant })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// OAuth 2.0 v2 authorization endpoint of this authority.
    pub fn authorize_endpoint(&self) -> String {
        format!("{}/oauth2/v2.0/authorize", self.url.as_str().trim_end_matches('/'))
    }

    /// OAuth 2.0 v2 token endpoint of this authority.
    pub fn token_endpoint(&self) -> String {
        format!("{}/oauth2/v2.0/token", self.url.as_str().trim_end_matches('/'))
    }
}

/// A public (non-confidential) client registration ready for token requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicClientApplication {
    client_id: String,
    redirect_uri: Url,
    authority: Authority,
}

impl PublicClientApplication {
    pub fn new(client_id: &str, redirect_uri: &str, authority: Authority) -> Result<Self, String> {
        let client_id = client_id.trim();
        if client_id.is_empty() {
            return Err("client id is empty".to_string());
        }
        let redirect_uri =
            Url::parse(redirect_uri).map_err(|e| format!("invalid redirect URI: {}", e))?;

        Ok(Self {
            client_id: client_id.to_string(),
            redirect_uri,
            authority,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }
}

/// Account-selection behavior of an interactive request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// Always show the account picker.
    SelectAccount,
}

impl Prompt {
    pub fn as_str(&self) -> &'static str {
        match self {
            Prompt::SelectAccount => "select_account",
        }
    }
}

/// Parameters of one interactive token request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractiveTokenRequest {
    pub application: PublicClientApplication,
    pub scopes: Vec<String>,
    pub prompt: Prompt,
}

/// The account a token was issued for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MicrosoftAccount {
    /// Stable home-account identifier (`<oid>.<tid>`).
    pub identifier: Option<String>,
    pub username: Option<String>,
}

/// Successful interactive acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAcquisition {
    pub account: MicrosoftAccount,
    pub access_token: Secret,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Microsoft identity platform client integration.
#[async_trait]
pub trait InteractiveTokenClient: Send + Sync {
    /// Acquire a token interactively, presenting from `presenting`.
    ///
    /// `Ok(None)` means the flow finished with neither result nor error.
    async fn acquire_token(
        &self,
        request: &InteractiveTokenRequest,
        presenting: &RootController,
    ) -> Result<Option<TokenAcquisition>, ProviderError>;
}

/// Outlook-shaped sign-in result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlookSignIn {
    pub user_id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub access_token: Secret,
}

impl From<OutlookSignIn> for AuthResult {
    fn from(outlook: OutlookSignIn) -> Self {
        AuthResult::new(ProviderKind::Outlook, outlook.user_id)
            .with_email(outlook.email)
            .with_display_name(outlook.full_name)
            .with_access_token(Some(outlook.access_token))
    }
}

fn configuration_error(message: String) -> AuthError {
    AuthError::Configuration {
        provider: ProviderKind::Outlook,
        message,
    }
}

/// Adapter for Microsoft (Outlook) sign-in.
pub struct OutlookAdapter {
    config: OutlookConfig,
    client: Arc<dyn InteractiveTokenClient>,
    profile: Arc<dyn ProfileFetcher>,
}

impl OutlookAdapter {
    pub fn new(
        config: OutlookConfig,
        client: Arc<dyn InteractiveTokenClient>,
        profile: Arc<dyn ProfileFetcher>,
    ) -> Self {
        Self {
            config,
            client,
            profile,
        }
    }

    /// Adapter that enriches results from the configured Graph endpoint.
    pub fn with_graph_profile(
        config: OutlookConfig,
        client: Arc<dyn InteractiveTokenClient>,
    ) -> Result<Self, AuthError> {
        let fetcher = GraphProfileFetcher::new(
            &config.profile_url,
            Duration::from_secs(config.profile_timeout_secs),
        )
        .map_err(|e| configuration_error(e.to_string()))?;

        Ok(Self::new(config, client, Arc::new(fetcher)))
    }

    pub fn config(&self) -> &OutlookConfig {
        &self.config
    }

    /// Build the token request from configuration.
    fn token_request(&self) -> Result<InteractiveTokenRequest, AuthError> {
        let authority_url = Url::parse(&self.config.authority)
            .map_err(|e| configuration_error(format!("invalid authority URL: {}", e)))?;
        let authority = Authority::new(authority_url)
            .map_err(|e| configuration_error(format!("failed to create authority: {}", e)))?;
        let application = PublicClientApplication::new(
            &self.config.client_id,
            &self.config.redirect_uri,
            authority,
        )
        .map_err(|e| configuration_error(format!("failed to create application: {}", e)))?;

        Ok(InteractiveTokenRequest {
            application,
            scopes: self.config.scopes.clone(),
            prompt: Prompt::SelectAccount,
        })
    }

    /// Run one Outlook sign-in attempt.
    pub async fn sign_in(
        &self,
        presentation: Option<&PresentationContext>,
    ) -> Result<OutlookSignIn, AuthError> {
        let presentation = presentation.ok_or(AuthError::MissingPresentationSurface {
            provider: ProviderKind::Outlook,
        })?;
        let root = presentation
            .root_controller()
            .ok_or(AuthError::MissingRootController {
                provider: ProviderKind::Outlook,
            })?;

        let request = self.token_request()?;

        tracing::debug!(
            client_id = request.application.client_id(),
            redirect_uri = %request.application.redirect_uri(),
            authority = %request.application.authority().url(),
            "starting interactive Microsoft token acquisition"
        );

        let acquisition = self
            .client
            .acquire_token(&request, root)
            .await
            .map_err(|e| AuthError::from_provider(ProviderKind::Outlook, e))?
            .ok_or(AuthError::NoResultReturned {
                provider: ProviderKind::Outlook,
            })?;

        let user_id = acquisition.account.identifier.unwrap_or_default();
        let access_token = acquisition.access_token;

        match self.profile.fetch_profile(&access_token).await {
            Ok(profile) => {
                tracing::info!("Outlook sign-in completed");
                Ok(OutlookSignIn {
                    user_id,
                    email: profile.email().map(str::to_string),
                    full_name: profile.display_name,
                    access_token,
                })
            }
            Err(e) => {
                tracing::warn!("Graph profile lookup failed, continuing without profile: {}", e);
                Ok(OutlookSignIn {
                    user_id,
                    email: None,
                    full_name: None,
                    access_token,
                })
            }
        }
    }
}

impl fmt::Debug for OutlookAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutlookAdapter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SignInAdapter for OutlookAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Outlook
    }

    async fn authenticate(
        &self,
        presentation: Option<&PresentationContext>,
    ) -> Result<AuthResult, AuthError> {
        self.sign_in(presentation).await.map(AuthResult::from)
    }
}
