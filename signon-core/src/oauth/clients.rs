//! Google and Microsoft clients backed by [`LoopbackFlow`].

use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

use super::pkce::{AuthorizationRequest, LoopbackFlow};
use super::{IdTokenClaims, UrlPresenter};
use crate::adapter::AdapterRegistry;
use crate::config::{GoogleConfig, SignonConfig};
use crate::error::{AuthError, ProviderError};
use crate::google::{GoogleAccount, GoogleAdapter, GoogleProfile, GoogleSignInClient};
use crate::model::ProviderKind;
use crate::outlook::{
    InteractiveTokenClient, InteractiveTokenRequest, MicrosoftAccount, OutlookAdapter,
    TokenAcquisition,
};
use crate::presentation::RootController;
use crate::store::Secret;

/// Scopes added to every Microsoft request so the ID token names the account.
const MICROSOFT_IDENTITY_SCOPES: [&str; 2] = ["openid", "profile"];

/// [`GoogleSignInClient`] for hosts without a native Google SDK.
#[derive(Debug, Clone)]
pub struct GoogleLoopbackClient {
    config: GoogleConfig,
    flow: LoopbackFlow,
}

impl GoogleLoopbackClient {
    pub fn new(config: GoogleConfig, flow: LoopbackFlow) -> Self {
        Self { config, flow }
    }

    fn authorization_request(&self) -> Result<AuthorizationRequest, ProviderError> {
        let redirect_uri = Url::parse(&self.config.redirect_uri)
            .map_err(|e| ProviderError::failed(format!("invalid redirect URI: {}", e)))?;

        Ok(AuthorizationRequest {
            auth_url: self.config.auth_url.clone(),
            token_url: self.config.token_url.clone(),
            client_id: self.config.client_id.clone(),
            client_secret: self.config.client_secret.clone(),
            redirect_uri,
            scopes: self.config.scopes.clone(),
            prompt: Some("select_account".to_string()),
        })
    }
}

#[async_trait]
impl GoogleSignInClient for GoogleLoopbackClient {
    async fn sign_in(
        &self,
        presenting: &RootController,
    ) -> Result<Option<GoogleAccount>, ProviderError> {
        let request = self.authorization_request()?;
        let grant = self.flow.run(&request, presenting).await?;

        let claims = claims_or_default(ProviderKind::Google, grant.id_token.as_ref());

        Ok(Some(GoogleAccount {
            user_id: claims.sub,
            id_token: grant.id_token,
            access_token: grant.access_token,
            profile: Some(GoogleProfile {
                email: claims.email,
                name: claims.name,
            }),
        }))
    }
}

/// [`InteractiveTokenClient`] for hosts without a native Microsoft SDK.
#[derive(Debug, Clone)]
pub struct MicrosoftLoopbackClient {
    flow: LoopbackFlow,
    token_url: Option<String>,
}

impl MicrosoftLoopbackClient {
    pub fn new(flow: LoopbackFlow) -> Self {
        Self {
            flow,
            token_url: None,
        }
    }

    /// Exchange codes at `token_url` instead of the authority's token endpoint.
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = Some(token_url.into());
        self
    }

    fn authorization_request(&self, request: &InteractiveTokenRequest) -> AuthorizationRequest {
        let application = &request.application;

        let mut scopes = request.scopes.clone();
        for scope in MICROSOFT_IDENTITY_SCOPES {
            if !scopes.iter().any(|s| s == scope) {
                scopes.push(scope.to_string());
            }
        }

        AuthorizationRequest {
            auth_url: application.authority().authorize_endpoint(),
            token_url: self
                .token_url
                .clone()
                .unwrap_or_else(|| application.authority().token_endpoint()),
            client_id: application.client_id().to_string(),
            client_secret: None,
            redirect_uri: application.redirect_uri().clone(),
            scopes,
            prompt: Some(request.prompt.as_str().to_string()),
        }
    }
}

#[async_trait]
impl InteractiveTokenClient for MicrosoftLoopbackClient {
    async fn acquire_token(
        &self,
        request: &InteractiveTokenRequest,
        presenting: &RootController,
    ) -> Result<Option<TokenAcquisition>, ProviderError> {
        let authorization = self.authorization_request(request);
        let grant = self.flow.run(&authorization, presenting).await?;

        let claims = claims_or_default(ProviderKind::Outlook, grant.id_token.as_ref());

        Ok(Some(TokenAcquisition {
            account: account_from_claims(claims),
            access_token: grant.access_token,
            expires_at: grant.expires_at,
        }))
    }
}

/// Claims of an issued ID token, or none when it cannot be read.
///
/// The tokens were already issued, so an unreadable ID token only costs the
/// account details.
fn claims_or_default(provider: ProviderKind, id_token: Option<&Secret>) -> IdTokenClaims {
    let Some(token) = id_token else {
        return IdTokenClaims::default();
    };

    IdTokenClaims::decode(token).unwrap_or_else(|e| {
        tracing::warn!(%provider, "ignoring unreadable ID token: {}", e);
        IdTokenClaims::default()
    })
}

/// Home-account identifier is `<oid>.<tid>`; `sub` stands in without both.
fn account_from_claims(claims: IdTokenClaims) -> MicrosoftAccount {
    let identifier = match (claims.oid, claims.tid) {
        (Some(oid), Some(tid)) => Some(format!("{}.{}", oid, tid)),
        _ => claims.sub,
    };

    MicrosoftAccount {
        identifier,
        username: claims.preferred_username.or(claims.email),
    }
}

/// Register loopback-backed adapters for every provider section in `config`.
pub fn registry_from_config(
    config: &SignonConfig,
    presenter: Arc<dyn UrlPresenter>,
) -> Result<AdapterRegistry, AuthError> {
    let flow = LoopbackFlow::new(presenter);
    let mut registry = AdapterRegistry::new();

    if let Some(google) = &config.google {
        let client = GoogleLoopbackClient::new(google.clone(), flow.clone());
        registry.register(Arc::new(GoogleAdapter::new(Arc::new(client))));
    }

    if let Some(outlook) = &config.outlook {
        let client = MicrosoftLoopbackClient::new(flow.clone());
        let adapter = OutlookAdapter::with_graph_profile(outlook.clone(), Arc::new(client))?;
        registry.register(Arc::new(adapter));
    }

    tracing::debug!(providers = ?registry.kinds(), "registered loopback adapters");

    if registry.is_empty() {
        tracing::warn!(
            "no provider sections in {:?}; {} and {} are unavailable",
            config.config_path,
            ProviderKind::Google,
            ProviderKind::Outlook
        );
    }

    Ok(registry)
}
