//! Browser-based provider clients.
//!
//! Desktop hosts have no native Google or Microsoft SDK, so this module
//! provides OAuth 2.0 Authorization Code + PKCE clients that present the
//! authorization URL through a [`UrlPresenter`] and receive the redirect on a
//! loopback listener:
//!
//! - [`pkce`] - the shared loopback flow
//! - [`clients`] - [`GoogleLoopbackClient`] and [`MicrosoftLoopbackClient`]
//!
//! # Features
//!
//! This module is only available when the `oauth` feature is enabled.

pub mod clients;
pub mod pkce;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::{
    AuthUrl, ClientId, ClientSecret, ExtraTokenFields, RedirectUrl, StandardRevocableToken,
    StandardTokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ProviderError;
use crate::presentation::RootController;
use crate::store::Secret;

pub use clients::{registry_from_config, GoogleLoopbackClient, MicrosoftLoopbackClient};
pub use pkce::{AuthorizationRequest, LoopbackFlow, TokenGrant};

/// Opens an authorization URL for the user.
///
/// Implementations typically launch the system browser or print the URL.
pub trait UrlPresenter: Send + Sync {
    fn present(&self, url: &Url, presenting: &RootController) -> Result<(), ProviderError>;
}

/// Token endpoint fields beyond the standard set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdTokenFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl ExtraTokenFields for IdTokenFields {}

pub type IdTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;

/// OAuth client whose token responses keep the `id_token` field.
pub type IdTokenClient = oauth2::Client<
    BasicErrorResponse,
    IdTokenResponse,
    BasicTokenType,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
>;

/// Create an OAuth2 client from an authorization request.
pub fn create_oauth_client(request: &AuthorizationRequest) -> Result<IdTokenClient, ProviderError> {
    let auth_url = AuthUrl::new(request.auth_url.clone())
        .map_err(|e| ProviderError::failed(format!("invalid auth URL: {}", e)))?;

    let token_url = TokenUrl::new(request.token_url.clone())
        .map_err(|e| ProviderError::failed(format!("invalid token URL: {}", e)))?;

    let redirect_url = RedirectUrl::new(request.redirect_uri.to_string())
        .map_err(|e| ProviderError::failed(format!("invalid redirect URL: {}", e)))?;

    let client = IdTokenClient::new(
        ClientId::new(request.client_id.clone()),
        request
            .client_secret
            .as_ref()
            .map(|s| ClientSecret::new(s.expose().to_string())),
        auth_url,
        Some(token_url),
    )
    .set_redirect_uri(redirect_url);

    Ok(client)
}

/// Identity claims read from an ID token payload.
///
/// The token comes straight from the token endpoint over TLS, so the
/// signature is not checked here. Callers that forward the token to a backend
/// must verify it there.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IdTokenClaims {
    pub sub: Option<String>,
    /// Microsoft object id.
    pub oid: Option<String>,
    /// Microsoft tenant id.
    pub tid: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub preferred_username: Option<String>,
}

impl IdTokenClaims {
    /// Decode the payload segment of a compact JWT.
    pub fn decode(token: &Secret) -> Result<Self, ProviderError> {
        let payload = token
            .expose()
            .split('.')
            .nth(1)
            .ok_or_else(|| ProviderError::failed("ID token is not a compact JWT"))?;

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| ProviderError::failed(format!("ID token payload is not base64: {}", e)))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| ProviderError::failed(format!("ID token payload is not JSON: {}", e)))
    }
}
