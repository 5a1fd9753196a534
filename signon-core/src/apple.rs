//! Sign in with Apple.
//!
//! The platform credential flow is reached through an injected
//! [`AppleIdProvider`]. The adapter asks for the user's name and email; both
//! are consent-gated and usually withheld after the first authorization, so
//! their absence is normal.
//!
//! On success the user identifier is written to the [`SecretStore`] under
//! [`APPLE_USER_IDENTIFIER_KEY`] before the result is handed back, so it
//! survives a restart even if the caller drops the result.

use async_trait::async_trait;
use std::sync::Arc;

use crate::adapter::SignInAdapter;
use crate::error::{AuthError, ProviderError};
use crate::model::{AuthResult, PersonName, ProviderKind};
use crate::presentation::{
    PresentationAnchor, PresentationAnchorProvider, PresentationContext, PresentationResolver,
};
use crate::store::{APPLE_USER_IDENTIFIER_KEY, Secret, SecretStore};

/// Consent-gated data an Apple ID request may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppleIdScope {
    FullName,
    Email,
}

/// Request handed to the platform credential flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppleIdRequest {
    pub scopes: Vec<AppleIdScope>,
}

impl Default for AppleIdRequest {
    fn default() -> Self {
        Self {
            scopes: vec![AppleIdScope::FullName, AppleIdScope::Email],
        }
    }
}

/// Raw Apple ID credential as the platform returns it.
///
/// The tokens are opaque bytes; they are expected to be UTF-8 text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppleIdCredential {
    pub user: String,
    pub full_name: Option<PersonName>,
    pub email: Option<String>,
    pub identity_token: Option<Vec<u8>>,
    pub authorization_code: Option<Vec<u8>>,
}

/// What the platform authorization completed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppleAuthorization {
    AppleId(AppleIdCredential),
    /// Some other credential type (e.g. a saved password).
    Other { credential_type: String },
}

/// Platform Apple ID credential flow.
#[async_trait]
pub trait AppleIdProvider: Send + Sync {
    /// Run the interactive authorization.
    ///
    /// `anchors` is the delegate the flow asks for its presentation anchor.
    async fn perform(
        &self,
        request: AppleIdRequest,
        anchors: &dyn PresentationAnchorProvider,
    ) -> Result<AppleAuthorization, ProviderError>;
}

/// Apple-shaped sign-in result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppleSignIn {
    pub user_identifier: String,
    pub full_name: Option<PersonName>,
    pub email: Option<String>,
    pub identity_token: Option<Secret>,
    pub authorization_code: Option<Secret>,
}

impl From<AppleSignIn> for AuthResult {
    fn from(apple: AppleSignIn) -> Self {
        let display_name = apple.full_name.as_ref().and_then(PersonName::formatted);
        AuthResult::new(ProviderKind::Apple, apple.user_identifier)
            .with_email(apple.email)
            .with_display_name(display_name)
            .with_identity_token(apple.identity_token)
            .with_authorization_code(apple.authorization_code)
    }
}

/// Decode an opaque token as UTF-8.
///
/// Invalid UTF-8 leaves the field absent rather than failing the sign-in.
fn decode_token(bytes: Option<Vec<u8>>, field: &str) -> Option<Secret> {
    let bytes = bytes?;
    match String::from_utf8(bytes) {
        Ok(text) => Some(Secret::new(text)),
        Err(_) => {
            tracing::debug!(field, "Apple token is not valid UTF-8; leaving it absent");
            None
        }
    }
}

/// Adapter for Sign in with Apple.
pub struct AppleAdapter {
    provider: Arc<dyn AppleIdProvider>,
    store: Arc<dyn SecretStore>,
    resolver: PresentationResolver,
}

impl AppleAdapter {
    pub fn new(
        provider: Arc<dyn AppleIdProvider>,
        store: Arc<dyn SecretStore>,
        resolver: PresentationResolver,
    ) -> Self {
        Self {
            provider,
            store,
            resolver,
        }
    }

    /// Run one Apple sign-in attempt.
    pub async fn sign_in(&self) -> Result<AppleSignIn, AuthError> {
        tracing::debug!("starting Apple ID authorization");

        let authorization = self
            .provider
            .perform(AppleIdRequest::default(), self)
            .await
            .map_err(|e| AuthError::from_provider(ProviderKind::Apple, e))?;

        let credential = match authorization {
            AppleAuthorization::AppleId(credential) => credential,
            AppleAuthorization::Other { credential_type } => {
                return Err(AuthError::ProviderFailure {
                    provider: ProviderKind::Apple,
                    message: format!("unexpected credential type: {}", credential_type),
                });
            }
        };

        let user_identifier = credential.user;
        if let Err(e) = self
            .store
            .set(APPLE_USER_IDENTIFIER_KEY, &Secret::new(user_identifier.clone()))
            .await
        {
            tracing::warn!("failed to persist Apple user identifier: {}", e);
        }

        tracing::info!("Apple sign-in completed");

        Ok(AppleSignIn {
            user_identifier,
            full_name: credential.full_name,
            email: credential.email,
            identity_token: decode_token(credential.identity_token, "identity_token"),
            authorization_code: decode_token(credential.authorization_code, "authorization_code"),
        })
    }
}

impl PresentationAnchorProvider for AppleAdapter {
    fn presentation_anchor(&self) -> PresentationAnchor {
        self.resolver.resolve()
    }
}

#[async_trait]
impl SignInAdapter for AppleAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Apple
    }

    fn requires_presentation(&self) -> bool {
        false
    }

    async fn authenticate(
        &self,
        _presentation: Option<&PresentationContext>,
    ) -> Result<AuthResult, AuthError> {
        self.sign_in().await.map(AuthResult::from)
    }
}
