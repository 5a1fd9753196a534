//! Google account sign-in.

use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

use crate::adapter::SignInAdapter;
use crate::error::{AuthError, ProviderError};
use crate::model::{AuthResult, ProviderKind};
use crate::presentation::{PresentationContext, RootController};
use crate::store::Secret;

/// Profile sub-object of a Google account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoogleProfile {
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Signed-in Google account as returned by the client.
///
/// A successful sign-in always carries an access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleAccount {
    pub user_id: Option<String>,
    pub id_token: Option<Secret>,
    pub access_token: Secret,
    pub profile: Option<GoogleProfile>,
}

/// Google sign-in client integration.
#[async_trait]
pub trait GoogleSignInClient: Send + Sync {
    /// Run the interactive sign-in, presenting from `presenting`.
    ///
    /// `Ok(None)` means the flow finished without an account.
    async fn sign_in(
        &self,
        presenting: &RootController,
    ) -> Result<Option<GoogleAccount>, ProviderError>;

    /// Offer a URL the application was opened with. Returns `true` if handled.
    fn handle_redirect(&self, _url: &Url) -> bool {
        false
    }
}

/// Google-shaped sign-in result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleSignIn {
    pub user_id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub id_token: Option<Secret>,
    pub access_token: Secret,
}

impl From<GoogleSignIn> for AuthResult {
    fn from(google: GoogleSignIn) -> Self {
        AuthResult::new(ProviderKind::Google, google.user_id)
            .with_email(google.email)
            .with_display_name(google.full_name)
            .with_id_token(google.id_token)
            .with_access_token(Some(google.access_token))
    }
}

/// Adapter for Google sign-in.
pub struct GoogleAdapter {
    client: Arc<dyn GoogleSignInClient>,
}

impl GoogleAdapter {
    pub fn new(client: Arc<dyn GoogleSignInClient>) -> Self {
        Self { client }
    }

    /// Run one Google sign-in attempt.
    ///
    /// Fails before touching the client when there is no surface to present
    /// from, or the surface has no root controller.
    pub async fn sign_in(
        &self,
        presentation: Option<&PresentationContext>,
    ) -> Result<GoogleSignIn, AuthError> {
        let presentation = presentation.ok_or(AuthError::MissingPresentationSurface {
            provider: ProviderKind::Google,
        })?;
        let root = presentation
            .root_controller()
            .ok_or(AuthError::MissingRootController {
                provider: ProviderKind::Google,
            })?;

        tracing::debug!(surface = presentation.surface().id(), "starting Google sign-in");

        let account = self
            .client
            .sign_in(root)
            .await
            .map_err(|e| AuthError::from_provider(ProviderKind::Google, e))?
            .ok_or(AuthError::NoUserReturned {
                provider: ProviderKind::Google,
            })?;

        let profile = account.profile.unwrap_or_default();

        tracing::info!("Google sign-in completed");

        Ok(GoogleSignIn {
            user_id: account.user_id.unwrap_or_default(),
            email: profile.email,
            full_name: profile.name,
            id_token: account.id_token,
            access_token: account.access_token,
        })
    }
}

#[async_trait]
impl SignInAdapter for GoogleAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    async fn authenticate(
        &self,
        presentation: Option<&PresentationContext>,
    ) -> Result<AuthResult, AuthError> {
        self.sign_in(presentation).await.map(AuthResult::from)
    }

    fn handle_redirect(&self, url: &Url) -> bool {
        self.client.handle_redirect(url)
    }
}
