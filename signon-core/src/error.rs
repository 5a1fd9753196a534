//! Error types for signon.
//!
//! - [`AuthError`] - Every way a sign-in attempt can fail, tagged by [`AuthErrorKind`]
//! - [`ProviderError`] - What an injected provider client reports back
//! - [`SignonError`] - Top-level error for configuration and storage plumbing

use thiserror::Error;

use crate::config::ConfigError;
use crate::model::ProviderKind;
use crate::store::StoreError;

/// Machine-distinguishable failure category of an [`AuthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorKind {
    MissingPresentationSurface,
    MissingRootController,
    ProviderNotConfigured,
    ConfigurationError,
    NoResultReturned,
    NoUserReturned,
    ProviderFailure,
    UserCancelled,
}

/// A failed sign-in attempt.
///
/// Every adapter failure is reported through exactly one of these. None of
/// them is fatal; the caller can offer the sign-in option again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No anchor or window was supplied for an interactive flow.
    #[error("{provider}: missing presenting window")]
    MissingPresentationSurface { provider: ProviderKind },

    /// The window has no usable content controller to present from.
    #[error("{provider}: missing root view controller")]
    MissingRootController { provider: ProviderKind },

    /// The provider's client integration is not available.
    #[error("{provider}: provider not configured: {message}")]
    ProviderNotConfigured {
        provider: ProviderKind,
        message: String,
    },

    /// Authority or application setup failed. Not retryable.
    #[error("{provider}: configuration error: {message}")]
    Configuration {
        provider: ProviderKind,
        message: String,
    },

    /// The provider completed with neither a result nor an error.
    #[error("{provider}: no result returned")]
    NoResultReturned { provider: ProviderKind },

    /// The provider succeeded but handed back no account.
    #[error("{provider}: no user returned")]
    NoUserReturned { provider: ProviderKind },

    /// Provider-level failure during the interactive flow or token exchange.
    #[error("{provider}: {message}")]
    ProviderFailure {
        provider: ProviderKind,
        message: String,
    },

    /// The user dismissed the interactive flow.
    #[error("{provider}: sign-in cancelled by user")]
    UserCancelled { provider: ProviderKind },
}

impl AuthError {
    pub fn kind(&self) -> AuthErrorKind {
        match self {
            AuthError::MissingPresentationSurface { .. } => AuthErrorKind::MissingPresentationSurface,
            AuthError::MissingRootController { .. } => AuthErrorKind::MissingRootController,
            AuthError::ProviderNotConfigured { .. } => AuthErrorKind::ProviderNotConfigured,
            AuthError::Configuration { .. } => AuthErrorKind::ConfigurationError,
            AuthError::NoResultReturned { .. } => AuthErrorKind::NoResultReturned,
            AuthError::NoUserReturned { .. } => AuthErrorKind::NoUserReturned,
            AuthError::ProviderFailure { .. } => AuthErrorKind::ProviderFailure,
            AuthError::UserCancelled { .. } => AuthErrorKind::UserCancelled,
        }
    }

    pub fn provider(&self) -> ProviderKind {
        match self {
            AuthError::MissingPresentationSurface { provider }
            | AuthError::MissingRootController { provider }
            | AuthError::ProviderNotConfigured { provider, .. }
            | AuthError::Configuration { provider, .. }
            | AuthError::NoResultReturned { provider }
            | AuthError::NoUserReturned { provider }
            | AuthError::ProviderFailure { provider, .. }
            | AuthError::UserCancelled { provider } => *provider,
        }
    }

    /// Translate a provider client failure for the given provider.
    pub fn from_provider(provider: ProviderKind, error: ProviderError) -> Self {
        match error {
            ProviderError::Cancelled => AuthError::UserCancelled { provider },
            ProviderError::Failed { message } => AuthError::ProviderFailure { provider, message },
        }
    }
}

/// Failure reported by an injected provider client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The user dismissed the provider's interactive UI.
    #[error("cancelled by user")]
    Cancelled,

    /// Anything else the provider reports, passed through verbatim.
    #[error("{message}")]
    Failed { message: String },
}

impl ProviderError {
    pub fn failed(message: impl Into<String>) -> Self {
        ProviderError::Failed {
            message: message.into(),
        }
    }
}

/// Top-level error type for plumbing around the sign-in flows.
#[derive(Debug, Error)]
pub enum SignonError {
    /// Error from secret storage operations.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Error from a sign-in attempt.
    #[error("sign-in error: {0}")]
    Auth(#[from] AuthError),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
