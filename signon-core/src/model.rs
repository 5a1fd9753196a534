//! Domain model types for signon.
//!
//! This module defines the values every adapter produces:
//! - [`ProviderKind`] - Which identity provider a sign-in goes through
//! - [`PersonName`] - Structured name as handed out by Apple
//! - [`AuthResult`] - The normalized identity envelope returned to callers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::store::Secret;

/// Identity provider a sign-in is routed through.
///
/// # Examples
///
/// ```
/// use signon_core::ProviderKind;
///
/// let kind: ProviderKind = "outlook".parse().unwrap();
/// assert_eq!(kind, ProviderKind::Outlook);
/// assert_eq!(kind.display_name(), "Outlook");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Sign in with Apple.
    Apple,
    /// Google account sign-in.
    Google,
    /// Microsoft identity platform (Outlook / Microsoft Graph).
    Outlook,
    /// Local email/password path.
    Email,
}

impl ProviderKind {
    /// All provider kinds, in the order they are offered to users.
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Apple,
        ProviderKind::Google,
        ProviderKind::Outlook,
        ProviderKind::Email,
    ];

    /// Stable identifier used in configuration and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Apple => "apple",
            ProviderKind::Google => "google",
            ProviderKind::Outlook => "outlook",
            ProviderKind::Email => "email",
        }
    }

    /// Human-readable provider name.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Apple => "Apple",
            ProviderKind::Google => "Google",
            ProviderKind::Outlook => "Outlook",
            ProviderKind::Email => "Email",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown provider name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "apple" => Ok(ProviderKind::Apple),
            "google" => Ok(ProviderKind::Google),
            "outlook" | "microsoft" => Ok(ProviderKind::Outlook),
            "email" => Ok(ProviderKind::Email),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// Structured person name.
///
/// Apple hands this out only on the first authorization for an app; later
/// sign-ins usually carry no name at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonName {
    pub given_name: Option<String>,
    pub middle_name: Option<String>,
    pub family_name: Option<String>,
    pub nickname: Option<String>,
}

impl PersonName {
    /// Flatten into a single display name.
    ///
    /// Joins the given, middle and family parts with spaces. Falls back to
    /// the nickname when none of those are present. Returns `None` when the
    /// name carries no usable part.
    pub fn formatted(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.given_name, &self.middle_name, &self.family_name]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        if !parts.is_empty() {
            return Some(parts.join(" "));
        }

        self.nickname
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
    }
}

/// Normalized identity returned by every adapter.
///
/// Only `user_id` is guaranteed; every other field is best-effort. Values are
/// immutable once built: fields are private and only readable through
/// accessors, and the `with_*` builders consume `self`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    provider: ProviderKind,
    user_id: String,
    email: Option<String>,
    display_name: Option<String>,
    identity_token: Option<Secret>,
    authorization_code: Option<Secret>,
    access_token: Option<Secret>,
    id_token: Option<Secret>,
}

impl AuthResult {
    /// Start a result for the given provider and user.
    pub fn new(provider: ProviderKind, user_id: impl Into<String>) -> Self {
        Self {
            provider,
            user_id: user_id.into(),
            email: None,
            display_name: None,
            identity_token: None,
            authorization_code: None,
            access_token: None,
            id_token: None,
        }
    }

    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }

    pub fn with_display_name(mut self, display_name: Option<String>) -> Self {
        self.display_name = display_name;
        self
    }

    pub fn with_identity_token(mut self, token: Option<Secret>) -> Self {
        self.identity_token = token;
        self
    }

    pub fn with_authorization_code(mut self, code: Option<Secret>) -> Self {
        self.authorization_code = code;
        self
    }

    pub fn with_access_token(mut self, token: Option<Secret>) -> Self {
        self.access_token = token;
        self
    }

    pub fn with_id_token(mut self, token: Option<Secret>) -> Self {
        self.id_token = token;
        self
    }

    /// Provider the identity came from.
    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    /// Provider-scoped unique user identifier.
    ///
    /// May be empty for Google and Outlook when the provider omits it.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Signed identity assertion (Apple only).
    pub fn identity_token(&self) -> Option<&Secret> {
        self.identity_token.as_ref()
    }

    /// One-time exchange code (Apple only).
    pub fn authorization_code(&self) -> Option<&Secret> {
        self.authorization_code.as_ref()
    }

    /// Bearer token for downstream API calls (Google and Outlook).
    pub fn access_token(&self) -> Option<&Secret> {
        self.access_token.as_ref()
    }

    /// OpenID Connect ID token (Google only).
    pub fn id_token(&self) -> Option<&Secret> {
        self.id_token.as_ref()
    }
}
