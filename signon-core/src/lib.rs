//! # Signon Core
//!
//! Multi-provider sign-in orchestration.
//!
//! This crate provides:
//! - A provider-neutral result model ([`AuthResult`]) and error taxonomy ([`AuthError`])
//! - Adapters for Sign in with Apple, Google and Microsoft (Outlook)
//! - Presentation-surface resolution for flows that show UI
//! - An [`AuthOrchestrator`] that dispatches by [`ProviderKind`] and delivers
//!   exactly one outcome per attempt
//! - In-memory and (optionally) keyring-based secret storage
//! - Browser-based PKCE clients for Google and Microsoft (`oauth` feature)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use signon_core::{AuthOrchestrator, ProviderKind};
//!
//! async fn sign_in(orchestrator: &AuthOrchestrator) -> Result<(), signon_core::AuthError> {
//!     let result = orchestrator.sign_in(ProviderKind::Google).await?;
//!     println!("signed in as {}", result.user_id());
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod apple;
pub mod completion;
pub mod config;
pub mod error;
pub mod google;
pub mod model;
pub mod orchestrator;
pub mod outlook;
pub mod presentation;
pub mod profile;
pub mod store;
pub mod ui;

#[cfg(feature = "oauth")]
pub mod oauth;

// Re-export commonly used types at crate root
pub use model::{AuthResult, PersonName, ProviderKind, UnknownProvider};

pub use error::{AuthError, AuthErrorKind, ProviderError, SignonError};

pub use store::{
    APPLE_USER_IDENTIFIER_KEY,
    MemoryStore,
    Secret,
    SecretStore,
    StoreError,
    create_store,
};

#[cfg(feature = "keyring-store")]
pub use store::KeyringStore;

pub use presentation::{
    PresentationAnchor,
    PresentationAnchorProvider,
    PresentationContext,
    PresentationResolver,
    RootController,
    Scene,
    StaticWindowState,
    Surface,
    WindowState,
};

pub use adapter::{AdapterRegistry, SignInAdapter};
pub use completion::{AttemptId, CompletionSlot};
pub use ui::{InlineExecutor, MainQueue, MainQueueReceiver, UiExecutor};

pub use apple::{AppleAdapter, AppleIdProvider};
pub use google::{GoogleAdapter, GoogleSignInClient};
pub use outlook::{InteractiveTokenClient, OutlookAdapter};
pub use profile::{GraphProfile, GraphProfileFetcher, ProfileFetcher};

pub use config::{ConfigError, SignonConfig, load_config, load_from_path};

pub use orchestrator::AuthOrchestrator;
