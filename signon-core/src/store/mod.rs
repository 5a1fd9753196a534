//! Secret storage abstraction.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for sensitive values that prevents accidental logging
//! - [`SecretStore`] - Trait for secret storage backends
//! - [`MemoryStore`] - In-memory implementation for testing
//! - [`KeyringStore`] - OS keyring implementation (with `keyring-store` feature)
//! - [`create_store`] - Helper to select backend based on availability
//!
//! The sign-in flows only ever write through this trait: Apple's user
//! identifier is upserted under [`APPLE_USER_IDENTIFIER_KEY`] so it can be
//! recovered after a restart.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroize;

mod memory;
#[cfg(feature = "keyring-store")]
mod keyring;

pub use memory::MemoryStore;
#[cfg(feature = "keyring-store")]
pub use keyring::KeyringStore;

/// Key under which the last Apple user identifier is kept.
pub const APPLE_USER_IDENTIFIER_KEY: &str = "appleUserIdentifier";

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value,
/// and the buffer is wiped when the secret is dropped.
#[derive(Clone, Serialize, Deserialize)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Consume the secret and return the inner value.
    pub fn into_inner(mut self) -> String {
        std::mem::take(&mut self.0)
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// Error type for secret store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage backend encountered an error.
    #[error("backend error: {message}")]
    BackendError { message: String },

    /// The keyring backend is not available.
    #[error("keyring not available: {message}")]
    KeyringUnavailable { message: String },
}

/// Opaque persistent key-value store for small sensitive strings.
///
/// Writes are single-key upserts; there is no transactional requirement.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Retrieve a secret by key.
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError>;

    /// Store a secret at the given key.
    ///
    /// Overwrites any existing value.
    async fn set(&self, key: &str, secret: &Secret) -> Result<(), StoreError>;

    /// Delete a secret by key.
    ///
    /// Returns `Ok(())` even if the key didn't exist.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Check if a key exists without retrieving the value.
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key).await?.is_some())
    }
}

/// Create a secret store with automatic backend selection.
///
/// - If `prefer_keyring` is `true` and the `keyring-store` feature is enabled,
///   attempts a [`KeyringStore`] under `service_name` and falls back to
///   [`MemoryStore`] with a warning if the keyring is unavailable.
/// - Otherwise returns a [`MemoryStore`].
pub fn create_store(prefer_keyring: bool, service_name: &str) -> Box<dyn SecretStore> {
    #[cfg(feature = "keyring-store")]
    if prefer_keyring {
        match KeyringStore::try_new(service_name) {
            Ok(store) => {
                tracing::info!("Using OS keyring for secret storage");
                return Box::new(store);
            }
            Err(e) => {
                tracing::warn!(
                    "Keyring unavailable ({}), falling back to memory store. \
                     Stored identifiers will not persist across restarts.",
                    e
                );
            }
        }
    }

    #[cfg(not(feature = "keyring-store"))]
    if prefer_keyring {
        tracing::warn!(
            service = service_name,
            "Keyring storage requested but keyring-store feature not enabled. \
             Using memory store."
        );
    }

    tracing::debug!("Using in-memory secret storage");
    Box::new(MemoryStore::new())
}
