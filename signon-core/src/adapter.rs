//! Adapter seam and registry.
//!
//! This module provides:
//! - [`SignInAdapter`] - One identity provider's flow behind a uniform interface
//! - [`AdapterRegistry`] - The adapters whose integrations are actually configured
//!
//! An adapter is registered only when its backing integration is available.
//! Looking up a provider that was never registered is how
//! `ProviderNotConfigured` arises, for every provider alike.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

use crate::error::AuthError;
use crate::model::{AuthResult, ProviderKind};
use crate::presentation::PresentationContext;

/// One identity provider's sign-in flow.
#[async_trait]
pub trait SignInAdapter: Send + Sync {
    /// Provider this adapter drives.
    fn kind(&self) -> ProviderKind;

    /// Whether the orchestrator must supply a presentation context.
    ///
    /// Adapters that resolve their own anchor (Apple) return `false`.
    fn requires_presentation(&self) -> bool {
        true
    }

    /// Run one sign-in attempt and normalize its outcome.
    async fn authenticate(
        &self,
        presentation: Option<&PresentationContext>,
    ) -> Result<AuthResult, AuthError>;

    /// Offer a URL the application was opened with.
    ///
    /// Returns `true` if the adapter consumed it.
    fn handle_redirect(&self, _url: &Url) -> bool {
        false
    }
}

/// Registry of configured adapters, keyed by provider.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<ProviderKind, Arc<dyn SignInAdapter>>,
}

impl AdapterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own kind.
    ///
    /// If an adapter for the same provider exists, it is replaced.
    pub fn register(&mut self, adapter: Arc<dyn SignInAdapter>) {
        let kind = adapter.kind();
        if self.adapters.insert(kind, adapter).is_some() {
            tracing::debug!(provider = %kind, "replaced registered adapter");
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, adapter: Arc<dyn SignInAdapter>) -> Self {
        self.register(adapter);
        self
    }

    /// Get the adapter for a provider, if configured.
    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn SignInAdapter>> {
        self.adapters.get(&kind).cloned()
    }

    /// Check if a provider is configured.
    pub fn contains(&self, kind: ProviderKind) -> bool {
        self.adapters.contains_key(&kind)
    }

    /// Configured providers, in [`ProviderKind::ALL`] order.
    pub fn kinds(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.adapters.contains_key(kind))
            .collect()
    }

    /// Remove a provider's adapter.
    pub fn remove(&mut self, kind: ProviderKind) -> Option<Arc<dyn SignInAdapter>> {
        self.adapters.remove(&kind)
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub(crate) fn adapters(&self) -> impl Iterator<Item = &Arc<dyn SignInAdapter>> {
        self.adapters.values()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("providers", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(ProviderKind);

    #[async_trait]
    impl SignInAdapter for Fixed {
        fn kind(&self) -> ProviderKind {
            self.0
        }

        async fn authenticate(
            &self,
            _presentation: Option<&PresentationContext>,
        ) -> Result<AuthResult, AuthError> {
            Ok(AuthResult::new(self.0, "fixed"))
        }
    }

    #[test]
    fn test_registry_new_is_empty() {
        let registry = AdapterRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.kinds().is_empty());
    }

    #[test]
    fn test_registry_register_and_get() {
        let registry = AdapterRegistry::new()
            .with(Arc::new(Fixed(ProviderKind::Outlook)))
            .with(Arc::new(Fixed(ProviderKind::Apple)));

        assert!(registry.contains(ProviderKind::Outlook));
        assert!(!registry.contains(ProviderKind::Google));
        assert_eq!(
            registry.get(ProviderKind::Apple).map(|a| a.kind()),
            Some(ProviderKind::Apple)
        );
        assert_eq!(registry.kinds(), vec![ProviderKind::Apple, ProviderKind::Outlook]);
    }

    #[test]
    fn test_registry_replace_and_remove() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(Fixed(ProviderKind::Google)));
        registry.register(Arc::new(Fixed(ProviderKind::Google)));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(ProviderKind::Google).is_some());
        assert!(registry.remove(ProviderKind::Google).is_none());
    }
}
