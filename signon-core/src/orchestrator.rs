//! Entry point for callers that want a user signed in.
//!
//! [`AuthOrchestrator`] picks the adapter for a [`ProviderKind`], supplies a
//! presentation context when the adapter needs one, and hands the outcome
//! back unchanged. Two calling styles are offered:
//!
//! - [`sign_in`](AuthOrchestrator::sign_in): await the outcome directly.
//! - [`begin_sign_in`](AuthOrchestrator::begin_sign_in): register a
//!   success/error handler pair and return immediately. Handlers run on the
//!   UI executor. Starting another attempt supersedes the pending one; the
//!   superseded attempt's handlers never fire.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use url::Url;

use crate::adapter::{AdapterRegistry, SignInAdapter};
use crate::completion::{AttemptId, CompletionHandlers, CompletionSlot};
use crate::error::AuthError;
use crate::model::{AuthResult, ProviderKind};
use crate::presentation::PresentationResolver;
use crate::ui::{InlineExecutor, UiExecutor};

struct InFlight {
    attempt: AttemptId,
    provider: ProviderKind,
    // Keeps the adapter alive until its asynchronous flow completes.
    _adapter: Arc<dyn SignInAdapter>,
}

/// Dispatches sign-in requests to provider adapters.
pub struct AuthOrchestrator {
    registry: AdapterRegistry,
    resolver: PresentationResolver,
    executor: Arc<dyn UiExecutor>,
    slot: Arc<CompletionSlot<AuthResult, AuthError>>,
    in_flight: Arc<Mutex<Option<InFlight>>>,
}

impl AuthOrchestrator {
    /// Create an orchestrator whose handlers run inline.
    pub fn new(registry: AdapterRegistry, resolver: PresentationResolver) -> Self {
        Self {
            registry,
            resolver,
            executor: Arc::new(InlineExecutor),
            slot: Arc::new(CompletionSlot::new()),
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// Run completion handlers on `executor` instead of inline.
    pub fn with_executor(mut self, executor: Arc<dyn UiExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Providers that have a registered adapter.
    pub fn configured_providers(&self) -> Vec<ProviderKind> {
        self.registry.kinds()
    }

    /// The attempt currently running through [`begin_sign_in`](Self::begin_sign_in), if any.
    pub fn in_flight(&self) -> Option<(AttemptId, ProviderKind)> {
        self.in_flight
            .lock()
            .as_ref()
            .map(|f| (f.attempt, f.provider))
    }

    /// Whether `attempt` still has handlers waiting to fire.
    pub fn is_pending(&self, attempt: AttemptId) -> bool {
        self.slot.is_pending(attempt)
    }

    /// Sign in with `kind` and wait for the outcome.
    pub async fn sign_in(&self, kind: ProviderKind) -> Result<AuthResult, AuthError> {
        let adapter = self.adapter_for(kind)?;
        run_attempt(adapter, &self.resolver).await
    }

    /// Start signing in with `kind`; exactly one handler fires when it ends,
    /// unless a later call supersedes this attempt first.
    ///
    /// An unconfigured provider fails without starting any work. Otherwise the
    /// attempt runs on the current Tokio runtime.
    pub fn begin_sign_in<S, E>(&self, kind: ProviderKind, on_success: S, on_error: E) -> AttemptId
    where
        S: FnOnce(AuthResult) + Send + 'static,
        E: FnOnce(AuthError) + Send + 'static,
    {
        let attempt = self
            .slot
            .begin(CompletionHandlers::new(Box::new(on_success), Box::new(on_error)));
        // Any attempt still recorded here has just been superseded.
        self.in_flight.lock().take();

        let adapter = match self.adapter_for(kind) {
            Ok(adapter) => adapter,
            Err(e) => {
                deliver(&self.slot, self.executor.as_ref(), attempt, Err(e));
                return attempt;
            }
        };

        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                let error = AuthError::ProviderFailure {
                    provider: kind,
                    message: format!("no async runtime available: {}", e),
                };
                deliver(&self.slot, self.executor.as_ref(), attempt, Err(error));
                return attempt;
            }
        };

        *self.in_flight.lock() = Some(InFlight {
            attempt,
            provider: kind,
            _adapter: Arc::clone(&adapter),
        });

        let resolver = self.resolver.clone();
        let slot = Arc::clone(&self.slot);
        let executor = Arc::clone(&self.executor);
        let in_flight = Arc::clone(&self.in_flight);

        runtime.spawn(async move {
            // A panicking adapter must still end the attempt.
            let task = tokio::spawn(async move { run_attempt(adapter, &resolver).await });
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(provider = %kind, %attempt, "sign-in task aborted: {}", e);
                    Err(AuthError::ProviderFailure {
                        provider: kind,
                        message: if e.is_panic() {
                            "sign-in task panicked".to_string()
                        } else {
                            "sign-in task was cancelled".to_string()
                        },
                    })
                }
            };

            {
                let mut current = in_flight.lock();
                if current.as_ref().is_some_and(|f| f.attempt == attempt) {
                    *current = None;
                }
            }

            deliver(&slot, executor.as_ref(), attempt, outcome);
        });

        attempt
    }

    /// Offer a URL the application was opened with to every adapter.
    ///
    /// Returns `true` if one of them consumed it.
    pub fn handle_redirect(&self, url: &Url) -> bool {
        let handled = self.registry.adapters().any(|adapter| adapter.handle_redirect(url));
        tracing::debug!(%url, handled, "offered redirect to adapters");
        handled
    }

    fn adapter_for(&self, kind: ProviderKind) -> Result<Arc<dyn SignInAdapter>, AuthError> {
        self.registry
            .get(kind)
            .ok_or_else(|| AuthError::ProviderNotConfigured {
                provider: kind,
                message: format!(
                    "{} sign-in integration is not configured",
                    kind.display_name()
                ),
            })
    }
}

impl std::fmt::Debug for AuthOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthOrchestrator")
            .field("registry", &self.registry)
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

async fn run_attempt(
    adapter: Arc<dyn SignInAdapter>,
    resolver: &PresentationResolver,
) -> Result<AuthResult, AuthError> {
    let provider = adapter.kind();
    let presentation = if adapter.requires_presentation() {
        resolver.resolve().into_context()
    } else {
        None
    };

    tracing::info!(%provider, "starting sign-in");
    let outcome = adapter.authenticate(presentation.as_ref()).await;

    match &outcome {
        Ok(_) => tracing::info!(%provider, "sign-in succeeded"),
        Err(e) => tracing::warn!(%provider, kind = ?e.kind(), "sign-in failed: {}", e),
    }

    outcome
}

fn deliver(
    slot: &CompletionSlot<AuthResult, AuthError>,
    executor: &dyn UiExecutor,
    attempt: AttemptId,
    outcome: Result<AuthResult, AuthError>,
) {
    match slot.take(attempt) {
        Some(handlers) => executor.dispatch(Box::new(move || handlers.fire(outcome))),
        None => tracing::debug!(%attempt, "discarding outcome of superseded sign-in attempt"),
    }
}
