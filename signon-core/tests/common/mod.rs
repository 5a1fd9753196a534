//! Shared fakes for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::oneshot;

use signon_core::apple::{AppleAuthorization, AppleIdCredential, AppleIdRequest};
use signon_core::outlook::{InteractiveTokenRequest, MicrosoftAccount, TokenAcquisition};
use signon_core::presentation::ActivationState;
use signon_core::{
    AppleIdProvider, AuthError, AuthResult, InteractiveTokenClient, PresentationAnchorProvider,
    PresentationContext, ProviderError, ProviderKind, RootController, Scene, Secret, SecretStore,
    SignInAdapter, StaticWindowState, StoreError, Surface,
};

/// A foreground scene with one key surface that has a root controller.
pub fn foreground_windows() -> StaticWindowState {
    StaticWindowState::new(vec![Scene::new(
        ActivationState::ForegroundActive,
        vec![
            Surface::new("main")
                .with_key(true)
                .with_root_controller(RootController::new("root")),
        ],
    )])
}

/// A presentation context equivalent to [`foreground_windows`].
pub fn presentation() -> PresentationContext {
    PresentationContext::new(
        Surface::new("main")
            .with_key(true)
            .with_root_controller(RootController::new("root")),
    )
}

pub fn result_for(provider: ProviderKind, user_id: &str) -> AuthResult {
    AuthResult::new(provider, user_id)
}

/// Adapter whose attempts complete when the test says so.
///
/// Each call to `authenticate` takes the next queued gate and waits on it.
pub struct GatedAdapter {
    kind: ProviderKind,
    gates: Mutex<VecDeque<oneshot::Receiver<Result<AuthResult, AuthError>>>>,
    calls: AtomicUsize,
    saw_presentation: Mutex<Vec<bool>>,
}

impl GatedAdapter {
    pub fn new(kind: ProviderKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            gates: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            saw_presentation: Mutex::new(Vec::new()),
        })
    }

    /// Queue a gate for the next attempt; send on the returned half to finish it.
    pub fn gate(&self) -> oneshot::Sender<Result<AuthResult, AuthError>> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().push_back(rx);
        tx
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn saw_presentation(&self) -> Vec<bool> {
        self.saw_presentation.lock().clone()
    }
}

#[async_trait]
impl SignInAdapter for GatedAdapter {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn authenticate(
        &self,
        presentation: Option<&PresentationContext>,
    ) -> Result<AuthResult, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.saw_presentation.lock().push(presentation.is_some());

        let gate = self.gates.lock().pop_front();
        match gate {
            Some(rx) => rx.await.unwrap_or_else(|_| {
                Err(AuthError::ProviderFailure {
                    provider: self.kind,
                    message: "gate dropped".to_string(),
                })
            }),
            None => Err(AuthError::ProviderFailure {
                provider: self.kind,
                message: "no gate queued".to_string(),
            }),
        }
    }
}

/// Apple provider returning a fixed credential.
pub struct FakeApple {
    pub credential: AppleIdCredential,
}

#[async_trait]
impl AppleIdProvider for FakeApple {
    async fn perform(
        &self,
        _request: AppleIdRequest,
        _anchors: &dyn PresentationAnchorProvider,
    ) -> Result<AppleAuthorization, ProviderError> {
        Ok(AppleAuthorization::AppleId(self.credential.clone()))
    }
}

/// Store whose writes always fail.
#[derive(Debug, Default)]
pub struct FailingStore;

#[async_trait]
impl SecretStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<Secret>, StoreError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _secret: &Secret) -> Result<(), StoreError> {
        Err(StoreError::BackendError {
            message: "disk full".to_string(),
        })
    }

    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Microsoft token client returning a fixed outcome and recording requests.
pub struct FakeTokenClient {
    outcome: Result<Option<TokenAcquisition>, ProviderError>,
    requests: Mutex<Vec<InteractiveTokenRequest>>,
}

impl FakeTokenClient {
    pub fn returning(outcome: Result<Option<TokenAcquisition>, ProviderError>) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn succeeding(access_token: &str) -> Arc<Self> {
        Self::returning(Ok(Some(TokenAcquisition {
            account: MicrosoftAccount {
                identifier: Some("oid.tid".to_string()),
                username: Some("ada@contoso.com".to_string()),
            },
            access_token: Secret::new(access_token),
            expires_at: None,
        })))
    }

    pub fn requests(&self) -> Vec<InteractiveTokenRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl InteractiveTokenClient for FakeTokenClient {
    async fn acquire_token(
        &self,
        request: &InteractiveTokenRequest,
        _presenting: &RootController,
    ) -> Result<Option<TokenAcquisition>, ProviderError> {
        self.requests.lock().push(request.clone());
        self.outcome.clone()
    }
}
