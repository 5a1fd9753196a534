//! Orchestrator dispatch and completion delivery.

mod common;

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use common::{FailingStore, FakeApple, GatedAdapter, foreground_windows, result_for};
use signon_core::apple::AppleIdCredential;
use signon_core::{
    APPLE_USER_IDENTIFIER_KEY, AdapterRegistry, AppleAdapter, AuthError, AuthErrorKind,
    AuthOrchestrator, AuthResult, MainQueue, MainQueueReceiver, MemoryStore, PresentationContext,
    PresentationResolver, ProviderKind, SecretStore, SignInAdapter, StaticWindowState,
};

type Log = Arc<Mutex<Vec<String>>>;

fn resolver() -> PresentationResolver {
    PresentationResolver::new(Arc::new(foreground_windows()))
}

fn queued(registry: AdapterRegistry) -> (AuthOrchestrator, MainQueueReceiver) {
    let (queue, receiver) = MainQueue::new();
    let orchestrator = AuthOrchestrator::new(registry, resolver()).with_executor(Arc::new(queue));
    (orchestrator, receiver)
}

fn begin(orchestrator: &AuthOrchestrator, kind: ProviderKind, label: &str, log: &Log) {
    let ok_log = Arc::clone(log);
    let err_log = Arc::clone(log);
    let ok_label = label.to_string();
    let err_label = label.to_string();

    orchestrator.begin_sign_in(
        kind,
        move |result| ok_log.lock().push(format!("{}:ok:{}", ok_label, result.user_id())),
        move |error| err_log.lock().push(format!("{}:err:{:?}", err_label, error.kind())),
    );
}

async fn next_job(receiver: &mut MainQueueReceiver) -> bool {
    tokio::time::timeout(Duration::from_secs(5), receiver.run_next())
        .await
        .unwrap_or(false)
}

async fn no_job_within(receiver: &mut MainQueueReceiver, wait: Duration) -> bool {
    tokio::time::timeout(wait, receiver.run_next()).await.is_err()
}

#[tokio::test]
async fn test_sign_in_supplies_presentation() {
    let google = GatedAdapter::new(ProviderKind::Google);
    let gate = google.gate();
    gate.send(Ok(result_for(ProviderKind::Google, "g-1"))).unwrap();

    let orchestrator =
        AuthOrchestrator::new(AdapterRegistry::new().with(google.clone()), resolver());

    let result = orchestrator.sign_in(ProviderKind::Google).await.unwrap();
    assert_eq!(result.user_id(), "g-1");
    assert_eq!(google.saw_presentation(), vec![true]);
}

#[tokio::test]
async fn test_no_windows_reaches_adapter_without_context() {
    let google = GatedAdapter::new(ProviderKind::Google);
    google
        .gate()
        .send(Err(AuthError::MissingPresentationSurface {
            provider: ProviderKind::Google,
        }))
        .unwrap();

    let orchestrator = AuthOrchestrator::new(
        AdapterRegistry::new().with(google.clone()),
        PresentationResolver::new(Arc::new(StaticWindowState::empty())),
    );

    let err = orchestrator.sign_in(ProviderKind::Google).await.unwrap_err();
    assert_eq!(err.kind(), AuthErrorKind::MissingPresentationSurface);
    assert_eq!(google.saw_presentation(), vec![false]);
}

#[tokio::test]
async fn test_unconfigured_provider_never_reaches_other_adapters() {
    let google = GatedAdapter::new(ProviderKind::Google);
    let (orchestrator, mut receiver) = queued(AdapterRegistry::new().with(google.clone()));
    let log: Log = Arc::default();

    begin(&orchestrator, ProviderKind::Email, "email", &log);
    assert!(log.lock().is_empty(), "handlers must run on the UI queue");

    assert_eq!(receiver.run_pending(), 1);
    assert_eq!(*log.lock(), vec!["email:err:ProviderNotConfigured"]);
    assert_eq!(google.calls(), 0);
    assert!(orchestrator.in_flight().is_none());
}

#[tokio::test]
async fn test_success_handler_runs_once_on_ui_queue() {
    let google = GatedAdapter::new(ProviderKind::Google);
    let gate = google.gate();
    let (orchestrator, mut receiver) = queued(AdapterRegistry::new().with(google.clone()));
    let log: Log = Arc::default();

    begin(&orchestrator, ProviderKind::Google, "a", &log);
    assert_eq!(orchestrator.in_flight().map(|(_, kind)| kind), Some(ProviderKind::Google));

    gate.send(Ok(result_for(ProviderKind::Google, "g-1"))).unwrap();
    assert!(next_job(&mut receiver).await);

    assert_eq!(*log.lock(), vec!["a:ok:g-1"]);
    assert!(orchestrator.in_flight().is_none());
    assert!(no_job_within(&mut receiver, Duration::from_millis(50)).await);
}

#[tokio::test]
async fn test_error_is_delivered_unchanged() {
    let google = GatedAdapter::new(ProviderKind::Google);
    let gate = google.gate();
    let (queue, mut receiver) = MainQueue::new();
    let orchestrator = AuthOrchestrator::new(AdapterRegistry::new().with(google), resolver())
        .with_executor(Arc::new(queue));

    let seen: Arc<Mutex<Option<AuthError>>> = Arc::default();
    let sink = Arc::clone(&seen);
    orchestrator.begin_sign_in(
        ProviderKind::Google,
        |_| panic!("unexpected success"),
        move |error| *sink.lock() = Some(error),
    );

    let error = AuthError::ProviderFailure {
        provider: ProviderKind::Google,
        message: "network down".to_string(),
    };
    gate.send(Err(error.clone())).unwrap();
    assert!(next_job(&mut receiver).await);

    assert_eq!(seen.lock().clone(), Some(error));
}

#[tokio::test]
async fn test_superseded_attempt_never_fires_when_it_finishes_last() {
    let google = GatedAdapter::new(ProviderKind::Google);
    let outlook = GatedAdapter::new(ProviderKind::Outlook);
    let first = google.gate();
    let second = outlook.gate();
    let (orchestrator, mut receiver) =
        queued(AdapterRegistry::new().with(google.clone()).with(outlook.clone()));
    let log: Log = Arc::default();

    begin(&orchestrator, ProviderKind::Google, "first", &log);
    begin(&orchestrator, ProviderKind::Outlook, "second", &log);

    second.send(Ok(result_for(ProviderKind::Outlook, "o-1"))).unwrap();
    assert!(next_job(&mut receiver).await);

    first.send(Ok(result_for(ProviderKind::Google, "g-1"))).unwrap();
    assert!(no_job_within(&mut receiver, Duration::from_millis(200)).await);

    assert_eq!(*log.lock(), vec!["second:ok:o-1"]);
    assert_eq!(google.calls(), 1);
    assert_eq!(outlook.calls(), 1);
}

#[tokio::test]
async fn test_superseded_attempt_never_fires_when_it_finishes_first() {
    let google = GatedAdapter::new(ProviderKind::Google);
    let outlook = GatedAdapter::new(ProviderKind::Outlook);
    let first = google.gate();
    let second = outlook.gate();
    let (orchestrator, mut receiver) =
        queued(AdapterRegistry::new().with(google).with(outlook));
    let log: Log = Arc::default();

    begin(&orchestrator, ProviderKind::Google, "first", &log);
    begin(&orchestrator, ProviderKind::Outlook, "second", &log);

    first.send(Ok(result_for(ProviderKind::Google, "g-1"))).unwrap();
    assert!(no_job_within(&mut receiver, Duration::from_millis(200)).await);
    assert!(log.lock().is_empty());

    second
        .send(Err(AuthError::UserCancelled {
            provider: ProviderKind::Outlook,
        }))
        .unwrap();
    assert!(next_job(&mut receiver).await);

    assert_eq!(*log.lock(), vec!["second:err:UserCancelled"]);
}

#[tokio::test]
async fn test_unconfigured_call_clears_superseded_in_flight() {
    let google = GatedAdapter::new(ProviderKind::Google);
    let gate = google.gate();
    let (orchestrator, mut receiver) = queued(AdapterRegistry::new().with(google));
    let log: Log = Arc::default();

    begin(&orchestrator, ProviderKind::Google, "first", &log);
    assert!(orchestrator.in_flight().is_some());

    begin(&orchestrator, ProviderKind::Email, "second", &log);
    assert!(orchestrator.in_flight().is_none());

    assert!(next_job(&mut receiver).await);
    gate.send(Ok(result_for(ProviderKind::Google, "g-1"))).unwrap();
    assert!(no_job_within(&mut receiver, Duration::from_millis(200)).await);

    assert_eq!(*log.lock(), vec!["second:err:ProviderNotConfigured"]);
}

/// Caller-registered adapter with a bug.
struct PanickingAdapter;

#[async_trait]
impl SignInAdapter for PanickingAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Email
    }

    fn requires_presentation(&self) -> bool {
        false
    }

    async fn authenticate(
        &self,
        _presentation: Option<&PresentationContext>,
    ) -> Result<AuthResult, AuthError> {
        panic!("email backend exploded")
    }
}

#[tokio::test]
async fn test_panicking_adapter_still_fires_error_handler() {
    let (orchestrator, mut receiver) =
        queued(AdapterRegistry::new().with(Arc::new(PanickingAdapter)));

    let seen: Arc<Mutex<Option<AuthError>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let attempt = orchestrator.begin_sign_in(
        ProviderKind::Email,
        |_| panic!("unexpected success"),
        move |error| *sink.lock() = Some(error),
    );

    assert!(next_job(&mut receiver).await);

    let error = seen.lock().clone().unwrap();
    assert_eq!(error.kind(), AuthErrorKind::ProviderFailure);
    assert_eq!(error.provider(), ProviderKind::Email);
    assert!(error.to_string().contains("panicked"));
    assert!(!orchestrator.is_pending(attempt));
    assert!(orchestrator.in_flight().is_none());
}

fn apple_credential() -> AppleIdCredential {
    AppleIdCredential {
        user: "000123.apple.user".to_string(),
        email: Some("ada@privaterelay.appleid.com".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_apple_identifier_is_stored_before_delivery() {
    let store = Arc::new(MemoryStore::new());
    let apple = AppleAdapter::new(
        Arc::new(FakeApple {
            credential: apple_credential(),
        }),
        store.clone(),
        resolver(),
    );
    let (orchestrator, mut receiver) = queued(AdapterRegistry::new().with(Arc::new(apple)));

    let observed: Arc<Mutex<Option<String>>> = Arc::default();
    let sink = Arc::clone(&observed);
    let reader = store.clone();
    orchestrator.begin_sign_in(
        ProviderKind::Apple,
        move |result: AuthResult| *sink.lock() = Some(result.user_id().to_string()),
        |e| panic!("unexpected error: {}", e),
    );
    assert!(next_job(&mut receiver).await);

    let stored = reader.get(APPLE_USER_IDENTIFIER_KEY).await.unwrap().unwrap();
    assert_eq!(stored.expose(), "000123.apple.user");
    assert_eq!(observed.lock().as_deref(), Some("000123.apple.user"));
}

#[tokio::test]
async fn test_apple_store_failure_still_signs_in() {
    let apple = AppleAdapter::new(
        Arc::new(FakeApple {
            credential: apple_credential(),
        }),
        Arc::new(FailingStore),
        resolver(),
    );
    let orchestrator = AuthOrchestrator::new(AdapterRegistry::new().with(Arc::new(apple)), resolver());

    let result = orchestrator.sign_in(ProviderKind::Apple).await.unwrap();
    assert_eq!(result.user_id(), "000123.apple.user");
    assert_eq!(result.email(), Some("ada@privaterelay.appleid.com"));
}

struct RedirectAdapter {
    scheme: &'static str,
}

#[async_trait]
impl SignInAdapter for RedirectAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    async fn authenticate(
        &self,
        _presentation: Option<&PresentationContext>,
    ) -> Result<AuthResult, AuthError> {
        Err(AuthError::NoUserReturned {
            provider: ProviderKind::Google,
        })
    }

    fn handle_redirect(&self, url: &Url) -> bool {
        url.scheme() == self.scheme
    }
}

#[test]
fn test_redirects_reach_the_owning_adapter() {
    let registry = AdapterRegistry::new().with(Arc::new(RedirectAdapter {
        scheme: "com.googleusercontent.apps.123",
    }));
    let orchestrator = AuthOrchestrator::new(registry, resolver());

    let ours = Url::parse("com.googleusercontent.apps.123:/oauth2redirect?code=x").unwrap();
    let other = Url::parse("msauth.com.example.app://auth?code=y").unwrap();

    assert!(orchestrator.handle_redirect(&ours));
    assert!(!orchestrator.handle_redirect(&other));
    assert_eq!(orchestrator.configured_providers(), vec![ProviderKind::Google]);
}
