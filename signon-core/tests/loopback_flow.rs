//! Browser-based Google and Microsoft sign-in end to end.
//!
//! The presenter plays the browser: it reads the state out of the
//! authorization URL and calls the loopback redirect. The token endpoint is a
//! wiremock server.

#![cfg(feature = "oauth")]

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use signon_core::config::{GoogleConfig, OutlookConfig};
use signon_core::oauth::{GoogleLoopbackClient, LoopbackFlow, MicrosoftLoopbackClient, UrlPresenter};
use signon_core::presentation::ActivationState;
use signon_core::{
    AdapterRegistry, AuthErrorKind, AuthOrchestrator, GoogleAdapter, PresentationResolver,
    OutlookAdapter, ProviderError, ProviderKind, RootController, Scene, StaticWindowState, Surface,
};

/// Plays the browser by calling the redirect URI with fixed parameters.
struct Browser {
    redirect_query: &'static str,
    seen: Mutex<Option<Url>>,
}

impl UrlPresenter for Browser {
    fn present(&self, url: &Url, _presenting: &RootController) -> Result<(), ProviderError> {
        *self.seen.lock() = Some(url.clone());

        let param = |name: &str| {
            url.query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
                .unwrap_or_default()
        };
        let state = param("state");
        let redirect = param("redirect_uri");
        let callback = format!("{}?{}&state={}", redirect, self.redirect_query, state);

        tokio::spawn(async move {
            let _ = reqwest::get(callback).await;
        });
        Ok(())
    }
}

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn jwt(claims: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.signature", header, payload)
}

fn id_token() -> String {
    jwt(serde_json::json!({
        "sub": "110248495921238986420",
        "email": "ada@gmail.com",
        "name": "Ada Lovelace"
    }))
}

fn browser(redirect_query: &'static str) -> Arc<Browser> {
    Arc::new(Browser {
        redirect_query,
        seen: Mutex::new(None),
    })
}

fn terminal() -> PresentationResolver {
    let windows = StaticWindowState::new(vec![Scene::new(
        ActivationState::ForegroundActive,
        vec![
            Surface::new("terminal")
                .with_key(true)
                .with_root_controller(RootController::new("terminal")),
        ],
    )]);
    PresentationResolver::new(Arc::new(windows))
}

fn outlook_orchestrator(server: &MockServer, browser: Arc<Browser>) -> AuthOrchestrator {
    let config = OutlookConfig::new(
        "client-123",
        format!("http://127.0.0.1:{}/auth", free_port()),
    )
    .with_profile_url(format!("{}/v1.0/me", server.uri()));

    let flow = LoopbackFlow::new(browser).with_callback_timeout(Duration::from_secs(10));
    let client = MicrosoftLoopbackClient::new(flow).with_token_url(format!("{}/token", server.uri()));
    let adapter = OutlookAdapter::with_graph_profile(config, Arc::new(client)).unwrap();

    AuthOrchestrator::new(AdapterRegistry::new().with(Arc::new(adapter)), terminal())
}

fn orchestrator(server: &MockServer, browser: Arc<Browser>) -> AuthOrchestrator {
    let mut config = GoogleConfig::new(
        "1234.apps.googleusercontent.com",
        format!("http://127.0.0.1:{}/oauth2redirect", free_port()),
    );
    config.auth_url = "https://accounts.example.com/o/oauth2/v2/auth".to_string();
    config.token_url = format!("{}/token", server.uri());

    let flow = LoopbackFlow::new(browser).with_callback_timeout(Duration::from_secs(10));
    let client = GoogleLoopbackClient::new(config, flow);
    let registry = AdapterRegistry::new().with(Arc::new(GoogleAdapter::new(Arc::new(client))));

    AuthOrchestrator::new(registry, terminal())
}

#[tokio::test]
async fn test_google_sign_in_through_loopback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=4%2F0Ab"))
        .and(body_string_contains("code_verifier="))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.a0Af",
            "token_type": "Bearer",
            "expires_in": 3599,
            "scope": "openid email profile",
            "id_token": id_token()
        })))
        .expect(1)
        .mount(&server)
        .await;

    let browser = browser("code=4%2F0Ab");
    let orchestrator = orchestrator(&server, browser.clone());

    let result = orchestrator.sign_in(ProviderKind::Google).await.unwrap();
    assert_eq!(result.user_id(), "110248495921238986420");
    assert_eq!(result.email(), Some("ada@gmail.com"));
    assert_eq!(result.display_name(), Some("Ada Lovelace"));
    assert_eq!(result.access_token().map(|t| t.expose()), Some("ya29.a0Af"));
    assert_eq!(result.id_token().map(|t| t.expose()), Some(id_token().as_str()));

    let presented = browser.seen.lock().clone().unwrap();
    let query: Vec<(String, String)> = presented.query_pairs().into_owned().collect();
    assert!(query.contains(&("prompt".to_string(), "select_account".to_string())));
    assert!(query.contains(&("code_challenge_method".to_string(), "S256".to_string())));
}

#[tokio::test]
async fn test_access_denied_is_user_cancelled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = orchestrator(&server, browser("error=access_denied"))
        .sign_in(ProviderKind::Google)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), AuthErrorKind::UserCancelled);
}

#[tokio::test]
async fn test_token_endpoint_error_is_provider_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Bad Request"
        })))
        .mount(&server)
        .await;

    let err = orchestrator(&server, browser("code=stale"))
        .sign_in(ProviderKind::Google)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), AuthErrorKind::ProviderFailure);
    assert!(err.to_string().contains("token exchange failed"));
}

#[tokio::test]
async fn test_opaque_id_token_still_signs_in() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.a0Af",
            "token_type": "Bearer",
            "expires_in": 3599,
            "id_token": "opaque-not-a-jwt"
        })))
        .mount(&server)
        .await;

    let result = orchestrator(&server, browser("code=4%2F0Ab"))
        .sign_in(ProviderKind::Google)
        .await
        .unwrap();
    assert_eq!(result.user_id(), "");
    assert_eq!(result.email(), None);
    assert_eq!(result.access_token().map(|t| t.expose()), Some("ya29.a0Af"));
    assert_eq!(result.id_token().map(|t| t.expose()), Some("opaque-not-a-jwt"));
}

#[tokio::test]
async fn test_outlook_sign_in_through_loopback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("client_id=client-123"))
        .and(body_string_contains("code_verifier="))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "eyJ0eXAi.graph",
            "token_type": "Bearer",
            "expires_in": 3600,
            "scope": "User.Read openid profile",
            "id_token": jwt(serde_json::json!({
                "sub": "AAAAAAAAAAAAAAAAAAAAAIkzqFVrSaSaFHy782bbtaQ",
                "oid": "00000000-0000-0000-66f3-3332eca7ea81",
                "tid": "9188040d-6c67-4c5b-b112-36a304b66dad",
                "preferred_username": "ada@contoso.com"
            }))
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/me"))
        .and(header("authorization", "Bearer eyJ0eXAi.graph"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "displayName": "Ada Lovelace",
            "mail": null,
            "userPrincipalName": "ada@contoso.com"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let browser = browser("code=M.C507_BAY");
    let result = outlook_orchestrator(&server, browser.clone())
        .sign_in(ProviderKind::Outlook)
        .await
        .unwrap();

    assert_eq!(result.provider(), ProviderKind::Outlook);
    assert_eq!(
        result.user_id(),
        "00000000-0000-0000-66f3-3332eca7ea81.9188040d-6c67-4c5b-b112-36a304b66dad"
    );
    assert_eq!(result.email(), Some("ada@contoso.com"));
    assert_eq!(result.display_name(), Some("Ada Lovelace"));
    assert_eq!(result.access_token().map(|t| t.expose()), Some("eyJ0eXAi.graph"));
    assert!(result.id_token().is_none());

    let presented = browser.seen.lock().clone().unwrap();
    assert_eq!(presented.host_str(), Some("login.microsoftonline.com"));
    let query: Vec<(String, String)> = presented.query_pairs().into_owned().collect();
    assert!(query.contains(&("prompt".to_string(), "select_account".to_string())));
}
