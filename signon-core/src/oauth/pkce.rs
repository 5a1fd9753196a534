//! Authorization Code flow with PKCE over a loopback redirect.
//!
//! # Flow Overview
//!
//! 1. Generate PKCE code verifier and challenge
//! 2. Build authorization URL with state, challenge and optional `prompt`
//! 3. Bind the loopback listener named by the redirect URI
//! 4. Present the URL to the user
//! 5. Receive the authorization code on the listener and check the state
//! 6. Exchange the code for tokens using the PKCE verifier

use chrono::{DateTime, Utc};
use oauth2::reqwest::async_http_client;
use oauth2::{AuthorizationCode, CsrfToken, PkceCodeChallenge, PkceCodeVerifier, Scope, TokenResponse};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::{Host, Url};

use super::{create_oauth_client, IdTokenClient, IdTokenResponse, UrlPresenter};
use crate::error::ProviderError;
use crate::presentation::RootController;
use crate::store::Secret;

/// How long to wait for the browser to come back before giving up.
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// Everything needed to run one authorization.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub auth_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: Option<Secret>,
    /// Must name a loopback host and port.
    pub redirect_uri: Url,
    pub scopes: Vec<String>,
    /// Value of the `prompt` parameter, e.g. `select_account`.
    pub prompt: Option<String>,
}

/// Tokens issued by a successful exchange.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: Secret,
    pub id_token: Option<Secret>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: Vec<String>,
}

impl TokenGrant {
    fn from_response(response: IdTokenResponse) -> Self {
        let expires_at = response
            .expires_in()
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| Utc::now() + d);
        let scopes = response
            .scopes()
            .map(|s| s.iter().map(|scope| scope.to_string()).collect())
            .unwrap_or_default();

        Self {
            access_token: Secret::new(response.access_token().secret().as_str()),
            id_token: response.extra_fields().id_token.clone().map(Secret::new),
            expires_at,
            scopes,
        }
    }
}

/// Parameters received on the redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Parse the request target of a redirect, e.g. `/callback?code=..&state=..`.
    ///
    /// Returns `None` when the path differs from `expected_path` or the query
    /// carries neither a code nor an error.
    pub fn parse(target: &str, expected_path: &str) -> Option<Self> {
        let url = Url::parse("http://localhost").ok()?.join(target).ok()?;
        if url.path() != expected_path {
            return None;
        }

        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                "error_description" => params.error_description = Some(value.into_owned()),
                _ => {}
            }
        }

        if params.code.is_none() && params.error.is_none() {
            return None;
        }
        Some(params)
    }

    /// Validate against the expected CSRF state and return the code.
    pub fn into_code(self, expected_state: &str) -> Result<String, ProviderError> {
        if let Some(error) = self.error {
            if error == "access_denied" {
                return Err(ProviderError::Cancelled);
            }
            let detail = self.error_description.unwrap_or_default();
            return Err(ProviderError::failed(format!(
                "authorization server returned {}: {}",
                error, detail
            )));
        }

        if self.state.as_deref() != Some(expected_state) {
            return Err(ProviderError::failed("state parameter mismatch"));
        }

        self.code
            .ok_or_else(|| ProviderError::failed("callback carried no authorization code"))
    }
}

/// Runs the loopback PKCE flow, presenting through a [`UrlPresenter`].
#[derive(Clone)]
pub struct LoopbackFlow {
    presenter: Arc<dyn UrlPresenter>,
    callback_timeout: Duration,
}

impl LoopbackFlow {
    pub fn new(presenter: Arc<dyn UrlPresenter>) -> Self {
        Self {
            presenter,
            callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
        }
    }

    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = timeout;
        self
    }

    /// Run one authorization and token exchange.
    pub async fn run(
        &self,
        request: &AuthorizationRequest,
        presenting: &RootController,
    ) -> Result<TokenGrant, ProviderError> {
        let client = create_oauth_client(request)?;
        let (url, csrf_state, verifier) = build_authorization_url(&client, request);

        // Bind before presenting so a fast browser cannot race the listener.
        let listener = bind_loopback(&request.redirect_uri).await?;

        tracing::info!(%presenting, "presenting authorization URL");
        self.presenter.present(&url, presenting)?;

        let code = tokio::time::timeout(
            self.callback_timeout,
            listen_for_callback(&listener, request.redirect_uri.path(), csrf_state.secret()),
        )
        .await
        .map_err(|_| ProviderError::failed("timed out waiting for the authorization callback"))??;

        exchange_code(&client, code, verifier).await
    }
}

impl std::fmt::Debug for LoopbackFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackFlow")
            .field("callback_timeout", &self.callback_timeout)
            .finish_non_exhaustive()
    }
}

fn build_authorization_url(
    client: &IdTokenClient,
    request: &AuthorizationRequest,
) -> (Url, CsrfToken, PkceCodeVerifier) {
    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

    let mut auth_request = client
        .authorize_url(CsrfToken::new_random)
        .set_pkce_challenge(pkce_challenge);

    for scope in &request.scopes {
        auth_request = auth_request.add_scope(Scope::new(scope.clone()));
    }
    if let Some(prompt) = &request.prompt {
        auth_request = auth_request.add_extra_param("prompt", prompt.as_str());
    }

    let (url, csrf_state) = auth_request.url();
    (url, csrf_state, pkce_verifier)
}

/// Socket address the redirect URI points at. Only loopback hosts are accepted.
pub fn loopback_addr(redirect_uri: &Url) -> Result<SocketAddr, ProviderError> {
    let ip = match redirect_uri.host() {
        Some(Host::Domain("localhost")) => IpAddr::V4(Ipv4Addr::LOCALHOST),
        Some(Host::Ipv4(ip)) if ip.is_loopback() => IpAddr::V4(ip),
        Some(Host::Ipv6(ip)) if ip.is_loopback() => IpAddr::V6(ip),
        _ => {
            return Err(ProviderError::failed(format!(
                "redirect URI {} is not a loopback address",
                redirect_uri
            )));
        }
    };
    let port = redirect_uri
        .port_or_known_default()
        .ok_or_else(|| ProviderError::failed(format!("redirect URI {} has no port", redirect_uri)))?;

    Ok(SocketAddr::new(ip, port))
}

async fn bind_loopback(redirect_uri: &Url) -> Result<TcpListener, ProviderError> {
    let addr = loopback_addr(redirect_uri)?;
    TcpListener::bind(addr)
        .await
        .map_err(|e| ProviderError::failed(format!("failed to bind to {}: {}", addr, e)))
}

async fn listen_for_callback(
    listener: &TcpListener,
    expected_path: &str,
    expected_state: &str,
) -> Result<String, ProviderError> {
    tracing::info!("listening for OAuth callback on {:?}", listener.local_addr().ok());

    loop {
        let (mut socket, _) = listener
            .accept()
            .await
            .map_err(|e| ProviderError::failed(format!("failed to accept connection: {}", e)))?;

        let mut buffer = [0; 4096];
        let n = socket
            .read(&mut buffer)
            .await
            .map_err(|e| ProviderError::failed(format!("failed to read request: {}", e)))?;

        let request = String::from_utf8_lossy(&buffer[..n]);
        let params = request
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|target| CallbackParams::parse(target, expected_path));

        let Some(params) = params else {
            let _ = socket.write_all(&page("404 Not Found", "Not Found")).await;
            continue;
        };

        let outcome = params.into_code(expected_state);
        let body = match &outcome {
            Ok(_) => page("200 OK", "Signed in. You can close this window."),
            Err(ProviderError::Cancelled) => page("200 OK", "Sign-in was cancelled."),
            Err(_) => page("200 OK", "Sign-in failed."),
        };
        let _ = socket.write_all(&body).await;

        return outcome;
    }
}

fn page(status: &str, message: &str) -> Vec<u8> {
    let body = format!("<html><body><h1>{}</h1></body></html>", message);
    format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    )
    .into_bytes()
}

async fn exchange_code(
    client: &IdTokenClient,
    code: String,
    verifier: PkceCodeVerifier,
) -> Result<TokenGrant, ProviderError> {
    let response = client
        .exchange_code(AuthorizationCode::new(code))
        .set_pkce_verifier(verifier)
        .request_async(async_http_client)
        .await
        .map_err(|e| ProviderError::failed(format!("token exchange failed: {}", e)))?;

    tracing::debug!("authorization code exchanged");
    Ok(TokenGrant::from_response(response))
}
