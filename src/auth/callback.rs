//! One-shot local HTTP listener for the OAuth redirect.
//!
//! The browser is sent to the authorize URL; after login the provider
//! redirects to `http://localhost:<port>/callback?code=...&state=...`. The
//! listener serves that route with axum until a usable redirect arrives, the
//! deadline passes or the login is cancelled.

use crate::error::ApiError;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use reqwest::Url;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authorization Complete</title></head>
<body><h1>Authorization successful!</h1><p>You can close this window.</p></body>
</html>"#;

const FAILURE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authorization Failed</title></head>
<body><h1>Authorization failed</h1></body>
</html>"#;

/// Time given to the server to finish answering the browser after the
/// outcome is known.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

pub struct CallbackListener {
    listener: TcpListener,
    path: String,
}

#[derive(Clone)]
struct CallbackState {
    expected_state: Option<String>,
    outcome: mpsc::Sender<Result<String, ApiError>>,
}

impl CallbackListener {
    /// Bind to the host and port of `redirect_uri`.
    pub async fn bind(redirect_uri: &str) -> Result<Self, ApiError> {
        let url = Url::parse(redirect_uri)
            .map_err(|e| ApiError::Config(format!("invalid redirect URI: {}", e)))?;
        let host = url.host_str().unwrap_or("localhost");
        let host = if host == "localhost" { "127.0.0.1" } else { host };
        let port = url.port_or_known_default().unwrap_or(8085);
        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|e| ApiError::Config(format!("cannot listen on {}:{}: {}", host, port, e)))?;
        Ok(Self {
            listener,
            path: url.path().to_string(),
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }

    /// Serve the redirect route and return the authorization code.
    ///
    /// Other paths get a 404. A redirect whose `state` differs from
    /// `expected_state` gets a 400 and is ignored, so the real one can still
    /// arrive. A redirect carrying the right state but no code (the user
    /// denied access) fails the login.
    pub async fn wait_for_code(
        self,
        expected_state: Option<&str>,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, ApiError> {
        let (tx, mut rx) = mpsc::channel(1);
        let state = CallbackState {
            expected_state: expected_state.map(str::to_string),
            outcome: tx,
        };
        let app = Router::new()
            .route(&self.path, get(handle_callback))
            .with_state(state);

        let shutdown = CancellationToken::new();
        let serve = axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown.clone().cancelled_owned());
        let server = tokio::spawn(async move { serve.await });

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(ApiError::Cancelled),
            _ = tokio::time::sleep(timeout) => Err(ApiError::AuthenticationRequired(
                "timed out waiting for the login redirect".into(),
            )),
            received = rx.recv() => received.unwrap_or_else(|| {
                Err(ApiError::Config("OAuth callback server stopped".into()))
            }),
        };

        shutdown.cancel();
        let abort = server.abort_handle();
        match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => error!("OAuth callback server error: {}", e),
            Ok(Err(e)) => debug!("OAuth callback server task ended: {}", e),
            Err(_) => {
                debug!("OAuth callback server still busy, aborting");
                abort.abort();
            }
        }
        outcome
    }
}

async fn handle_callback(
    State(state): State<CallbackState>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Html<&'static str>) {
    if let Some(expected) = &state.expected_state {
        if params.get("state") != Some(expected) {
            warn!("Ignoring OAuth callback with a missing or wrong state");
            return (StatusCode::BAD_REQUEST, Html(FAILURE_PAGE));
        }
    }

    match params.get("code") {
        Some(code) => {
            let _ = state.outcome.try_send(Ok(code.clone()));
            (StatusCode::OK, Html(SUCCESS_PAGE))
        }
        None => {
            let reason = params
                .get("error")
                .cloned()
                .unwrap_or_else(|| "no code in redirect".into());
            let _ = state.outcome.try_send(Err(ApiError::Authentication(format!(
                "login failed: {}",
                reason
            ))));
            (StatusCode::BAD_REQUEST, Html(FAILURE_PAGE))
        }
    }
}
