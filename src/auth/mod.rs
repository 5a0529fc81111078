//! OAuth2 credentials for the private (`jo/...`) endpoints.
//!
//! [`TokenStore`] owns the credential and is shared by every request that
//! needs a bearer token. [`OAuthClient`] talks to the token endpoint, and
//! [`login_interactive`] runs the browser-based authorization code flow.

pub mod callback;
pub mod credential;
pub mod oauth;
pub mod store;

pub use callback::CallbackListener;
pub use credential::Credential;
pub use oauth::{OAuthClient, TokenEndpoint};
pub use store::TokenStore;

use crate::error::ApiError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// How long the callback listener waits for the user to finish logging in.
pub const LOGIN_TIMEOUT: Duration = Duration::from_secs(120);

/// Run the authorization code flow and store the resulting credential.
///
/// `open_url` receives the authorize URL; it should show it to the user (or
/// open a browser). The callback listener is bound before the URL is handed
/// out so the redirect cannot arrive early.
pub async fn login_interactive(
    oauth: &OAuthClient,
    store: &TokenStore,
    timeout: Duration,
    cancel: &CancellationToken,
    open_url: impl FnOnce(&str),
) -> Result<Credential, ApiError> {
    let listener = CallbackListener::bind(oauth.redirect_uri()).await?;
    let state = uuid::Uuid::new_v4().simple().to_string();
    let url = oauth.authorization_url(&state)?;
    open_url(&url);

    let code = listener.wait_for_code(Some(&state), timeout, cancel).await?;
    let credential = store.exchange_code(&code).await?;
    info!("Logged in to the FIB API");
    Ok(credential)
}
