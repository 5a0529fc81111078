//! OAuth2 authorization-code client for the FIB token endpoint.

use super::credential::{Credential, TokenResponse};
use crate::config::FibConfig;
use crate::error::ApiError;
use async_trait::async_trait;
use reqwest::Url;
use tracing::debug;

/// The token endpoint operations the token store depends on.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchange a refresh token for a new credential.
    ///
    /// Must return `ApiError::Authentication` when the provider rejects the
    /// refresh token, so the caller can fall back to an interactive login.
    async fn refresh(&self, refresh_token: &str) -> Result<Credential, ApiError>;

    /// Exchange an authorization code for a credential.
    async fn exchange_code(&self, code: &str) -> Result<Credential, ApiError>;
}

/// OAuth2 client using HTTP basic auth with the application's id and secret.
pub struct OAuthClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    authorize_url: String,
    token_url: String,
    redirect_uri: String,
    scopes: Vec<String>,
}

impl OAuthClient {
    pub fn new(config: &FibConfig) -> Result<Self, ApiError> {
        let client_secret = config
            .client_secret
            .clone()
            .ok_or_else(|| ApiError::Config("FIB_CLIENT_SECRET is required for OAuth".into()))?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Config(e.to_string()))?;
        Ok(Self {
            http,
            client_id: config.client_id.clone(),
            client_secret,
            authorize_url: config.authorize_url(),
            token_url: config.token_url(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: config.scopes.clone(),
        })
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// URL the user opens to log in. `state` is echoed back on the redirect.
    pub fn authorization_url(&self, state: &str) -> Result<String, ApiError> {
        let mut url = Url::parse(&self.authorize_url)
            .map_err(|e| ApiError::Config(format!("invalid authorize URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", state);
        Ok(url.to_string())
    }

    async fn post_token(
        &self,
        form: &[(&str, &str)],
        previous_refresh: Option<&str>,
    ) -> Result<Credential, ApiError> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header("accept", "application/json")
            .form(form)
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_token_error(status.as_u16(), &body));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("token response: {}", e)))?;
        Ok(token.into_credential(previous_refresh))
    }
}

/// The token endpoint answers 400 (`invalid_grant`) or 401 when a refresh
/// token or code is revoked, expired or unknown.
fn classify_token_error(status: u16, body: &str) -> ApiError {
    match status {
        400 | 401 | 403 => ApiError::Authentication(format!(
            "token endpoint rejected the grant (HTTP {}): {}",
            status,
            body.trim()
        )),
        _ => ApiError::from_status(status, body, None),
    }
}

#[async_trait]
impl TokenEndpoint for OAuthClient {
    async fn refresh(&self, refresh_token: &str) -> Result<Credential, ApiError> {
        debug!("Refreshing access token at {}", self.token_url);
        self.post_token(
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ],
            Some(refresh_token),
        )
        .await
    }

    async fn exchange_code(&self, code: &str) -> Result<Credential, ApiError> {
        debug!("Exchanging authorization code at {}", self.token_url);
        self.post_token(
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ],
            None,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OAuthClient {
        let config = FibConfig::new("my-app")
            .with_client_secret("secret")
            .with_base_url("https://api.example.edu/v2");
        OAuthClient::new(&config).unwrap()
    }

    #[test]
    fn secret_is_required() {
        let config = FibConfig::new("my-app");
        assert!(matches!(OAuthClient::new(&config), Err(ApiError::Config(_))));
    }

    #[test]
    fn authorization_url_carries_parameters() {
        let url = client().authorization_url("xyz").unwrap();
        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.path(), "/v2/o/authorize/");
        let pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("client_id".into(), "my-app".into())));
        assert!(pairs.contains(&("response_type".into(), "code".into())));
        assert!(pairs.contains(&("scope".into(), "read".into())));
        assert!(pairs.contains(&("state".into(), "xyz".into())));
        assert!(pairs.contains(&(
            "redirect_uri".into(),
            "http://localhost:8085/callback".into()
        )));
    }

    #[test]
    fn rejected_grants_are_authentication_errors() {
        assert!(matches!(
            classify_token_error(400, r#"{"error":"invalid_grant"}"#),
            ApiError::Authentication(_)
        ));
        assert!(matches!(
            classify_token_error(503, ""),
            ApiError::Transient { .. }
        ));
    }
}
