//! HTTP request layer: headers, authentication, classification and retry.
//!
//! Every GET goes through [`HttpLayer::get`]:
//!
//! - public endpoints send the application's `client_id`, private endpoints
//!   add the bearer token from the [`TokenStore`]
//! - a private endpoint gets at most one token refresh per request: either
//!   before sending (token about to expire) or after a 401, then one retry
//! - 429, 5xx and network failures are retried with exponential backoff
//! - any other 4xx is returned as a client error without retry

use super::endpoint::Endpoint;
use crate::auth::{Credential, TokenStore};
use crate::config::FibConfig;
use crate::error::ApiError;
use crate::retry::{log_retry, sleep_or_cancel, RetryConfig, Retryable};
use reqwest::header::{HeaderMap, ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION, RETRY_AFTER};
use reqwest::Url;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct HttpLayer {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    language: String,
    retry: RetryConfig,
    tokens: Arc<TokenStore>,
}

impl HttpLayer {
    pub fn new(config: &FibConfig, tokens: Arc<TokenStore>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Config(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            client_id: config.client_id.clone(),
            language: config.language.clone(),
            retry: config.retry.clone(),
            tokens,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// Absolute URL of an endpoint's first page.
    pub fn url_for(&self, endpoint: &Endpoint) -> String {
        format!("{}/{}", self.base_url, endpoint.path)
    }

    /// Reject URLs that point away from the API host. `next` links are
    /// followed with the same credentials as the first page.
    pub fn check_same_origin(&self, url: &str) -> Result<(), ApiError> {
        let parse = |u: &str| {
            Url::parse(u).map_err(|e| ApiError::InvalidResponse(format!("bad URL {}: {}", u, e)))
        };
        let base = parse(&self.base_url)?;
        let target = parse(url)?;
        if base.origin() == target.origin() {
            Ok(())
        } else {
            Err(ApiError::InvalidResponse(format!(
                "next link leaves the API host: {}",
                url
            )))
        }
    }

    /// GET `url` on behalf of `endpoint` and return the parsed JSON body.
    pub async fn get(
        &self,
        endpoint: &Endpoint,
        url: &str,
        query: &[(String, String)],
        cancel: &CancellationToken,
    ) -> Result<Value, ApiError> {
        let mut attempt = 0;
        let mut refreshed = false;

        loop {
            if cancel.is_cancelled() {
                return Err(ApiError::Cancelled);
            }

            let credential = if endpoint.is_private() {
                let (credential, did_refresh) = self.valid_credential(cancel).await?;
                // A refresh before sending uses up the request's one refresh.
                refreshed |= did_refresh;
                Some(credential)
            } else {
                None
            };

            match self.send(url, query, credential.as_ref(), cancel).await {
                Ok(body) => return Ok(body),
                Err(ApiError::Authentication(msg)) if !refreshed => {
                    let Some(used) = credential else {
                        // Public endpoint: the client id itself was rejected.
                        return Err(ApiError::Authentication(msg));
                    };
                    refreshed = true;
                    debug!("{} answered 401, refreshing token once", endpoint.resource);
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                        result = self.tokens.refresh(&used) => { result?; }
                    }
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.delay_with_hint(attempt, e.retry_after());
                    log_retry(attempt, self.retry.max_retries, &delay, &e);
                    if !sleep_or_cancel(delay, cancel).await {
                        return Err(ApiError::Cancelled);
                    }
                }
                Err(e) => {
                    if e.is_retryable() {
                        warn!(
                            "{} still failing after {} retries: {}",
                            endpoint.resource, attempt, e
                        );
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn valid_credential(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(Credential, bool), ApiError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(ApiError::Cancelled),
            result = self.tokens.get_valid_credential_tracked() => result,
        }
    }

    /// One HTTP round trip, classified.
    async fn send(
        &self,
        url: &str,
        query: &[(String, String)],
        credential: Option<&Credential>,
        cancel: &CancellationToken,
    ) -> Result<Value, ApiError> {
        let mut request = self
            .http
            .get(url)
            .header("client_id", &self.client_id)
            .header(ACCEPT, "application/json")
            .header(ACCEPT_LANGUAGE, &self.language);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(credential) = credential {
            request = request.header(AUTHORIZATION, credential.authorization_header());
        }

        debug!("GET {}", url);
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ApiError::Cancelled),
            response = request.send() => response.map_err(ApiError::from_reqwest)?,
        };

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let body = tokio::select! {
            _ = cancel.cancelled() => return Err(ApiError::Cancelled),
            body = response.text() => body,
        };

        if !status.is_success() {
            return Err(ApiError::from_status(
                status.as_u16(),
                &body.unwrap_or_default(),
                retry_after,
            ));
        }

        let body = body.map_err(ApiError::from_reqwest)?;
        serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", url, e)))
    }
}

/// `Retry-After` as delta-seconds or an HTTP date.
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = chrono::DateTime::parse_from_rfc2822(raw).ok()?;
    (at.with_timezone(&chrono::Utc) - chrono::Utc::now())
        .to_std()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(7)));
    }

    #[test]
    fn retry_after_in_the_past_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after(&headers), None);
        assert_eq!(parse_retry_after(&HeaderMap::new()), None);
    }

    #[test]
    fn next_links_must_stay_on_the_api_host() {
        let config = FibConfig::new("id")
            .with_base_url("https://api.example.edu/v2")
            .without_token_file();
        let layer = HttpLayer::new(&config, Arc::new(TokenStore::anonymous())).unwrap();
        assert!(layer
            .check_same_origin("https://api.example.edu/v2/aules/?page=2")
            .is_ok());
        assert!(layer
            .check_same_origin("https://evil.example.com/v2/aules/?page=2")
            .is_err());
    }
}
