//! JSON POST shared by the HTTP backends.

use super::traits::ProviderError;
use crate::api::http::parse_retry_after;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Send `request`, returning the decoded JSON body of a 2xx response.
/// Non-success statuses are classified into [`ProviderError`] kinds.
pub(crate) async fn post_json(
    request: reqwest::RequestBuilder,
    label: &str,
    cancel: &CancellationToken,
) -> Result<Value, ProviderError> {
    let response = tokio::select! {
        _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
        r = request.send() => r.map_err(ProviderError::from_reqwest)?,
    };

    let status = response.status();
    let retry_after_ms = parse_retry_after(response.headers()).map(|d| d.as_millis() as u64);
    let body = tokio::select! {
        _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
        b = response.text() => b.map_err(ProviderError::from_reqwest)?,
    };

    if !status.is_success() {
        debug!("{} error {}: {}", label, status, body);
        return Err(ProviderError::classify(
            status.as_u16(),
            &format!("{} error {}: {}", label, status, body),
            retry_after_ms,
        ));
    }

    serde_json::from_str(&body)
        .map_err(|e| ProviderError::Api(format!("{} returned invalid JSON: {}", label, e)))
}
