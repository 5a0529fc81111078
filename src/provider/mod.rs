//! Language model backends.

pub mod gemini;
mod http;
pub mod local;
pub mod mock;
pub mod model;
pub mod registry;
pub mod traits;

pub use gemini::GeminiBackend;
pub use local::LocalBackend;
pub use mock::{MockBackend, MockResponse};
pub use model::{BackendKind, ModelSpec, DEFAULT_MODEL, GEMINI_MODELS};
pub use registry::{BackendSettings, ModelRegistry};
pub use traits::*;

use crate::retry::{log_retry, sleep_or_cancel, RetryConfig, Retryable};
use tokio_util::sync::CancellationToken;

/// `backend.generate` with rate limits and network failures retried.
pub async fn generate_with_retry(
    backend: &dyn ModelBackend,
    request: GenerateRequest,
    retry: &RetryConfig,
    cancel: &CancellationToken,
) -> Result<ModelResponse, ProviderError> {
    let mut attempt = 0;
    loop {
        match backend.generate(request.clone(), cancel.clone()).await {
            Ok(response) => return Ok(response),
            Err(e) if e.is_retryable() && attempt < retry.max_retries => {
                attempt += 1;
                let delay = retry.delay_with_hint(attempt, e.retry_after());
                log_retry(attempt, retry.max_retries, &delay, &e);
                if !sleep_or_cancel(delay, cancel).await {
                    return Err(ProviderError::Cancelled);
                }
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            initial_delay_ms: 1,
            backoff_multiplier: 1.0,
            max_delay_ms: 5,
        }
    }

    #[tokio::test]
    async fn retries_network_errors_then_succeeds() {
        let backend = MockBackend::new(vec![
            MockResponse::NetworkError("reset".into()),
            MockResponse::Text("ok".into()),
        ]);
        let response = generate_with_retry(
            &backend,
            GenerateRequest::prompt("hi"),
            &fast_retry(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(response.content, "ok");
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let backend = MockBackend::new(vec![
            MockResponse::NetworkError("1".into()),
            MockResponse::NetworkError("2".into()),
            MockResponse::NetworkError("3".into()),
            MockResponse::Text("too late".into()),
        ]);
        let err = generate_with_retry(
            &backend,
            GenerateRequest::prompt("hi"),
            &fast_retry(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProviderError::Network(_)));
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn api_errors_are_final() {
        let backend = MockBackend::new(vec![MockResponse::ApiError("bad request".into())]);
        let err = generate_with_retry(
            &backend,
            GenerateRequest::prompt("hi"),
            &fast_retry(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProviderError::Api(_)));
        assert_eq!(backend.calls(), 1);
    }
}
