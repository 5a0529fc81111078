//! Backend registry: maps a [`BackendKind`] to a factory building the
//! concrete [`ModelBackend`] for a [`ModelSpec`].

use super::gemini::GeminiBackend;
use super::local::LocalBackend;
use super::model::{BackendKind, ModelSpec};
use super::traits::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Credentials and endpoints the factories need.
#[derive(Debug, Clone, Default)]
pub struct BackendSettings {
    pub google_api_key: Option<String>,
    /// Override for the Gemini endpoint, mostly for tests.
    pub gemini_base_url: Option<String>,
    pub local_api_key: Option<String>,
    pub timeout: Option<Duration>,
}

impl BackendSettings {
    /// Reads `GOOGLE_API_KEY` (or `GEMINI_API_KEY`), `GEMINI_BASE_URL`,
    /// `LOCAL_MODEL_API_KEY` and `MODEL_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            google_api_key: var("GOOGLE_API_KEY").or_else(|| var("GEMINI_API_KEY")),
            gemini_base_url: var("GEMINI_BASE_URL"),
            local_api_key: var("LOCAL_MODEL_API_KEY"),
            timeout: var("MODEL_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs),
        }
    }
}

type Factory = Box<
    dyn Fn(&ModelSpec, &BackendSettings) -> Result<Arc<dyn ModelBackend>, ProviderError>
        + Send
        + Sync,
>;

/// Registry of backend factories, keyed by backend kind.
pub struct ModelRegistry {
    factories: HashMap<BackendKind, Factory>,
}

impl ModelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a factory for a backend kind, replacing any previous one.
    pub fn register<F>(&mut self, kind: BackendKind, factory: F)
    where
        F: Fn(&ModelSpec, &BackendSettings) -> Result<Arc<dyn ModelBackend>, ProviderError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(kind, Box::new(factory));
    }

    pub fn has(&self, kind: BackendKind) -> bool {
        self.factories.contains_key(&kind)
    }

    pub fn kinds(&self) -> Vec<BackendKind> {
        self.factories.keys().copied().collect()
    }

    /// Build the backend for `spec`.
    pub fn build(
        &self,
        spec: &ModelSpec,
        settings: &BackendSettings,
    ) -> Result<Arc<dyn ModelBackend>, ProviderError> {
        let factory = self.factories.get(&spec.kind()).ok_or_else(|| {
            ProviderError::Other(format!("No backend registered for: {}", spec.kind()))
        })?;
        factory(spec, settings)
    }
}

impl Default for ModelRegistry {
    /// Create a registry with the built-in backends registered.
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(BackendKind::Gemini, build_gemini);
        registry.register(BackendKind::Local, build_local);
        registry
    }
}

fn build_gemini(
    spec: &ModelSpec,
    settings: &BackendSettings,
) -> Result<Arc<dyn ModelBackend>, ProviderError> {
    let key = settings
        .google_api_key
        .clone()
        .ok_or_else(|| ProviderError::Auth("GOOGLE_API_KEY is not set".into()))?;
    let mut backend = GeminiBackend::new(spec.model_name(), key);
    if let Some(url) = &settings.gemini_base_url {
        backend = backend.with_base_url(url.as_str());
    }
    if let Some(timeout) = settings.timeout {
        backend = backend.with_timeout(timeout)?;
    }
    Ok(Arc::new(backend))
}

fn build_local(
    spec: &ModelSpec,
    settings: &BackendSettings,
) -> Result<Arc<dyn ModelBackend>, ProviderError> {
    let ModelSpec::Local { model, base_url } = spec else {
        return Err(ProviderError::Other(format!("Not a local model: {}", spec)));
    };
    let mut backend = LocalBackend::new(model.as_str(), base_url.as_str());
    if let Some(key) = &settings.local_api_key {
        backend = backend.with_api_key(key.as_str());
    }
    if let Some(timeout) = settings.timeout {
        backend = backend.with_timeout(timeout)?;
    }
    Ok(Arc::new(backend))
}
