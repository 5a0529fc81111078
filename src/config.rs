//! Client configuration, built in code or read from the environment.

use crate::error::ApiError;
use crate::retry::RetryConfig;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.fib.upc.edu/v2";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8085/callback";
const TOKEN_FILE_NAME: &str = ".fib_token.json";

/// Everything the API client, token store and OAuth flow need.
#[derive(Debug, Clone)]
pub struct FibConfig {
    pub client_id: String,
    /// Required only for the OAuth flow (private endpoints).
    pub client_secret: Option<String>,
    pub base_url: String,
    /// Sent as `Accept-Language`.
    pub language: String,
    pub timeout: Duration,
    /// Where the OAuth credential is persisted. `None` keeps it in memory.
    pub token_path: Option<PathBuf>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub retry: RetryConfig,
    /// Upper bound on pages followed by one `fetch_all`.
    pub max_pages: usize,
    /// Credentials expiring within this margin are refreshed before use.
    pub token_margin: Duration,
}

impl FibConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            base_url: DEFAULT_BASE_URL.into(),
            language: "en".into(),
            timeout: Duration::from_secs(30),
            token_path: default_token_path(),
            redirect_uri: DEFAULT_REDIRECT_URI.into(),
            scopes: vec!["read".into()],
            retry: RetryConfig::default(),
            max_pages: 50,
            token_margin: Duration::from_secs(60),
        }
    }

    /// Read configuration from `FIB_*` environment variables.
    ///
    /// `FIB_CLIENT_ID` is required; everything else falls back to defaults.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ApiError> {
        let client_id = get("FIB_CLIENT_ID")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ApiError::Config("FIB_CLIENT_ID is required".into()))?;

        let mut config = Self::new(client_id);
        config.client_secret = get("FIB_CLIENT_SECRET").filter(|v| !v.is_empty());
        if let Some(url) = get("FIB_API_BASE_URL") {
            config = config.with_base_url(url);
        }
        if let Some(lang) = get("FIB_LANGUAGE") {
            config.language = lang;
        }
        if let Some(path) = get("FIB_TOKEN_FILE") {
            config.token_path = Some(PathBuf::from(path));
        }
        if let Some(uri) = get("FIB_REDIRECT_URI") {
            config.redirect_uri = uri;
        }
        if let Some(secs) = parse_var::<u64>(&get, "FIB_TIMEOUT_SECS")? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(pages) = parse_var::<usize>(&get, "FIB_MAX_PAGES")? {
            config.max_pages = pages.max(1);
        }
        if let Some(retries) = parse_var::<usize>(&get, "FIB_MAX_RETRIES")? {
            config.retry.max_retries = retries;
        }
        if let Some(ms) = parse_var::<u64>(&get, "FIB_RETRY_INITIAL_MS")? {
            config.retry.initial_delay_ms = ms;
        }
        if let Some(secs) = parse_var::<u64>(&get, "FIB_TOKEN_MARGIN_SECS")? {
            config.token_margin = Duration::from_secs(secs);
        }
        Ok(config)
    }

    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = Some(path.into());
        self
    }

    pub fn without_token_file(mut self) -> Self {
        self.token_path = None;
        self
    }

    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = uri.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn with_token_margin(mut self, margin: Duration) -> Self {
        self.token_margin = margin;
        self
    }

    pub fn token_url(&self) -> String {
        format!("{}/o/token/", self.base_url)
    }

    pub fn authorize_url(&self) -> String {
        format!("{}/o/authorize/", self.base_url)
    }
}

fn parse_var<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ApiError> {
    match get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ApiError::Config(format!("{} has an invalid value: {}", key, raw))),
    }
}

fn default_token_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(TOKEN_FILE_NAME))
}
