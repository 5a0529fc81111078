//! Token store: owns the current credential and keeps it usable.
//!
//! - Loads the credential from a JSON file at startup (missing or corrupt
//!   file means "not logged in")
//! - Refreshes before use when the token expires within the safety margin
//! - Coalesces concurrent refreshes into a single token endpoint call
//! - Persists every change, and retries a failed write on drop

use super::credential::Credential;
use super::oauth::TokenEndpoint;
use crate::error::ApiError;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct TokenStore {
    endpoint: Option<Arc<dyn TokenEndpoint>>,
    path: Option<PathBuf>,
    current: RwLock<Option<Credential>>,
    /// Serializes refreshes. Held across the token endpoint call.
    refresh_gate: Mutex<()>,
    margin: Duration,
    dirty: AtomicBool,
}

impl TokenStore {
    /// Create a store backed by `path` (or memory only) and load any saved credential.
    pub fn new(
        endpoint: Option<Arc<dyn TokenEndpoint>>,
        path: Option<PathBuf>,
        margin: Duration,
    ) -> Self {
        let initial = path.as_deref().and_then(load);
        if initial.is_some() {
            info!("Loaded saved FIB credential");
        }
        Self {
            endpoint,
            path,
            current: RwLock::new(initial),
            refresh_gate: Mutex::new(()),
            margin,
            dirty: AtomicBool::new(false),
        }
    }

    /// In-memory store without a token endpoint, for public-only use.
    pub fn anonymous() -> Self {
        Self::new(None, None, Duration::from_secs(60))
    }

    pub fn margin(&self) -> Duration {
        self.margin
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Current credential as stored, without any validity check.
    pub fn credential(&self) -> Option<Credential> {
        self.read().clone()
    }

    /// True if a credential is held. It may still need a refresh.
    pub fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }

    /// Return a credential that does not expire within the safety margin,
    /// refreshing it first if necessary.
    pub async fn get_valid_credential(&self) -> Result<Credential, ApiError> {
        self.get_valid_credential_tracked()
            .await
            .map(|(credential, _)| credential)
    }

    /// [`get_valid_credential`](Self::get_valid_credential), also telling
    /// whether a refresh was needed to produce the credential.
    pub async fn get_valid_credential_tracked(&self) -> Result<(Credential, bool), ApiError> {
        let current = self.credential().ok_or_else(|| {
            ApiError::AuthenticationRequired("no saved credential, log in first".into())
        })?;

        if !current.is_expired(self.margin) {
            return Ok((current, false));
        }

        if !current.can_refresh() {
            return Err(ApiError::AuthenticationRequired(
                "access token expired and no refresh token is available".into(),
            ));
        }

        Ok((self.refresh(&current).await?, true))
    }

    /// Exchange `stale`'s refresh token for a new credential.
    ///
    /// Concurrent callers holding the same stale credential share one
    /// refresh: whoever gets the gate second finds the credential already
    /// replaced and returns it without calling the token endpoint.
    pub async fn refresh(&self, stale: &Credential) -> Result<Credential, ApiError> {
        let _gate = self.refresh_gate.lock().await;

        let current = self.credential().ok_or_else(|| {
            ApiError::AuthenticationRequired("credential was discarded, log in again".into())
        })?;
        if current.access_token != stale.access_token && !current.is_expired(self.margin) {
            debug!("Credential already refreshed by a concurrent request");
            return Ok(current);
        }

        let refresh_token = current.refresh_token.clone().ok_or_else(|| {
            ApiError::AuthenticationRequired("no refresh token is available".into())
        })?;
        let endpoint = self.endpoint.as_ref().ok_or_else(|| {
            ApiError::AuthenticationRequired("OAuth is not configured for this client".into())
        })?;

        match endpoint.refresh(&refresh_token).await {
            Ok(fresh) => {
                self.replace(Some(fresh.clone()));
                info!(
                    "Refreshed FIB access token (expires in {}s)",
                    fresh.seconds_until_expiry()
                );
                Ok(fresh)
            }
            Err(ApiError::Authentication(msg)) => {
                warn!("Refresh token rejected, discarding credential: {}", msg);
                self.replace(None);
                Err(ApiError::Authentication(msg))
            }
            Err(e) => Err(e),
        }
    }

    /// Replace the credential after a login, persisting it.
    pub fn store(&self, credential: Credential) {
        self.replace(Some(credential));
    }

    /// Exchange an authorization code and store the resulting credential.
    pub async fn exchange_code(&self, code: &str) -> Result<Credential, ApiError> {
        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or_else(|| ApiError::Config("OAuth is not configured for this client".into()))?;
        let credential = endpoint.exchange_code(code).await?;
        self.store(credential.clone());
        Ok(credential)
    }

    /// Forget the credential, in memory and on disk.
    pub fn logout(&self) {
        self.replace(None);
        info!("Logged out, credential cleared");
    }

    /// Write the current state to disk.
    pub fn flush(&self) -> Result<(), ApiError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let snapshot = self.credential();
        let result = match &snapshot {
            Some(credential) => save(path, credential),
            None => remove(path),
        };
        self.dirty.store(result.is_err(), Ordering::SeqCst);
        result
    }

    fn replace(&self, credential: Option<Credential>) {
        {
            let mut guard = match self.current.write() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            *guard = credential;
        }
        if let Err(e) = self.flush() {
            warn!("Could not persist credential, will retry on shutdown: {}", e);
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<Credential>> {
        match self.current.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for TokenStore {
    fn drop(&mut self) {
        if self.dirty.load(Ordering::SeqCst) {
            if let Err(e) = self.flush() {
                warn!("Credential could not be saved on shutdown: {}", e);
            }
        }
    }
}

/// Read a credential file. Missing or unreadable files yield `None`.
pub fn load(path: &Path) -> Option<Credential> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("Could not read {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(credential) => Some(credential),
        Err(e) => {
            warn!("Ignoring corrupt credential file {}: {}", path.display(), e);
            None
        }
    }
}

/// Write atomically: temp file in the same directory, then rename.
pub fn save(path: &Path, credential: &Credential) -> Result<(), ApiError> {
    let json = serde_json::to_string_pretty(credential)
        .map_err(|e| ApiError::Storage(e.to_string()))?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| storage_error(dir, e))?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| storage_error(&tmp, e))?;
    restrict_permissions(&tmp);
    std::fs::rename(&tmp, path).map_err(|e| storage_error(path, e))
}

fn remove(path: &Path) -> Result<(), ApiError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(storage_error(path, e)),
    }
}

fn storage_error(path: &Path, e: std::io::Error) -> ApiError {
    ApiError::Storage(format!("{}: {}", path.display(), e))
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
        debug!("Could not restrict permissions on {}: {}", path.display(), e);
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}
