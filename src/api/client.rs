//! Typed FIB API client.

use super::endpoint::{self, Endpoint};
use super::http::HttpLayer;
use super::mapper::Record;
use super::pagination::{Fetched, PageWalker};
use crate::auth::{OAuthClient, TokenEndpoint, TokenStore};
use crate::config::FibConfig;
use crate::error::ApiError;
use crate::models::*;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Shared handle to the FIB API. Cheap to clone.
#[derive(Clone)]
pub struct FibClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: HttpLayer,
    max_pages: usize,
}

impl FibClient {
    /// Build a client and its token store from configuration.
    ///
    /// Without a client secret the OAuth endpoint is not configured: public
    /// endpoints work, private ones need a saved, unexpired credential.
    pub fn new(config: &FibConfig) -> Result<Self, ApiError> {
        let endpoint: Option<Arc<dyn TokenEndpoint>> = match config.client_secret {
            Some(_) => Some(Arc::new(OAuthClient::new(config)?)),
            None => {
                debug!("FIB_CLIENT_SECRET not set, token refresh is disabled");
                None
            }
        };
        let tokens = TokenStore::new(endpoint, config.token_path.clone(), config.token_margin);
        Self::with_token_store(config, Arc::new(tokens))
    }

    /// Build a client around an existing token store.
    pub fn with_token_store(config: &FibConfig, tokens: Arc<TokenStore>) -> Result<Self, ApiError> {
        Ok(Self {
            inner: Arc::new(Inner {
                http: HttpLayer::new(config, tokens)?,
                max_pages: config.max_pages,
            }),
        })
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        self.inner.http.tokens()
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens().is_authenticated()
    }

    pub fn walker(&self) -> PageWalker<'_> {
        PageWalker::new(&self.inner.http, self.inner.max_pages)
    }

    pub async fn fetch_all<T: Record>(
        &self,
        endpoint: &Endpoint,
        filters: &[(String, String)],
        cancel: &CancellationToken,
    ) -> Result<Fetched<T>, ApiError> {
        self.walker().fetch_all(endpoint, filters, cancel).await
    }

    pub async fn fetch_all_best_effort<T: Record>(
        &self,
        endpoint: &Endpoint,
        filters: &[(String, String)],
        cancel: &CancellationToken,
    ) -> Fetched<T> {
        self.walker()
            .fetch_all_best_effort(endpoint, filters, cancel)
            .await
    }

    pub async fn fetch_one<T: Record>(
        &self,
        endpoint: &Endpoint,
        cancel: &CancellationToken,
    ) -> Result<T, ApiError> {
        self.walker().fetch_one(endpoint, cancel).await
    }

    async fn list<T: Record>(
        &self,
        endpoint: endpoint::EndpointDef,
        cancel: &CancellationToken,
    ) -> Result<Vec<T>, ApiError> {
        Ok(self
            .fetch_all(&endpoint.endpoint(), &[], cancel)
            .await?
            .into_records())
    }

    // -- public ------------------------------------------------------------

    pub async fn courses(&self, cancel: &CancellationToken) -> Result<Vec<Course>, ApiError> {
        self.list(endpoint::COURSES, cancel).await
    }

    pub async fn course(&self, code: &str, cancel: &CancellationToken) -> Result<Course, ApiError> {
        self.fetch_one(&Endpoint::course(code)?, cancel).await
    }

    pub async fn exams(&self, cancel: &CancellationToken) -> Result<Vec<Exam>, ApiError> {
        self.list(endpoint::EXAMS, cancel).await
    }

    pub async fn professors(&self, cancel: &CancellationToken) -> Result<Vec<Professor>, ApiError> {
        self.list(endpoint::PROFESSORS, cancel).await
    }

    pub async fn classrooms(&self, cancel: &CancellationToken) -> Result<Vec<Classroom>, ApiError> {
        self.list(endpoint::CLASSROOMS, cancel).await
    }

    pub async fn academic_terms(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<AcademicTerm>, ApiError> {
        self.list(endpoint::ACADEMIC_TERMS, cancel).await
    }

    pub async fn news(&self, cancel: &CancellationToken) -> Result<Vec<NewsItem>, ApiError> {
        self.list(endpoint::NEWS, cancel).await
    }

    // -- private (OAuth) ---------------------------------------------------

    pub async fn my_profile(&self, cancel: &CancellationToken) -> Result<UserProfile, ApiError> {
        self.fetch_one(&endpoint::MY_PROFILE.endpoint(), cancel).await
    }

    pub async fn my_courses(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<UserCourse>, ApiError> {
        self.list(endpoint::MY_COURSES, cancel).await
    }

    pub async fn my_classes(&self, cancel: &CancellationToken) -> Result<Vec<UserClass>, ApiError> {
        self.list(endpoint::MY_CLASSES, cancel).await
    }

    pub async fn my_notices(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<UserNotice>, ApiError> {
        self.list(endpoint::MY_NOTICES, cancel).await
    }
}
