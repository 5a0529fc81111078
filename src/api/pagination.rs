//! Pagination walker: follows `next` links and aggregates typed records.

use super::endpoint::Endpoint;
use super::http::HttpLayer;
use super::mapper::{self, Record};
use super::page::Page;
use crate::error::{ApiError, ValidationError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Whether a walk saw every page.
#[derive(Debug)]
pub enum Completeness {
    Complete,
    /// `next` was still set after `cap` pages.
    PageCapReached { cap: usize },
    /// A page failed in best-effort mode; earlier pages are kept.
    Interrupted { error: ApiError },
}

/// Result of walking a paginated endpoint.
#[derive(Debug)]
pub struct Fetched<T> {
    /// De-duplicated records in page order.
    pub records: Vec<T>,
    /// Raw items dropped by validation.
    pub warnings: Vec<ValidationError>,
    pub pages: usize,
    /// Total reported by the first page, when the endpoint reports one.
    pub count: Option<u64>,
    pub completeness: Completeness,
}

impl<T> Fetched<T> {
    pub fn is_complete(&self) -> bool {
        matches!(self.completeness, Completeness::Complete)
    }

    pub fn into_records(self) -> Vec<T> {
        self.records
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Strict,
    BestEffort,
}

pub struct PageWalker<'a> {
    http: &'a HttpLayer,
    max_pages: usize,
}

impl<'a> PageWalker<'a> {
    pub fn new(http: &'a HttpLayer, max_pages: usize) -> Self {
        Self {
            http,
            max_pages: max_pages.max(1),
        }
    }

    /// Fetch every page of `endpoint`. Any page failure fails the whole call.
    pub async fn fetch_all<T: Record>(
        &self,
        endpoint: &Endpoint,
        filters: &[(String, String)],
        cancel: &CancellationToken,
    ) -> Result<Fetched<T>, ApiError> {
        self.walk(endpoint, filters, Mode::Strict, cancel).await
    }

    /// Like [`fetch_all`](Self::fetch_all), but a failing page ends the walk
    /// and the records gathered so far are returned, marked `Interrupted`.
    pub async fn fetch_all_best_effort<T: Record>(
        &self,
        endpoint: &Endpoint,
        filters: &[(String, String)],
        cancel: &CancellationToken,
    ) -> Fetched<T> {
        match self.walk(endpoint, filters, Mode::BestEffort, cancel).await {
            Ok(fetched) => fetched,
            // walk only fails in strict mode
            Err(error) => Fetched {
                records: Vec::new(),
                warnings: Vec::new(),
                pages: 0,
                count: None,
                completeness: Completeness::Interrupted { error },
            },
        }
    }

    /// Fetch a single record (detail or profile endpoints).
    ///
    /// Unlike list fetches, a record that fails validation is an error.
    pub async fn fetch_one<T: Record>(
        &self,
        endpoint: &Endpoint,
        cancel: &CancellationToken,
    ) -> Result<T, ApiError> {
        let url = self.http.url_for(endpoint);
        let body = self.http.get(endpoint, &url, &[], cancel).await?;
        let page = Page::from_json(body)?;
        let raw = page.items.first().ok_or_else(|| {
            ApiError::InvalidResponse(format!("{} returned no record", endpoint.resource))
        })?;
        Ok(mapper::map::<T>(raw, 0)?)
    }

    async fn walk<T: Record>(
        &self,
        endpoint: &Endpoint,
        filters: &[(String, String)],
        mode: Mode,
        cancel: &CancellationToken,
    ) -> Result<Fetched<T>, ApiError> {
        let mut query = filters.to_vec();
        if let Some(size) = endpoint.page_size {
            query.push(("limit".into(), size.to_string()));
        }

        let mut url = self.http.url_for(endpoint);
        let mut records = Vec::new();
        let mut warnings = Vec::new();
        let mut offset = 0;
        let mut pages = 0;
        let mut count = None;

        let completeness = loop {
            if pages == self.max_pages {
                warn!(
                    "{}: stopped after {} pages, results are truncated",
                    endpoint.resource, self.max_pages
                );
                break Completeness::PageCapReached {
                    cap: self.max_pages,
                };
            }

            // Filters go on the first request only; `next` already carries them.
            let params: &[(String, String)] = if pages == 0 { query.as_slice() } else { &[] };
            let page = match self.fetch_page(endpoint, &url, params, cancel).await {
                Ok(page) => page,
                Err(e) if mode == Mode::BestEffort => {
                    warn!(
                        "{}: page {} failed, returning {} records from earlier pages: {}",
                        endpoint.resource,
                        pages + 1,
                        records.len(),
                        e
                    );
                    break Completeness::Interrupted { error: e };
                }
                Err(e) => return Err(e),
            };
            pages += 1;
            if pages == 1 {
                count = page.count;
            }

            let (mapped, dropped) = mapper::map_page::<T>(&page.items, offset);
            offset += page.items.len();
            debug!(
                "{}: page {} had {} items ({} invalid)",
                endpoint.resource,
                pages,
                page.items.len(),
                dropped.len()
            );
            records.extend(mapped);
            warnings.extend(dropped);

            match page.next {
                Some(next) => {
                    if let Err(e) = self.http.check_same_origin(&next) {
                        if mode == Mode::Strict {
                            return Err(e);
                        }
                        break Completeness::Interrupted { error: e };
                    }
                    url = next;
                }
                None => break Completeness::Complete,
            }
        };

        for warning in &warnings {
            warn!("Skipping record: {}", warning);
        }

        let before = records.len();
        let records = mapper::dedupe(records);
        if records.len() < before {
            debug!(
                "{}: dropped {} duplicate records",
                endpoint.resource,
                before - records.len()
            );
        }

        Ok(Fetched {
            records,
            warnings,
            pages,
            count,
            completeness,
        })
    }

    async fn fetch_page(
        &self,
        endpoint: &Endpoint,
        url: &str,
        params: &[(String, String)],
        cancel: &CancellationToken,
    ) -> Result<Page, ApiError> {
        let body = self.http.get(endpoint, url, params, cancel).await?;
        Page::from_json(body)
    }
}
