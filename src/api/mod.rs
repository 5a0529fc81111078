//! FIB API access layer.
//!
//! Request flow: [`FibClient`] → [`PageWalker`] → [`HttpLayer`] (bearer token
//! from the [`TokenStore`](crate::auth::TokenStore) for private endpoints) →
//! each [`Page`] mapped into typed records → `next` followed until absent or
//! the page cap → de-duplicated records.

pub mod client;
pub mod endpoint;
pub mod http;
pub mod mapper;
pub mod page;
pub mod pagination;

pub use client::FibClient;
pub use endpoint::{Endpoint, EndpointDef, Visibility};
pub use http::HttpLayer;
pub use mapper::Record;
pub use page::Page;
pub use pagination::{Completeness, Fetched, PageWalker};
