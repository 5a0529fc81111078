pub mod agent;
pub mod agent_loop;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod eval;
pub mod mcp;
pub mod models;
pub mod provider;
pub mod retry;
pub mod sub_agent;
pub mod tools;
pub mod types;

pub use agent::FibAgent;
pub use api::{Completeness, Endpoint, Fetched, FibClient};
pub use auth::{Credential, TokenStore};
pub use config::FibConfig;
pub use error::{ApiError, ValidationError};
pub use eval::{EvalRunner, Question, RunReport};
pub use provider::{ModelBackend, ModelRegistry, ModelSpec};
pub use retry::RetryConfig;
pub use types::*;
