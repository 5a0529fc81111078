//! MCP (Model Context Protocol) server exposing the FIB tools.
//!
//! ```rust,no_run
//! use fibagent::mcp::McpServer;
//! use fibagent::tools::all_tools;
//! use fibagent::{FibClient, FibConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = FibClient::new(&FibConfig::from_env()?)?;
//! McpServer::new(all_tools(&client))
//!     .serve(tokio::io::stdin(), tokio::io::stdout(), &CancellationToken::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod server;
pub mod types;

pub use server::McpServer;
pub use types::{McpError, ServerInfo};
