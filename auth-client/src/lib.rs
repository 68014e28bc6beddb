//! Client for the identity service
//!
//! Keeps the caller's token pair and transparently recovers from expired
//! access tokens:
//! - [`ApiClient`] retries a request once after a 401
//! - [`RefreshCoordinator`] makes sure concurrent 401s share one refresh
//! - A failed refresh tears the session down; callers must log in again
//!
//! # Examples
//!
//! ```no_run
//! use auth_client::{ApiClient, ClientConfig};
//!
//! # async fn run() -> Result<(), auth_client::ClientError> {
//! let client = ApiClient::new(ClientConfig::new("http://localhost:8080"))?;
//! client.login("alice", "correct-horse").await?;
//! let me = client.get("/api/users/me").await?;
//! assert!(me.status().is_success());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod refresher;
pub mod session;

pub use client::ApiClient;
pub use config::ClientConfig;
pub use coordinator::RefreshCoordinator;
pub use errors::ClientError;
pub use refresher::HttpTokenRefresher;
pub use refresher::RefreshedTokens;
pub use refresher::TokenRefresher;
pub use session::ClientSession;
pub use session::SessionTokens;
