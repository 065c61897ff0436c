//! Utilities for exercising an [`endrpc`] server and client in tests.
//!
//! [`TestServer`] runs a [`Dispatcher`](endrpc::Dispatcher) on an ephemeral
//! local port and [`RawClient`] speaks the frame protocol directly, so tests
//! can send frames the pooled client never would.
//!
//! ```rust,no_run
//! use endrpc::{Caller, client::ClientConfig};
//! use endrpc_testing::{TestServer, greeter};
//!
//! # async fn example() -> std::io::Result<()> {
//! let server = TestServer::start(greeter()).await?;
//! let bytes = Caller::new(ClientConfig::default())
//!     .call_end_api(&server.address(), "hello", "world", Default::default())
//!     .await;
//! server.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod fixtures;
pub mod raw_client;
pub mod server;

pub use fixtures::{greeter, unused_listener};
pub use raw_client::RawClient;
pub use server::TestServer;

/// Result type for integration tests.
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;
