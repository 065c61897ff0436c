//! Pooled client for calling remote dispatchers.
//!
//! [`PoolManager`] keeps one [`Pool`] of reusable connections per destination
//! address, and [`Caller`] issues calls through them under a deadline. The
//! transport is abstracted behind [`Dialer`] and [`Connection`]; [`TcpDialer`]
//! is the production implementation.

mod caller;
mod config;
mod connection;
mod error;
mod manager;
mod pool;

pub use caller::Caller;
pub use config::{ClientConfig, PoolConfig};
pub use connection::{Connection, Dialer, TcpConnection, TcpDialer};
pub use error::ClientError;
pub use manager::PoolManager;
pub use pool::{Lease, Pool, PoolStats};

#[cfg(test)]
pub(crate) mod test_support;
#[cfg(test)]
mod tests;
