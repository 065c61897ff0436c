//! Settings for [`Server`](super::Server).

use super::BackoffConfig;
use crate::codec::DEFAULT_MAX_FRAME_LENGTH;

/// Transport settings for a server.
///
/// # Examples
///
/// ```
/// use endrpc::server::ServerConfig;
///
/// let config = ServerConfig::default().max_frame_length(64 * 1024);
/// assert_eq!(config.max_frame_length_value(), 64 * 1024);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    backoff: BackoffConfig,
    max_frame_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }
}

impl ServerConfig {
    /// Configure accept-loop back-off.
    #[must_use]
    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Largest request frame accepted, in bytes. Connections sending a
    /// longer frame are closed.
    #[must_use]
    pub fn max_frame_length(mut self, length: usize) -> Self {
        self.max_frame_length = length;
        self
    }

    /// Configured back-off.
    #[must_use]
    pub const fn backoff_value(&self) -> BackoffConfig { self.backoff }

    /// Configured frame limit.
    #[must_use]
    pub const fn max_frame_length_value(&self) -> usize { self.max_frame_length }
}
