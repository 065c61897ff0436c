//! Configuration for pooled clients.

use std::time::Duration;

use crate::codec::DEFAULT_MAX_FRAME_LENGTH;

/// Idle-connection policy for a single destination [`Pool`](super::Pool).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use endrpc::client::PoolConfig;
///
/// let config = PoolConfig::default()
///     .max_idle(Duration::from_secs(30))
///     .max_idle_per_address(Some(8));
/// assert_eq!(config.max_idle_value(), Duration::from_secs(30));
/// assert_eq!(config.max_idle_per_address_value(), Some(8));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    max_idle: Duration,
    max_idle_per_address: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: Duration::from_secs(5 * 60),
            max_idle_per_address: None,
        }
    }
}

impl PoolConfig {
    /// How long a connection may sit idle before it is closed instead of
    /// reused.
    #[must_use]
    pub fn max_idle(mut self, duration: Duration) -> Self {
        self.max_idle = duration;
        self
    }

    /// Cap the number of idle connections kept for one address. `None`, the
    /// default, keeps every healthy connection that is returned.
    #[must_use]
    pub fn max_idle_per_address(mut self, limit: Option<usize>) -> Self {
        self.max_idle_per_address = limit;
        self
    }

    /// Configured idle lifetime.
    #[must_use]
    pub const fn max_idle_value(&self) -> Duration { self.max_idle }

    /// Configured idle-set cap.
    #[must_use]
    pub const fn max_idle_per_address_value(&self) -> Option<usize> { self.max_idle_per_address }
}

/// Settings shared by [`TcpDialer`](super::TcpDialer) and
/// [`Caller`](super::Caller).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use endrpc::client::ClientConfig;
///
/// let config = ClientConfig::default()
///     .call_timeout(Duration::from_millis(500))
///     .nodelay(false);
/// assert_eq!(config.call_timeout_value(), Duration::from_millis(500));
/// assert!(!config.nodelay_value());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pool: PoolConfig,
    call_timeout: Duration,
    dial_timeout: Duration,
    nodelay: bool,
    max_frame_length: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            call_timeout: Duration::from_secs(3),
            dial_timeout: Duration::from_secs(3),
            nodelay: true,
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }
}

impl ClientConfig {
    /// Replace the per-address pool policy.
    #[must_use]
    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Shorthand for setting [`PoolConfig::max_idle`].
    #[must_use]
    pub fn max_idle(mut self, duration: Duration) -> Self {
        self.pool = self.pool.max_idle(duration);
        self
    }

    /// Shorthand for setting [`PoolConfig::max_idle_per_address`].
    #[must_use]
    pub fn max_idle_per_address(mut self, limit: Option<usize>) -> Self {
        self.pool = self.pool.max_idle_per_address(limit);
        self
    }

    /// Deadline for a whole call, covering connection acquisition and the
    /// round trip.
    #[must_use]
    pub fn call_timeout(mut self, duration: Duration) -> Self {
        self.call_timeout = duration;
        self
    }

    /// Deadline for establishing a TCP connection.
    #[must_use]
    pub fn dial_timeout(mut self, duration: Duration) -> Self {
        self.dial_timeout = duration;
        self
    }

    /// Configure `TCP_NODELAY` on dialed sockets.
    #[must_use]
    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.nodelay = enabled;
        self
    }

    /// Largest reply frame accepted, in bytes.
    #[must_use]
    pub fn max_frame_length(mut self, length: usize) -> Self {
        self.max_frame_length = length;
        self
    }

    /// Per-address pool policy.
    #[must_use]
    pub const fn pool_value(&self) -> PoolConfig { self.pool }

    /// Configured call deadline.
    #[must_use]
    pub const fn call_timeout_value(&self) -> Duration { self.call_timeout }

    /// Configured connect deadline.
    #[must_use]
    pub const fn dial_timeout_value(&self) -> Duration { self.dial_timeout }

    /// Whether `TCP_NODELAY` is set on dialed sockets.
    #[must_use]
    pub const fn nodelay_value(&self) -> bool { self.nodelay }

    /// Configured frame limit.
    #[must_use]
    pub const fn max_frame_length_value(&self) -> usize { self.max_frame_length }
}
