//! Address-keyed registry of [`Pool`]s.

use std::{fmt, sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::{select, task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{Dialer, Pool, PoolConfig, TcpDialer};

/// Lazily creates one [`Pool`] per destination address.
///
/// Pools are created on first use and live until [`remove`](Self::remove)
/// is called or the manager is dropped.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use endrpc::client::{ClientConfig, PoolManager};
///
/// let manager = PoolManager::tcp(ClientConfig::default());
/// let first = manager.get_pool("127.0.0.1:7000");
/// let again = manager.get_pool("127.0.0.1:7000");
/// assert!(Arc::ptr_eq(&first, &again));
/// ```
pub struct PoolManager<D: Dialer = TcpDialer> {
    dialer: Arc<D>,
    config: PoolConfig,
    pools: DashMap<String, Arc<Pool<D>>>,
}

impl<D: Dialer> fmt::Debug for PoolManager<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolManager")
            .field("config", &self.config)
            .field("pools", &self.pools.len())
            .finish_non_exhaustive()
    }
}

impl PoolManager<TcpDialer> {
    /// Create a manager dialing plain TCP connections.
    #[must_use]
    pub fn tcp(config: super::ClientConfig) -> Self {
        Self::new(TcpDialer::new(config), config.pool_value())
    }
}

impl<D: Dialer> PoolManager<D> {
    /// Create a manager whose pools share `dialer` and `config`.
    #[must_use]
    pub fn new(dialer: D, config: PoolConfig) -> Self {
        Self {
            dialer: Arc::new(dialer),
            config,
            pools: DashMap::new(),
        }
    }

    /// The pool for `address`, created on first use.
    ///
    /// Concurrent first calls for the same address all observe the same
    /// pool instance.
    pub fn get_pool(&self, address: &str) -> Arc<Pool<D>> {
        if let Some(pool) = self.pools.get(address) {
            return Arc::clone(pool.value());
        }
        let pool = self
            .pools
            .entry(address.to_owned())
            .or_insert_with(|| {
                tracing::debug!(address, "creating connection pool");
                Arc::new(Pool::new(address, Arc::clone(&self.dialer), self.config))
            });
        Arc::clone(pool.value())
    }

    /// Drop the pool for `address`. Leases already handed out stay valid;
    /// idle connections close once the last reference goes away.
    pub fn remove(&self, address: &str) -> Option<Arc<Pool<D>>> {
        self.pools.remove(address).map(|(_, pool)| pool)
    }

    /// Number of addresses with a pool.
    #[must_use]
    pub fn len(&self) -> usize { self.pools.len() }

    /// Whether no pool has been created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.pools.is_empty() }

    /// Addresses with a pool, in no particular order.
    #[must_use]
    pub fn addresses(&self) -> Vec<String> {
        self.pools.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Sweep every pool, returning the number of idle connections closed.
    pub fn sweep(&self) -> usize {
        let pools: Vec<_> = self.pools.iter().map(|e| Arc::clone(e.value())).collect();
        pools.iter().map(|pool| pool.sweep()).sum()
    }

    /// Spawn a task sweeping all pools every `interval` until `shutdown` is
    /// cancelled or the manager is dropped.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let manager = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                select! {
                    () = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(live) = manager.upgrade() else { break };
                        let closed = live.sweep();
                        if closed > 0 {
                            tracing::debug!(closed, "swept idle connections");
                        }
                    }
                }
            }
        })
    }
}
