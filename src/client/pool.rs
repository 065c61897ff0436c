//! Idle-connection pool for a single destination address.
//!
//! Connections are borrowed as [`Lease`]s and must be settled with exactly
//! one of [`Pool::put`] or [`Pool::del_error_client`] on the pool that issued
//! it. A lease dropped
//! without being settled is treated as invalidated, since the state of its
//! connection is unknown.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::Mutex;
use tokio::time::Instant;

use super::{ClientError, Connection, Dialer, PoolConfig};
use crate::metrics;

/// Snapshot of a pool's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Connections opened by the dialer.
    pub dialed: u64,
    /// Leases served from the idle set.
    pub reused: u64,
    /// Leases returned to the idle set.
    pub returned: u64,
    /// Connections closed after a failure or an unsettled lease.
    pub invalidated: u64,
    /// Idle connections closed for exceeding the idle lifetime.
    pub expired: u64,
    /// Healthy connections closed because the idle set was full.
    pub surplus: u64,
    /// Connections currently waiting in the idle set.
    pub idle: usize,
    /// Connections currently open, leased or idle.
    pub live: u64,
}

#[derive(Debug, Default)]
struct Counters {
    address: String,
    dialed: AtomicU64,
    reused: AtomicU64,
    returned: AtomicU64,
    invalidated: AtomicU64,
    expired: AtomicU64,
    surplus: AtomicU64,
    live: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) { counter.fetch_add(1, Ordering::Relaxed); }

    fn closed(&self, reason: &AtomicU64) {
        Self::bump(reason);
        self.live.fetch_sub(1, Ordering::Relaxed);
    }

    fn invalidated(&self) {
        self.closed(&self.invalidated);
        metrics::inc_pool_invalidations();
    }
}

/// Accounting handle carried by every [`Lease`]. Its counters identify the
/// pool the lease came from.
#[derive(Debug)]
struct Ticket {
    counters: Arc<Counters>,
    settled: bool,
}

impl Ticket {
    fn settle(mut self) { self.settled = true; }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        if !self.settled {
            self.counters.invalidated();
            tracing::debug!("lease dropped without being settled, connection discarded");
        }
    }
}

/// A connection on loan from a [`Pool`].
///
/// Dereferences to the connection. Hand it back through [`Pool::put`] or
/// [`Pool::del_error_client`].
#[derive(Debug)]
pub struct Lease<C> {
    conn: C,
    ticket: Ticket,
}

impl<C> Lease<C> {
    fn into_parts(self) -> (C, Ticket) { (self.conn, self.ticket) }
}

impl<C> std::ops::Deref for Lease<C> {
    type Target = C;

    fn deref(&self) -> &C { &self.conn }
}

impl<C> std::ops::DerefMut for Lease<C> {
    fn deref_mut(&mut self) -> &mut C { &mut self.conn }
}

struct IdleConnection<C> {
    conn: C,
    idle_since: Instant,
}

/// Reusable connections to one address.
///
/// The idle set is used last-in first-out so that recently returned, warm
/// connections are preferred and older ones age out.
pub struct Pool<D: Dialer> {
    address: String,
    dialer: Arc<D>,
    config: PoolConfig,
    idle: Mutex<Vec<IdleConnection<D::Connection>>>,
    counters: Arc<Counters>,
}

impl<D: Dialer> fmt::Debug for Pool<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("address", &self.address)
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl<D: Dialer> Pool<D> {
    /// Create an empty pool dialing `address` through `dialer`.
    #[must_use]
    pub fn new(address: impl Into<String>, dialer: Arc<D>, config: PoolConfig) -> Self {
        let address = address.into();
        Self {
            counters: Arc::new(Counters {
                address: address.clone(),
                ..Counters::default()
            }),
            address,
            dialer,
            config,
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Destination served by this pool.
    #[must_use]
    pub fn address(&self) -> &str { &self.address }

    /// Borrow a connection, reusing a fresh idle one when available and
    /// dialing otherwise.
    ///
    /// # Errors
    ///
    /// Propagates the dialer's error. A failed dial leaves no state behind.
    pub async fn get(&self) -> Result<Lease<D::Connection>, ClientError> {
        if let Some(conn) = self.take_idle() {
            Counters::bump(&self.counters.reused);
            return Ok(self.lease(conn));
        }

        let conn = self.dialer.dial(&self.address).await.inspect_err(|e| {
            tracing::warn!(address = %self.address, error = %e, "dial failed");
        })?;
        Counters::bump(&self.counters.dialed);
        self.counters.live.fetch_add(1, Ordering::Relaxed);
        metrics::inc_pool_dials();
        Ok(self.lease(conn))
    }

    fn lease(&self, conn: D::Connection) -> Lease<D::Connection> {
        Lease {
            conn,
            ticket: Ticket {
                counters: Arc::clone(&self.counters),
                settled: false,
            },
        }
    }

    fn take_idle(&self) -> Option<D::Connection> {
        let mut stale = Vec::new();
        let found = {
            let mut idle = self.idle.lock();
            loop {
                let Some(entry) = idle.pop() else { break None };
                if self.is_reusable(&entry) {
                    break Some(entry.conn);
                }
                stale.push(entry.conn);
            }
        };
        self.close_stale(stale);
        found
    }

    /// Whether `ticket` was issued by this pool. A foreign lease is left
    /// unsettled so its own pool accounts for the closed connection.
    fn owns(&self, ticket: &Ticket) -> bool {
        let owned = Arc::ptr_eq(&ticket.counters, &self.counters);
        debug_assert!(
            owned,
            "lease from pool {} settled on pool {}",
            ticket.counters.address, self.address
        );
        if !owned {
            tracing::warn!(
                origin = %ticket.counters.address,
                address = %self.address,
                "lease settled on the wrong pool, connection discarded"
            );
        }
        owned
    }

    fn is_reusable(&self, entry: &IdleConnection<D::Connection>) -> bool {
        entry.idle_since.elapsed() < self.config.max_idle_value() && entry.conn.is_healthy()
    }

    fn close_stale(&self, stale: Vec<D::Connection>) {
        for _ in &stale {
            self.counters.closed(&self.counters.expired);
        }
        if !stale.is_empty() {
            tracing::debug!(address = %self.address, closed = stale.len(), "closed stale idle connections");
        }
    }

    /// Return a connection to the idle set.
    ///
    /// Unhealthy connections are closed instead, as are healthy ones arriving
    /// while the idle set is at its configured cap.
    pub fn put(&self, lease: Lease<D::Connection>) {
        let (conn, ticket) = lease.into_parts();
        if !self.owns(&ticket) {
            return;
        }
        ticket.settle();
        if !conn.is_healthy() {
            self.counters.invalidated();
            return;
        }

        let mut idle = self.idle.lock();
        if let Some(limit) = self.config.max_idle_per_address_value()
            && idle.len() >= limit
        {
            drop(idle);
            self.counters.closed(&self.counters.surplus);
            return;
        }
        idle.push(IdleConnection {
            conn,
            idle_since: Instant::now(),
        });
        Counters::bump(&self.counters.returned);
    }

    /// Close a connection after a transport failure. It is never handed out
    /// again.
    pub fn del_error_client(&self, lease: Lease<D::Connection>) {
        let (conn, ticket) = lease.into_parts();
        if !self.owns(&ticket) {
            return;
        }
        ticket.settle();
        self.counters.invalidated();
        tracing::debug!(address = %self.address, "invalidated connection");
        drop(conn);
    }

    /// Close idle connections that outlived the idle lifetime or became
    /// unhealthy, returning how many were closed.
    pub fn sweep(&self) -> usize {
        let stale: Vec<_> = {
            let mut idle = self.idle.lock();
            let (keep, stale) = std::mem::take(&mut *idle)
                .into_iter()
                .partition(|entry| self.is_reusable(entry));
            *idle = keep;
            stale
        };
        let closed = stale.len();
        self.close_stale(stale.into_iter().map(|entry| entry.conn).collect());
        closed
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let c = &self.counters;
        PoolStats {
            dialed: c.dialed.load(Ordering::Relaxed),
            reused: c.reused.load(Ordering::Relaxed),
            returned: c.returned.load(Ordering::Relaxed),
            invalidated: c.invalidated.load(Ordering::Relaxed),
            expired: c.expired.load(Ordering::Relaxed),
            surplus: c.surplus.load(Ordering::Relaxed),
            idle: self.idle.lock().len(),
            live: c.live.load(Ordering::Relaxed),
        }
    }
}
