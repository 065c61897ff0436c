//! Free list of [`RequestContext`] instances.
//!
//! Each dispatch borrows a context through [`ContextPool::acquire`]. The
//! returned [`PooledContext`] puts the context back when dropped, which also
//! happens while unwinding out of a panicking handler. Contexts are reset on
//! the way back so that idle entries never hold request data.

use std::{
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicU64, Ordering},
};

use parking_lot::Mutex;

use crate::context::RequestContext;

/// Sizing for a [`ContextPool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContextPoolConfig {
    /// Maximum number of idle contexts kept for reuse. Surplus contexts are
    /// dropped on release.
    pub max_idle: usize,
}

impl Default for ContextPoolConfig {
    fn default() -> Self { Self { max_idle: 1024 } }
}

/// Thread-safe free list of request contexts.
#[derive(Debug, Default)]
pub struct ContextPool {
    free: Mutex<Vec<RequestContext>>,
    config: ContextPoolConfig,
    created: AtomicU64,
}

impl ContextPool {
    /// Create an empty pool.
    #[must_use]
    pub fn new(config: ContextPoolConfig) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            config,
            created: AtomicU64::new(0),
        }
    }

    /// Borrow a cleared context, allocating one if none is idle.
    pub fn acquire(&self) -> PooledContext<'_> {
        let reused = self.free.lock().pop();
        let ctx = reused.unwrap_or_else(|| {
            self.created.fetch_add(1, Ordering::Relaxed);
            RequestContext::default()
        });
        PooledContext { pool: self, ctx }
    }

    fn release(&self, mut ctx: RequestContext) {
        ctx.reset();
        let mut free = self.free.lock();
        if free.len() < self.config.max_idle {
            free.push(ctx);
        }
    }

    /// Number of contexts waiting for reuse.
    #[must_use]
    pub fn idle(&self) -> usize { self.free.lock().len() }

    /// Number of contexts allocated over the pool's lifetime.
    #[must_use]
    pub fn created(&self) -> u64 { self.created.load(Ordering::Relaxed) }
}

/// A context on loan from a [`ContextPool`].
///
/// Dereferences to [`RequestContext`]; dropping it returns the context.
#[derive(Debug)]
pub struct PooledContext<'a> {
    pool: &'a ContextPool,
    ctx: RequestContext,
}

impl Deref for PooledContext<'_> {
    type Target = RequestContext;

    fn deref(&self) -> &Self::Target { &self.ctx }
}

impl DerefMut for PooledContext<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target { &mut self.ctx }
}

impl Drop for PooledContext<'_> {
    fn drop(&mut self) { self.pool.release(std::mem::take(&mut self.ctx)); }
}
