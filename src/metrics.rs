//! Metric helpers for `endrpc`.
//!
//! This module defines metric names and small helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. With the `metrics` feature
//! disabled every helper compiles to a no-op.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the counter tracking dispatched requests.
pub const REQUESTS_TOTAL: &str = "endrpc_requests_total";
/// Name of the counter tracking panics caught by the recovery middleware.
pub const HANDLER_PANICS_TOTAL: &str = "endrpc_handler_panics_total";
/// Name of the counter tracking dials made by client pools.
pub const POOL_DIALS_TOTAL: &str = "endrpc_pool_dials_total";
/// Name of the counter tracking connections invalidated after failures.
pub const POOL_INVALIDATIONS_TOTAL: &str = "endrpc_pool_invalidations_total";
/// Name of the gauge tracking open server connections.
pub const CONNECTIONS_ACTIVE: &str = "endrpc_connections_active";

/// Outcome of a single dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// A handler chain ran.
    Handled,
    /// No route matched.
    NotFound,
}

impl Outcome {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            Outcome::Handled => "handled",
            Outcome::NotFound => "not_found",
        }
    }
}

/// Record a dispatched request.
pub fn inc_requests(outcome: Outcome) {
    #[cfg(feature = "metrics")]
    counter!(REQUESTS_TOTAL, "outcome" => outcome.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = outcome;
}

/// Record a handler panic converted into an error response.
pub fn inc_handler_panics() {
    #[cfg(feature = "metrics")]
    counter!(HANDLER_PANICS_TOTAL).increment(1);
}

/// Record a dial made by a client pool.
pub fn inc_pool_dials() {
    #[cfg(feature = "metrics")]
    counter!(POOL_DIALS_TOTAL).increment(1);
}

/// Record a connection invalidated after a transport failure.
pub fn inc_pool_invalidations() {
    #[cfg(feature = "metrics")]
    counter!(POOL_INVALIDATIONS_TOTAL).increment(1);
}

/// Increment the open server connections gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement the open server connections gauge.
pub fn dec_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}
