//! Convenience wrapper issuing calls through pooled connections.

use std::{fmt, sync::Arc, time::Duration};

use tokio::time::{Instant, timeout_at};

use super::{ClientConfig, ClientError, Connection, Dialer, PoolManager, TcpDialer};
use crate::message::{Params, Reply, ReplyFrame, Request, RequestFrame};

/// Issues `controller/action` calls to remote dispatchers.
///
/// Each call borrows a connection from the destination's pool and settles it
/// exactly once: healthy connections go back with
/// [`Pool::put`](super::Pool::put); connections that failed or timed out are
/// closed with [`Pool::del_error_client`](super::Pool::del_error_client).
///
/// # Examples
///
/// ```no_run
/// use endrpc::client::{Caller, ClientConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), endrpc::client::ClientError> {
/// let caller = Caller::new(ClientConfig::default());
/// let params = [("name".to_owned(), "bob".to_owned())].into_iter().collect();
/// let bytes = caller
///     .call_end_api("127.0.0.1:7000", "hello", "world", params)
///     .await?;
/// println!("{}", String::from_utf8_lossy(&bytes));
/// # Ok(())
/// # }
/// ```
pub struct Caller<D: Dialer = TcpDialer> {
    pools: Arc<PoolManager<D>>,
    call_timeout: Duration,
}

impl<D: Dialer> Clone for Caller<D> {
    fn clone(&self) -> Self {
        Self {
            pools: Arc::clone(&self.pools),
            call_timeout: self.call_timeout,
        }
    }
}

impl<D: Dialer> fmt::Debug for Caller<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Caller")
            .field("pools", &self.pools)
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl Caller<TcpDialer> {
    /// Create a caller dialing plain TCP connections.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self { Self::with_dialer(TcpDialer::new(config), config) }
}

impl<D: Dialer> Caller<D> {
    /// Create a caller using a custom dialer.
    #[must_use]
    pub fn with_dialer(dialer: D, config: ClientConfig) -> Self {
        Self::from_manager(
            Arc::new(PoolManager::new(dialer, config.pool_value())),
            config.call_timeout_value(),
        )
    }

    /// Create a caller sharing an existing pool registry.
    #[must_use]
    pub fn from_manager(pools: Arc<PoolManager<D>>, call_timeout: Duration) -> Self {
        Self {
            pools,
            call_timeout,
        }
    }

    /// The pool registry used by this caller.
    #[must_use]
    pub fn pools(&self) -> &Arc<PoolManager<D>> { &self.pools }

    /// Call `controller/action` on `address` with `params`, returning the
    /// raw response bytes.
    ///
    /// # Errors
    ///
    /// Returns a transport [`ClientError`] if no connection could be
    /// obtained, the exchange failed, or the call deadline passed; or
    /// [`ClientError::Remote`] when the server rejected the call.
    pub async fn call_end_api(
        &self,
        address: &str,
        controller: &str,
        action: &str,
        params: Params,
    ) -> Result<Vec<u8>, ClientError> {
        let request = Request::new(controller, action).with_params(params);
        self.call(address, request).await.map(|reply| reply.data)
    }

    /// Send a fully built request to `address`.
    ///
    /// The configured call timeout covers both acquiring a connection and
    /// the round trip. The remaining time is forwarded to the server so that
    /// handlers can observe it.
    ///
    /// # Errors
    ///
    /// See [`call_end_api`](Self::call_end_api).
    pub async fn call(&self, address: &str, request: Request) -> Result<Reply, ClientError> {
        let deadline = Instant::now() + self.call_timeout;
        let pool = self.pools.get_pool(address);
        let mut lease = timeout_at(deadline, pool.get())
            .await
            .map_err(|_| ClientError::Timeout(self.call_timeout))??;

        let remaining = deadline.saturating_duration_since(Instant::now());
        let frame = RequestFrame {
            timeout_ms: Some(u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX)),
            request,
        };
        match timeout_at(deadline, lease.invoke(&frame)).await {
            Ok(Ok(ReplyFrame::Reply(reply))) => {
                pool.put(lease);
                Ok(reply)
            }
            Ok(Ok(ReplyFrame::Status { code, message })) => {
                pool.put(lease);
                Err(ClientError::Remote { code, message })
            }
            Ok(Err(e)) => {
                tracing::warn!(address, route = %frame.request.routing_key(), error = %e, "call failed");
                pool.del_error_client(lease);
                Err(e)
            }
            Err(_) => {
                tracing::warn!(
                    address,
                    route = %frame.request.routing_key(),
                    timeout = ?self.call_timeout,
                    "call timed out"
                );
                pool.del_error_client(lease);
                Err(ClientError::Timeout(self.call_timeout))
            }
        }
    }
}
