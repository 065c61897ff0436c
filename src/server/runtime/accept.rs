//! Accept loop for the server runtime.

use std::{io, net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use log::warn;
use tokio::{
    net::{TcpListener, TcpStream},
    select,
    time::sleep,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::backoff::BackoffConfig;
use crate::{
    dispatcher::Dispatcher,
    server::{ServerError, connection::spawn_connection_task},
};

/// Source of incoming connections consumed by the accept loop.
///
/// Implementations must be cancellation-safe: dropping a pending `accept()`
/// future must not leak resources.
#[async_trait]
pub(in crate::server) trait AcceptListener: Send + Sync {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[async_trait]
impl AcceptListener for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> { TcpListener::local_addr(self) }
}

#[derive(Debug)]
pub(in crate::server) struct AcceptLoopOptions {
    pub dispatcher: Arc<Dispatcher>,
    pub max_frame_length: usize,
    pub shutdown: CancellationToken,
    pub tracker: TaskTracker,
    pub backoff: BackoffConfig,
}

/// Accept connections until `shutdown` is cancelled, spawning one tracked
/// task per connection.
///
/// Accept failures are logged and retried after an exponentially growing
/// delay; they never end the loop.
pub(in crate::server) async fn accept_loop<L>(listener: Arc<L>, options: AcceptLoopOptions)
where
    L: AcceptListener + 'static,
{
    let AcceptLoopOptions {
        dispatcher,
        max_frame_length,
        shutdown,
        tracker,
        backoff,
    } = options;
    let backoff = backoff.normalized();
    let mut delay = backoff.initial_delay;

    loop {
        select! {
            biased;

            () = shutdown.cancelled() => break,
            res = listener.accept() => match res {
                Ok((stream, peer_addr)) => {
                    spawn_connection_task(
                        stream,
                        peer_addr,
                        Arc::clone(&dispatcher),
                        max_frame_length,
                        shutdown.clone(),
                        &tracker,
                    );
                    delay = backoff.initial_delay;
                }
                Err(e) => {
                    let local_addr = listener.local_addr().ok();
                    let err = ServerError::Accept(e);
                    warn!("{err}: local_addr={local_addr:?}, retry_in={delay:?}");
                    select! {
                        () = shutdown.cancelled() => break,
                        () = sleep(delay) => {}
                    }
                    delay = backoff.next_delay(delay);
                }
            },
        }
    }
}
