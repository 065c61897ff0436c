//! A [`Server`] running in the background for the duration of a test.

use std::{io, net::SocketAddr};

use endrpc::{Dispatcher, Server, ServerError};
use tokio::{sync::oneshot, task::JoinHandle};

use crate::fixtures::unused_listener;

/// Background server bound to an ephemeral localhost port.
///
/// Dropping a `TestServer` without calling [`shutdown`](Self::shutdown)
/// stops accepting connections but does not wait for the task to finish.
#[derive(Debug)]
pub struct TestServer {
    addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    /// Bind `dispatcher` to a free port and wait until it accepts
    /// connections.
    ///
    /// # Errors
    ///
    /// Returns an error if no port can be bound or the server task exits
    /// before signalling readiness.
    pub async fn start(dispatcher: Dispatcher) -> io::Result<Self> {
        let listener = unused_listener()?;
        let addr = listener.local_addr()?;
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = Server::new(dispatcher)
            .bind_existing_listener(listener)
            .map_err(io::Error::other)?
            .ready_signal(ready_tx);
        let handle = tokio::spawn(server.run_with_shutdown(async {
            let _ = stop_rx.await;
        }));
        ready_rx
            .await
            .map_err(|_| io::Error::other("server exited before becoming ready"))?;
        Ok(Self {
            addr,
            stop: Some(stop_tx),
            handle,
        })
    }

    /// Socket address the server listens on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr { self.addr }

    /// Listening address formatted for [`Caller`](endrpc::Caller).
    #[must_use]
    pub fn address(&self) -> String { self.addr.to_string() }

    /// Stop the server and wait for every connection task to end.
    ///
    /// # Panics
    ///
    /// Panics if the server task panicked or returned an error.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        (&mut self.handle)
            .await
            .expect("server task panicked")
            .expect("server returned an error");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}
