//! Runtime control for [`Server`].

mod accept;
mod backoff;

use std::future::Future;

use accept::{AcceptLoopOptions, accept_loop};
pub use backoff::BackoffConfig;
use log::warn;
use tokio::{select, signal};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{Bound, Server, ServerError};

impl Server<Bound> {
    /// Run the server until Ctrl+C is received.
    ///
    /// # Errors
    ///
    /// Currently always returns `Ok`. Accept failures are retried with
    /// exponential back-off and do not surface as errors.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(async {
            let _ = signal::ctrl_c().await;
        })
        .await
    }

    /// Run the server until the `shutdown` future resolves.
    ///
    /// Once `shutdown` resolves no further connections are accepted. Open
    /// connections finish the call they are serving and are then closed.
    ///
    /// # Examples
    ///
    /// ```
    /// use tokio::sync::oneshot;
    /// use endrpc::{Dispatcher, server::Server};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), endrpc::server::ServerError> {
    /// let server = Server::new(Dispatcher::new("app")).bind(([127, 0, 0, 1], 0).into())?;
    ///
    /// let (tx, rx) = oneshot::channel::<()>();
    /// let handle = tokio::spawn(server.run_with_shutdown(async {
    ///     let _ = rx.await;
    /// }));
    ///
    /// let _ = tx.send(());
    /// handle.await.expect("join server task")?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Currently always returns `Ok`; see [`run`](Self::run).
    pub async fn run_with_shutdown<S>(self, shutdown: S) -> Result<(), ServerError>
    where
        S: Future<Output = ()> + Send,
    {
        let Server {
            dispatcher,
            config,
            ready_tx,
            state: Bound { listener },
        } = self;
        let shutdown_token = CancellationToken::new();
        let tracker = TaskTracker::new();

        tracker.spawn(accept_loop(
            listener,
            AcceptLoopOptions {
                dispatcher,
                max_frame_length: config.max_frame_length_value(),
                shutdown: shutdown_token.clone(),
                tracker: tracker.clone(),
                backoff: config.backoff_value(),
            },
        ));

        if let Some(tx) = ready_tx
            && tx.send(()).is_err()
        {
            warn!("Failed to send readiness signal: receiver dropped");
        }

        select! {
            () = shutdown => shutdown_token.cancel(),
            () = tracker.wait() => {},
        }

        tracker.close();
        tracker.wait().await;
        Ok(())
    }
}
