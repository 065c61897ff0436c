//! Tokio-based TCP server for a [`Dispatcher`].
//!
//! The server accepts connections, reads length-prefixed [`RequestFrame`]s
//! and answers each with a [`ReplyFrame`]. Every connection runs in its own
//! task; calls on one connection are served in order.
//!
//! [`RequestFrame`]: crate::message::RequestFrame
//! [`ReplyFrame`]: crate::message::ReplyFrame

use std::sync::Arc;

use tokio::{net::TcpListener, sync::oneshot};

use crate::dispatcher::Dispatcher;

mod binding;
mod config;
mod connection;
pub mod error;
mod runtime;

pub use config::ServerConfig;
pub use error::ServerError;
pub use runtime::BackoffConfig;

/// TCP front end for a [`Dispatcher`].
///
/// The server carries a typestate `S` indicating whether it is [`Unbound`]
/// or [`Bound`]. New servers start `Unbound` and must call
/// [`bind`](Server::bind) or [`bind_existing_listener`](Server::bind_existing_listener)
/// before running.
///
/// # Examples
///
/// ```no_run
/// use endrpc::{Dispatcher, context::RequestContext, server::Server};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dispatcher = Dispatcher::new("greeter")
///     .register_func("hello", "world", |c: &mut RequestContext| {
///         c.success_response("hi");
///     })?;
/// Server::new(dispatcher)
///     .bind("127.0.0.1:7000".parse()?)?
///     .run()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct Server<S: ServerState = Unbound> {
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) config: ServerConfig,
    /// Fired once the accept loop has been spawned. Single use: a new sender
    /// is needed for every run.
    pub(crate) ready_tx: Option<oneshot::Sender<()>>,
    pub(crate) state: S,
}

/// Marker indicating the server has not yet bound a listener.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbound;

/// Marker indicating the server is bound to a TCP listener.
#[derive(Debug, Clone)]
pub struct Bound {
    pub(crate) listener: Arc<TcpListener>,
}

/// Trait implemented by [`Unbound`] and [`Bound`] to model binding typestate.
pub trait ServerState: sealed::Sealed {}

mod sealed {
    //! Prevent external implementations of [`ServerState`](super::ServerState).

    pub trait Sealed {}
    impl Sealed for super::Unbound {}
    impl Sealed for super::Bound {}
}

impl ServerState for Unbound {}
impl ServerState for Bound {}

impl<S: ServerState + std::fmt::Debug> std::fmt::Debug for Server<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("dispatcher", &self.dispatcher)
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Server<Unbound> {
    /// Create a server for `dispatcher` with default settings.
    #[must_use]
    pub fn new(dispatcher: Dispatcher) -> Self { Self::from_shared(Arc::new(dispatcher)) }

    /// Create a server for a dispatcher that is already shared.
    #[must_use]
    pub fn from_shared(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            config: ServerConfig::default(),
            ready_tx: None,
            state: Unbound,
        }
    }
}

impl<S: ServerState> Server<S> {
    /// Replace all server settings.
    #[must_use]
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Configure accept-loop back-off. Values are normalised when the server
    /// runs.
    #[must_use]
    pub fn accept_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.config = self.config.backoff(backoff);
        self
    }

    /// Largest request frame accepted, in bytes.
    #[must_use]
    pub fn max_frame_length(mut self, length: usize) -> Self {
        self.config = self.config.max_frame_length(length);
        self
    }

    /// Notify `tx` once the server is accepting connections.
    #[must_use]
    pub fn ready_signal(mut self, tx: oneshot::Sender<()>) -> Self {
        self.ready_tx = Some(tx);
        self
    }

    /// The dispatcher serving calls.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> { &self.dispatcher }
}

#[cfg(test)]
pub(crate) mod test_util;
