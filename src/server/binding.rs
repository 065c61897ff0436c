//! Listener binding for [`Server`].

use std::{
    net::{SocketAddr, TcpListener as StdTcpListener},
    sync::Arc,
};

use tokio::net::TcpListener;

use super::{Bound, Server, ServerError, ServerState, Unbound};

impl<S: ServerState> Server<S> {
    fn bind_to_listener(self, std_listener: StdTcpListener) -> Result<Server<Bound>, ServerError> {
        let Server {
            dispatcher,
            config,
            ready_tx,
            ..
        } = self;

        std_listener
            .set_nonblocking(true)
            .map_err(ServerError::Bind)?;
        let listener = TcpListener::from_std(std_listener).map_err(ServerError::Bind)?;

        Ok(Server {
            dispatcher,
            config,
            ready_tx,
            state: Bound {
                listener: Arc::new(listener),
            },
        })
    }

    /// Bind to `addr`. Binding a bound server again replaces its listener.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::net::{Ipv4Addr, SocketAddr};
    ///
    /// use endrpc::{Dispatcher, server::Server};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let server = Server::new(Dispatcher::new("app"))
    ///     .bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
    ///     .expect("bind failed");
    /// assert!(server.local_addr().is_some());
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if binding or configuring the listener
    /// fails.
    pub fn bind(self, addr: SocketAddr) -> Result<Server<Bound>, ServerError> {
        let std_listener = StdTcpListener::bind(addr).map_err(ServerError::Bind)?;
        self.bind_to_listener(std_listener)
    }

    /// Adopt an already bound standard library listener.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the listener cannot be switched to
    /// non-blocking mode or registered with the runtime.
    pub fn bind_existing_listener(
        self,
        std_listener: StdTcpListener,
    ) -> Result<Server<Bound>, ServerError> {
        self.bind_to_listener(std_listener)
    }
}

impl Server<Unbound> {
    /// Return `None` as the server is not bound.
    #[must_use]
    pub const fn local_addr(&self) -> Option<SocketAddr> { None }
}

impl Server<Bound> {
    /// Returns the bound address, or `None` if retrieving it fails.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> { self.state.listener.local_addr().ok() }
}
