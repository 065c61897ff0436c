//! Shared fixtures for integration tests.

use std::net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener};

use endrpc::{Dispatcher, RequestContext, middleware};
use rstest::fixture;

/// Create a TCP listener bound to a free local port.
///
/// # Errors
///
/// Returns any IO error encountered while binding to an ephemeral localhost
/// port.
pub fn unused_listener() -> std::io::Result<StdTcpListener> {
    StdTcpListener::bind(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0))
}

/// Dispatcher exposing `hello/world`, which greets the `name` parameter, and
/// `hello/panic`, which always panics.
///
/// # Panics
///
/// Never in practice; both routes are registered exactly once.
#[fixture]
#[must_use]
pub fn greeter() -> Dispatcher {
    Dispatcher::new("greeter")
        .wrap(middleware::recover)
        .register_func("hello", "world", |c: &mut RequestContext| {
            let greeting = format!("hi {}", c.string_param("name"));
            c.success_response(&greeting);
        })
        .and_then(|d| {
            d.register_func("hello", "panic", |_: &mut RequestContext| {
                panic!("handler exploded");
            })
        })
        .expect("greeter routes are unique")
}
