//! Test helpers shared across server modules.

use std::net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener};

use rstest::fixture;

use super::{Bound, Server};
use crate::{context::RequestContext, dispatcher::Dispatcher};

/// Dispatcher answering `hello/world` with `hi <name>`.
#[fixture]
pub fn dispatcher() -> Dispatcher {
    Dispatcher::new("test-app")
        .register_func("hello", "world", |c: &mut RequestContext| {
            let greeting = format!("hi {}", c.string_param("name"));
            c.success_response(&greeting);
        })
        .expect("register hello/world")
}

/// Returns a bound listener on a free port.
///
/// Keeping the listener bound prevents another process from claiming the
/// port between discovery and use.
#[fixture]
pub fn free_listener() -> StdTcpListener {
    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
    StdTcpListener::bind(addr).expect("Failed to bind free port listener")
}

pub fn bind_server(dispatcher: Dispatcher, listener: StdTcpListener) -> Server<Bound> {
    Server::new(dispatcher)
        .bind_existing_listener(listener)
        .expect("Failed to bind")
}

/// Request frame whose `params` map claims 2^40 entries but carries none.
pub fn forged_params_frame() -> Vec<u8> {
    // timeout_ms: None, controller: "", action: "", then a u64 varint length.
    let mut frame = vec![0, 0, 0, 0xFD];
    frame.extend_from_slice(&(1u64 << 40).to_le_bytes());
    frame
}
