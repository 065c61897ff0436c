#![doc(html_root_url = "https://docs.rs/endrpc/latest")]
//! Public API for the `endrpc` library.
//!
//! `endrpc` routes `controller/action` calls through a chain of synchronous
//! middleware to registered handlers, serves them over TCP, and calls remote
//! dispatchers through per-address connection pools.
//!
//! ```
//! use endrpc::{Dispatcher, context::RequestContext, message::Request, middleware};
//!
//! let dispatcher = Dispatcher::new("greeter")
//!     .wrap(middleware::recover)
//!     .register_func("hello", "world", |c: &mut RequestContext| {
//!         let greeting = format!("hi {}", c.string_param("name"));
//!         c.success_response(&greeting);
//!     })
//!     .expect("route registered once");
//!
//! let reply = dispatcher
//!     .do_request(Request::new("hello", "world").with_param("name", "bob"))
//!     .expect("route exists");
//! assert_eq!(reply.data, br#"{"success":true,"payload":"hi bob"}"#);
//! ```

pub mod client;
pub mod codec;
pub mod context;
pub mod context_pool;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod message;
pub mod metrics;
pub mod middleware;
pub mod server;

pub use client::{Caller, ClientError, PoolManager};
pub use context::{Handler, RequestContext};
pub use dispatcher::Dispatcher;
pub use error::{DispatchError, Result};
pub use message::{Reply, Request};
pub use server::{Server, ServerError};
