//! Built-in global middleware.
//!
//! Both functions follow the wrapping pattern: they call
//! [`RequestContext::next`] to run the inner chain and act once it returns.
//! Install [`recover`] first so that it encloses everything else:
//!
//! ```
//! use endrpc::{Dispatcher, middleware};
//!
//! let dispatcher = Dispatcher::new("app")
//!     .wrap(middleware::recover)
//!     .wrap(middleware::logger);
//! ```

use std::{
    any::Any,
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
};

use tokio::time::Instant;

use crate::{context::RequestContext, metrics};

/// Error code written when a handler panics.
pub const INTERNAL_ERROR_CODE: i32 = crate::message::STATUS_INTERNAL_ERROR;

/// Longest response prefix included in request logs, in bytes.
const MAX_LOGGED_RESPONSE: usize = 2 * 1024;

/// Formats a panic payload when logged or displayed.
///
/// `String` and `&'static str` payloads are shown verbatim; anything else
/// falls back to its `Debug` form.
struct PanicMessage<'a>(&'a (dyn Any + Send));

impl fmt::Display for PanicMessage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.0.downcast_ref::<String>() {
            f.write_str(s)
        } else if let Some(s) = self.0.downcast_ref::<&'static str>() {
            f.write_str(s)
        } else {
            write!(f, "{:?}", self.0)
        }
    }
}

/// Convert a panic in the inner chain into an error response.
///
/// The panic is logged with the app name and route, the chain is aborted,
/// and the response is replaced with an [`INTERNAL_ERROR_CODE`] envelope.
/// The serving process and concurrent requests are unaffected.
pub fn recover(ctx: &mut RequestContext) {
    let Err(payload) = catch_unwind(AssertUnwindSafe(|| ctx.next())) else {
        return;
    };
    metrics::inc_handler_panics();
    let request = ctx.request();
    tracing::error!(
        app = %ctx.app_name(),
        controller = %request.controller,
        action = %request.action,
        panic = %PanicMessage(payload.as_ref()),
        "handler panicked"
    );
    ctx.abort();
    ctx.error_response(INTERNAL_ERROR_CODE, "internal server error");
}

/// Log each request once the inner chain has finished.
///
/// Responses longer than 2 KiB are truncated in the log record.
pub fn logger(ctx: &mut RequestContext) {
    let started = Instant::now();
    ctx.next();

    let request = ctx.request();
    let data = &ctx.response().data;
    let response = if data.len() > MAX_LOGGED_RESPONSE {
        let mut shown = String::from_utf8_lossy(&data[..MAX_LOGGED_RESPONSE]).into_owned();
        shown.push_str("...");
        shown
    } else {
        String::from_utf8_lossy(data).into_owned()
    };
    tracing::info!(
        app = %ctx.app_name(),
        controller = %request.controller,
        action = %request.action,
        params = ?request.params,
        header = ?request.header,
        response = %response,
        response_size = data.len(),
        elapsed = ?started.elapsed(),
        "request handled"
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tracing_test::traced_test;

    use super::*;
    use crate::{context::Handler, envelope::Envelope, message::Request};

    fn handler(f: impl Fn(&mut RequestContext) + Send + Sync + 'static) -> Handler { Arc::new(f) }

    fn run(handlers: Vec<Handler>) -> RequestContext {
        let mut ctx = RequestContext::new("test-app", Request::new("boom", "now"), handlers);
        ctx.next();
        ctx
    }

    #[traced_test]
    #[test]
    fn recover_turns_panic_into_error_envelope() {
        let panicking = handler(|_: &mut RequestContext| panic!("kaboom"));
        let ctx = run(vec![handler(recover), panicking]);

        let envelope = Envelope::decode(&ctx.response().data).expect("envelope");
        let error = envelope.into_result().expect_err("error envelope");
        assert_eq!(error.code, INTERNAL_ERROR_CODE);
        assert!(ctx.is_aborted());
        assert!(logs_contain("handler panicked"));
        assert!(logs_contain("kaboom"));
    }

    #[test]
    fn recover_is_transparent_without_panic() {
        let ok = handler(|c: &mut RequestContext| c.success_response("fine"));
        let ctx = run(vec![handler(recover), ok]);
        let envelope = Envelope::decode(&ctx.response().data).expect("envelope");
        assert!(envelope.success);
        assert!(!ctx.is_aborted());
    }

    #[traced_test]
    #[test]
    fn logger_records_route_and_truncates_response() {
        let big = handler(|c: &mut RequestContext| c.success_response(&"x".repeat(4096)));
        let _ctx = run(vec![handler(logger), big]);
        assert!(logs_contain("request handled"));
        assert!(logs_contain("test-app"));
        assert!(logs_contain("response_size="));
        assert!(logs_contain("..."));
    }

    #[test]
    fn panic_message_formats_common_payloads() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let literal: Box<dyn Any + Send> = Box::new("literal");
        let other: Box<dyn Any + Send> = Box::new(5_u32);
        assert_eq!(PanicMessage(owned.as_ref()).to_string(), "owned");
        assert_eq!(PanicMessage(literal.as_ref()).to_string(), "literal");
        assert!(PanicMessage(other.as_ref()).to_string().contains("Any"));
    }
}
