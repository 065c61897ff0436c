//! Per-call execution state shared by middleware and route handlers.
//!
//! A [`RequestContext`] owns the handler chain for one call together with a
//! cursor into it. [`RequestContext::next`] walks the chain; a handler that
//! calls `next` itself runs the remainder of the chain inline, which lets
//! middleware execute code both before and after the inner handlers.
//! [`RequestContext::abort`] moves the cursor past every real index so that
//! pending handlers are skipped while the current one runs to completion.

mod params;
mod value;

use std::{collections::HashMap, fmt, sync::Arc};

use serde::Serialize;
use tokio::time::Instant;

pub use self::{params::header_keys, value::Value};
use crate::{
    envelope,
    message::{Files, Reply, Request},
};

/// A unit of work in the handler chain.
///
/// Handlers run synchronously on the task serving the call.
pub type Handler = Arc<dyn Fn(&mut RequestContext) + Send + Sync>;

/// Cursor value marking an aborted chain. Chains never come close to this
/// length.
const ABORT_INDEX: isize = isize::MAX / 2;

/// Error code written when a success payload cannot be encoded.
const ENCODE_FAILURE_CODE: i32 = 500;

/// Execution state for a single call.
///
/// Instances are recycled through [`ContextPool`](crate::context_pool::ContextPool);
/// every field is cleared before an instance is handed to another call.
pub struct RequestContext {
    handlers: Vec<Handler>,
    index: isize,
    request: Request,
    reply: Reply,
    app_name: Arc<str>,
    deadline: Option<Instant>,
    keys: Option<HashMap<String, Value>>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
            index: -1,
            request: Request::default(),
            reply: Reply::default(),
            app_name: Arc::from(""),
            deadline: None,
            keys: None,
        }
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("handlers", &self.handlers.len())
            .field("index", &self.index)
            .field("request", &self.request)
            .field("app_name", &self.app_name)
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

impl RequestContext {
    /// Build a standalone context around `handlers`.
    ///
    /// The dispatcher uses pooled contexts; this constructor exists for
    /// driving middleware directly.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use endrpc::{
    ///     context::{Handler, RequestContext},
    ///     message::Request,
    /// };
    ///
    /// let greet: Handler = Arc::new(|c: &mut RequestContext| {
    ///     let greeting = format!("hi {}", c.string_param("name"));
    ///     c.success_response(&greeting);
    /// });
    /// let request = Request::new("hello", "world").with_param("name", "bob");
    /// let mut ctx = RequestContext::new("demo", request, vec![greet]);
    /// ctx.next();
    /// assert!(!ctx.response().is_empty());
    /// ```
    #[must_use]
    pub fn new(app_name: &str, request: Request, handlers: Vec<Handler>) -> Self {
        let mut ctx = Self::default();
        ctx.prepare(Arc::from(app_name), request, handlers, None);
        ctx
    }

    pub(crate) fn prepare(
        &mut self,
        app_name: Arc<str>,
        request: Request,
        handlers: impl IntoIterator<Item = Handler>,
        deadline: Option<Instant>,
    ) {
        self.handlers.extend(handlers);
        self.index = -1;
        self.request = request;
        self.app_name = app_name;
        self.deadline = deadline;
    }

    /// Clear all per-call state, keeping allocated capacity of the chain.
    pub(crate) fn reset(&mut self) {
        self.handlers.clear();
        self.index = -1;
        self.request = Request::default();
        self.reply = Reply::default();
        self.app_name = Arc::from("");
        self.deadline = None;
        self.keys = None;
    }

    /// Take the response produced by the chain.
    pub(crate) fn take_reply(&mut self) -> Reply { std::mem::take(&mut self.reply) }

    /// Run the pending handlers of the chain.
    ///
    /// Intended for middleware: everything after the call executes once the
    /// inner handlers have returned.
    pub fn next(&mut self) {
        self.index += 1;
        while let Some(handler) = self.current() {
            handler(self);
            self.index += 1;
        }
    }

    fn current(&self) -> Option<Handler> {
        usize::try_from(self.index)
            .ok()
            .and_then(|i| self.handlers.get(i))
            .cloned()
    }

    /// Prevent pending handlers from running.
    ///
    /// The calling handler is not interrupted; only handlers that have not
    /// started yet are skipped.
    pub fn abort(&mut self) { self.index = ABORT_INDEX; }

    /// Whether [`abort`](Self::abort) was called for this request.
    #[must_use]
    pub fn is_aborted(&self) -> bool { self.index >= ABORT_INDEX }

    /// The incoming request.
    #[must_use]
    pub fn request(&self) -> &Request { &self.request }

    /// The response written so far.
    #[must_use]
    pub fn response(&self) -> &Reply { &self.reply }

    /// Files attached to the request.
    #[must_use]
    pub fn files(&self) -> &Files { &self.request.files }

    /// Name of the application serving this request, for logging.
    #[must_use]
    pub fn app_name(&self) -> &str { &self.app_name }

    /// Point in time after which the caller stops waiting, if it sent one.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> { self.deadline }

    /// Whether the caller's deadline has already passed.
    ///
    /// Handlers doing expensive work should check this and bail out early;
    /// the dispatcher never interrupts a running handler.
    #[must_use]
    pub fn is_expired(&self) -> bool { self.deadline.is_some_and(|d| Instant::now() >= d) }

    /// Write a success envelope around `payload`.
    ///
    /// This does not stop the chain; call [`abort`](Self::abort) as well when
    /// no further handler should run.
    pub fn success_response<T>(&mut self, payload: &T)
    where
        T: Serialize + ?Sized,
    {
        match envelope::encode_success(payload) {
            Ok(data) => self.reply.data = data,
            Err(e) => {
                tracing::error!(
                    app = %self.app_name,
                    controller = %self.request.controller,
                    action = %self.request.action,
                    error = %e,
                    "failed to encode response payload"
                );
                self.error_response(ENCODE_FAILURE_CODE, "failed to encode response payload");
            }
        }
    }

    /// Write a failure envelope carrying `code` and the text of `err`.
    ///
    /// Like [`success_response`](Self::success_response), this leaves the
    /// chain running.
    pub fn error_response(&mut self, code: i32, err: impl fmt::Display) {
        self.reply.data = envelope::encode_error(code, &err.to_string()).unwrap_or_default();
    }

    /// Store `value` under `key` for the rest of this request.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.keys
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
    }

    /// The value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> { self.keys.as_ref()?.get(key) }

    /// The string stored under `key`, or `""` when absent or not a string.
    #[must_use]
    pub fn get_string(&self, key: &str) -> &str {
        self.get(key).and_then(Value::as_str).unwrap_or_default()
    }

    /// The integer stored under `key`, or `0`.
    #[must_use]
    pub fn get_int(&self, key: &str) -> i64 { self.get(key).and_then(Value::as_int).unwrap_or_default() }

    /// The flag stored under `key`, or `false`.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or_default()
    }

    /// The string map stored under `key`.
    #[must_use]
    pub fn get_string_map(&self, key: &str) -> Option<&HashMap<String, String>> {
        self.get(key).and_then(Value::as_str_map)
    }

    /// The extension of type `T` stored under `key`.
    #[must_use]
    pub fn get_extension<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        self.get(key).and_then(Value::downcast::<T>)
    }
}
