//! Routing of calls to registered handlers.
//!
//! A [`Dispatcher`] is configured once with routes and global middleware,
//! then shared behind an `Arc` for serving. The routing table is never
//! mutated after that point, so lookups take no lock.

use std::{collections::HashMap, fmt, sync::Arc};

use tokio::time::Instant;

use crate::{
    context::{Handler, RequestContext},
    context_pool::{ContextPool, ContextPoolConfig},
    error::{DispatchError, Result},
    message::{Reply, Request, RoutingKey},
    metrics,
};

/// Routes `controller/action` calls through the global middleware chain to
/// their handler.
///
/// # Examples
///
/// ```
/// use endrpc::{Dispatcher, context::RequestContext, envelope::Envelope, message::Request};
///
/// let dispatcher = Dispatcher::new("greeter")
///     .register_func("hello", "world", |c: &mut RequestContext| {
///         let greeting = format!("hi {}", c.string_param("name"));
///         c.success_response(&greeting);
///     })
///     .expect("route registered once");
///
/// let reply = dispatcher
///     .do_request(Request::new("hello", "world").with_param("name", "bob"))
///     .expect("route exists");
/// let envelope = Envelope::decode(&reply.data).expect("json envelope");
/// assert_eq!(envelope.payload_as::<String>().unwrap(), "hi bob");
/// ```
pub struct Dispatcher {
    app_name: Arc<str>,
    routes: HashMap<RoutingKey, Handler>,
    middleware: Vec<Handler>,
    contexts: ContextPool,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut routes: Vec<_> = self.routes.keys().map(RoutingKey::as_str).collect();
        routes.sort_unstable();
        f.debug_struct("Dispatcher")
            .field("app_name", &self.app_name)
            .field("routes", &routes)
            .field("middleware", &self.middleware.len())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create a dispatcher with no routes. `app_name` is exposed to
    /// middleware for logging.
    #[must_use]
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: Arc::from(app_name.into()),
            routes: HashMap::new(),
            middleware: Vec::new(),
            contexts: ContextPool::default(),
        }
    }

    /// Replace the context free list with one sized by `config`.
    #[must_use]
    pub fn with_context_pool(mut self, config: ContextPoolConfig) -> Self {
        self.contexts = ContextPool::new(config);
        self
    }

    /// Register `handler` for `controller/action`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::DuplicateRoute`] if the key is already
    /// registered. Treat this as fatal during startup.
    pub fn register_func<F>(self, controller: &str, action: &str, handler: F) -> Result<Self>
    where
        F: Fn(&mut RequestContext) + Send + Sync + 'static,
    {
        self.register(controller, action, Arc::new(handler))
    }

    /// Register an already shared handler for `controller/action`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::DuplicateRoute`] if the key is already
    /// registered.
    pub fn register(mut self, controller: &str, action: &str, handler: Handler) -> Result<Self> {
        let key = RoutingKey::new(controller, action);
        if self.routes.contains_key(&key) {
            return Err(DispatchError::DuplicateRoute(key));
        }
        self.routes.insert(key, handler);
        Ok(self)
    }

    /// Append a global middleware. Middleware runs before every route
    /// handler, in the order it was added.
    #[must_use]
    pub fn wrap<F>(self, middleware: F) -> Self
    where
        F: Fn(&mut RequestContext) + Send + Sync + 'static,
    {
        self.wrap_all([Arc::new(middleware) as Handler])
    }

    /// Append several global middleware handlers at once.
    #[must_use]
    pub fn wrap_all(mut self, middleware: impl IntoIterator<Item = Handler>) -> Self {
        self.middleware.extend(middleware);
        self
    }

    /// Name given at construction.
    #[must_use]
    pub fn app_name(&self) -> &str { &self.app_name }

    /// Whether a handler is registered for `controller/action`.
    #[must_use]
    pub fn has_route(&self, controller: &str, action: &str) -> bool {
        self.routes.contains_key(&RoutingKey::new(controller, action))
    }

    /// Number of registered routes.
    #[must_use]
    pub fn route_count(&self) -> usize { self.routes.len() }

    /// The context free list, exposed for inspection.
    #[must_use]
    pub fn context_pool(&self) -> &ContextPool { &self.contexts }

    /// Dispatch `request` with no caller deadline.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::RouteNotFound`] when no handler is registered
    /// for the request's routing key. No handler runs in that case.
    pub fn do_request(&self, request: Request) -> Result<Reply> {
        self.do_request_with_deadline(request, None)
    }

    /// Dispatch `request`, exposing `deadline` to handlers through
    /// [`RequestContext::deadline`].
    ///
    /// The chain is the global middleware followed by the route handler.
    /// Concurrent calls each get their own context.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::RouteNotFound`] when no handler is registered
    /// for the request's routing key.
    pub fn do_request_with_deadline(
        &self,
        request: Request,
        deadline: Option<Instant>,
    ) -> Result<Reply> {
        let key = request.routing_key();
        let Some(route) = self.routes.get(&key) else {
            metrics::inc_requests(metrics::Outcome::NotFound);
            tracing::debug!(app = %self.app_name, route = %key, "no handler registered");
            return Err(DispatchError::RouteNotFound(key));
        };

        let chain = self.middleware.iter().chain(Some(route)).cloned();
        let mut ctx = self.contexts.acquire();
        ctx.prepare(Arc::clone(&self.app_name), request, chain, deadline);
        ctx.next();
        let reply = ctx.take_reply();
        metrics::inc_requests(metrics::Outcome::Handled);
        Ok(reply)
    }
}
