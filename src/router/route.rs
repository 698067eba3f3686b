//! Route declarations, route matches, and the handler capability.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use super::error::HandlerError;
use crate::context::{Parameters, RouteContext};
use crate::http::Method;

/// Heap-allocated, `Send` future borrowed for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What every handler returns.
pub type HandlerResult = Result<(), HandlerError>;

/// Anything that can handle a routed request.
///
/// A handler receives the whole [`RouteContext`]. It continues the chain by
/// awaiting [`RouteContext::next`], which makes it middleware around the
/// routes matched after it, or ends the chain by returning without doing so.
///
/// Closures of the shape `|ctx| Box::pin(async move { ... })` implement this
/// trait through the blanket impl below.
pub trait RouteHandler: Send + Sync + 'static {
    fn handle<'a>(&'a self, ctx: &'a mut RouteContext) -> BoxFuture<'a, HandlerResult>;
}

impl<F> RouteHandler for F
where
    F: for<'a> Fn(&'a mut RouteContext) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    fn handle<'a>(&'a self, ctx: &'a mut RouteContext) -> BoxFuture<'a, HandlerResult> {
        (self)(ctx)
    }
}

/// Fixes a closure's signature so it can be passed where `impl RouteHandler`
/// is expected.
///
/// ```
/// use pathway::http::Method;
/// use pathway::router::{Route, handler_fn};
///
/// let route = Route::new(
///     Method::Get,
///     "/health",
///     handler_fn(|ctx| Box::pin(async move {
///         ctx.response_mut().send("ok")?;
///         Ok(())
///     })),
/// );
/// assert_eq!(route.pattern(), "/health");
/// ```
pub fn handler_fn<F>(f: F) -> F
where
    F: for<'a> Fn(&'a mut RouteContext) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    f
}

/// A registered `(method, pattern, handler)` triple with an optional name.
///
/// Immutable once built. The router validates and compiles the pattern when
/// the route is added.
pub struct Route {
    method: Method,
    pattern: String,
    handler: Arc<dyn RouteHandler>,
    name: Option<String>,
}

impl Route {
    pub fn new(method: Method, pattern: impl Into<String>, handler: impl RouteHandler) -> Self {
        Self {
            method,
            pattern: pattern.into(),
            handler: Arc::new(handler),
            name: None,
        }
    }

    /// Names the route for reverse URL generation.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn handler(&self) -> &Arc<dyn RouteHandler> {
        &self.handler
    }

    /// Swaps the handler for a wrapped version of itself.
    pub(crate) fn map_handler<F>(mut self, wrap: F) -> Self
    where
        F: FnOnce(Arc<dyn RouteHandler>) -> Arc<dyn RouteHandler>,
    {
        self.handler = wrap(self.handler);
        self
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.pattern)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// One route that matched one concrete path, plus the parameters it bound.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    route: Arc<Route>,
    path_params: Parameters,
}

impl RouteMatch {
    pub fn new(route: Arc<Route>, path_params: Parameters) -> Self {
        Self { route, path_params }
    }

    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    pub fn path_params(&self) -> &Parameters {
        &self.path_params
    }
}

impl fmt::Display for RouteMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.route)
    }
}
