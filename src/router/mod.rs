//! Request routing: map HTTP methods and URL patterns to route handlers.
//!
//! [`Router`] owns every registered [`Route`]. For each request it returns
//! **all** routes registered under the request method whose pattern matches
//! the path, in registration order. Nothing is dropped after the first hit:
//! the returned [`RouteMatch`] list becomes the request's
//! [`RouteHandlerChain`], and the order decides which handler runs first.
//!
//! See [`PathPattern`] for the pattern syntax.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::context::{Parameters, RouteContext};
use crate::http::Method;

mod chain;
mod error;
mod pattern;
mod route;

pub use chain::RouteHandlerChain;
pub use error::{HandlerError, RouteValidationError};
pub use pattern::{PathPattern, Segment, WILDCARD_PARAM};
pub use route::{BoxFuture, HandlerResult, Route, RouteHandler, RouteMatch, handler_fn};

/// Wraps route handlers at registration time.
///
/// Decorators see the route they wrap, so they can label what they add (log
/// lines, timings) with its method and pattern. The routing core itself only
/// ever sees the wrapped [`RouteHandler`].
pub trait Decorator: Send + Sync + 'static {
    fn decorate(&self, route: &Route, handler: Arc<dyn RouteHandler>) -> Arc<dyn RouteHandler>;
}

impl<F> Decorator for F
where
    F: Fn(&Route, Arc<dyn RouteHandler>) -> Arc<dyn RouteHandler> + Send + Sync + 'static,
{
    fn decorate(&self, route: &Route, handler: Arc<dyn RouteHandler>) -> Arc<dyn RouteHandler> {
        (self)(route, handler)
    }
}

// A registered route together with its compiled pattern.
struct Entry {
    route: Arc<Route>,
    pattern: PathPattern,
}

/// The set of registered routes plus a per-method index over them.
///
/// Routes are added during start-up through `&mut self`; once the router is
/// moved into an [`Application`](crate::Application) it is shared read-only
/// between all in-flight requests.
///
/// # Examples
///
/// ```
/// use pathway::{Method, Router};
///
/// let mut router = Router::new();
/// router.get("/users/{id}", |ctx| Box::pin(async move {
///     let body = format!("user {}", ctx.param("id").unwrap_or("?"));
///     ctx.response_mut().send(body)?;
///     Ok(())
/// })).unwrap();
///
/// let matches = router.find_routes("/users/42", &Method::Get);
/// assert_eq!(matches.len(), 1);
/// assert_eq!(matches[0].path_params().get("id"), Some("42"));
/// assert!(router.find_routes("/users/42", &Method::Post).is_empty());
/// ```
#[derive(Default)]
pub struct Router {
    entries: Vec<Entry>,
    index: HashMap<Method, Vec<usize>>,
    decorators: Vec<Box<dyn Decorator>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and registers `route`.
    ///
    /// Decorators added with [`layer`](Self::layer) before this call wrap the
    /// route's handler; the first decorator registered ends up outermost.
    ///
    /// # Errors
    ///
    /// [`RouteValidationError`] if the method is not one of GET, POST, PUT,
    /// HEAD, DELETE or PATCH, or if the pattern is empty or malformed.
    pub fn add_route(&mut self, route: Route) -> Result<(), RouteValidationError> {
        debug!(method = %route.method(), pattern = route.pattern(), "adding route");

        if !route.method().is_routable() {
            return Err(RouteValidationError::UnsupportedMethod(
                route.method().clone(),
            ));
        }
        let pattern = PathPattern::parse(route.pattern())?;

        let route = if self.decorators.is_empty() {
            route
        } else {
            let mut handler = Arc::clone(route.handler());
            for decorator in self.decorators.iter().rev() {
                handler = decorator.decorate(&route, handler);
            }
            route.map_handler(|_| handler)
        };

        let position = self.entries.len();
        self.index
            .entry(route.method().clone())
            .or_default()
            .push(position);
        self.entries.push(Entry {
            route: Arc::new(route),
            pattern,
        });

        Ok(())
    }

    /// Registers a decorator for every route added after this call.
    pub fn layer(&mut self, decorator: impl Decorator) {
        self.decorators.push(Box::new(decorator));
    }

    /// Registers a `GET` route.
    ///
    /// # Errors
    ///
    /// See [`add_route`](Self::add_route).
    pub fn get<H>(&mut self, pattern: &str, handler: H) -> Result<(), RouteValidationError>
    where
        H: for<'a> Fn(&'a mut RouteContext) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.add_route(Route::new(Method::Get, pattern, handler))
    }

    /// Registers a `POST` route.
    ///
    /// # Errors
    ///
    /// See [`add_route`](Self::add_route).
    pub fn post<H>(&mut self, pattern: &str, handler: H) -> Result<(), RouteValidationError>
    where
        H: for<'a> Fn(&'a mut RouteContext) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.add_route(Route::new(Method::Post, pattern, handler))
    }

    /// Registers a `PUT` route.
    ///
    /// # Errors
    ///
    /// See [`add_route`](Self::add_route).
    pub fn put<H>(&mut self, pattern: &str, handler: H) -> Result<(), RouteValidationError>
    where
        H: for<'a> Fn(&'a mut RouteContext) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.add_route(Route::new(Method::Put, pattern, handler))
    }

    /// Registers a `HEAD` route.
    ///
    /// # Errors
    ///
    /// See [`add_route`](Self::add_route).
    pub fn head<H>(&mut self, pattern: &str, handler: H) -> Result<(), RouteValidationError>
    where
        H: for<'a> Fn(&'a mut RouteContext) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.add_route(Route::new(Method::Head, pattern, handler))
    }

    /// Registers a `DELETE` route.
    ///
    /// # Errors
    ///
    /// See [`add_route`](Self::add_route).
    pub fn delete<H>(&mut self, pattern: &str, handler: H) -> Result<(), RouteValidationError>
    where
        H: for<'a> Fn(&'a mut RouteContext) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.add_route(Route::new(Method::Delete, pattern, handler))
    }

    /// Registers a `PATCH` route.
    ///
    /// # Errors
    ///
    /// See [`add_route`](Self::add_route).
    pub fn patch<H>(&mut self, pattern: &str, handler: H) -> Result<(), RouteValidationError>
    where
        H: for<'a> Fn(&'a mut RouteContext) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.add_route(Route::new(Method::Patch, pattern, handler))
    }

    /// All routes, in registration order.
    pub fn routes(&self) -> impl Iterator<Item = &Arc<Route>> {
        self.entries.iter().map(|entry| &entry.route)
    }

    /// Routes registered under `method`, in registration order. Empty if none.
    pub fn routes_for<'a>(
        &'a self,
        method: &Method,
    ) -> impl Iterator<Item = &'a Arc<Route>> + use<'a> {
        self.entries_for(method).map(|entry| &entry.route)
    }

    fn entries_for<'a>(&'a self, method: &Method) -> impl Iterator<Item = &'a Entry> + use<'a> {
        self.index
            .get(method)
            .into_iter()
            .flatten()
            .map(move |&position| &self.entries[position])
    }

    /// Every route registered under `method` whose pattern matches `path`,
    /// in registration order.
    ///
    /// An empty result is ordinary control flow, not an error.
    pub fn find_routes(&self, path: &str, method: &Method) -> Vec<RouteMatch> {
        let matches: Vec<RouteMatch> = self
            .entries_for(method)
            .filter_map(|entry| {
                entry
                    .pattern
                    .matches(path)
                    .map(|params| RouteMatch::new(Arc::clone(&entry.route), params))
            })
            .collect();

        debug!(%method, path, matches = matches.len(), "found routes");
        matches
    }

    /// Builds the path of the route named `name` from `params`.
    ///
    /// Returns `None` if no route has that name or a parameter is missing.
    /// When several routes share a name the first registered one is used.
    pub fn uri_for(&self, name: &str, params: &Parameters) -> Option<String> {
        self.entries
            .iter()
            .find(|entry| entry.route.name() == Some(name))
            .and_then(|entry| entry.pattern.reverse(params))
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
