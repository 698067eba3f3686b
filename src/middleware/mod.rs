//! Built-in request logging, in both shapes handlers can wrap each other.
//!
//! - [`RequestLogger`] is a route handler meant for a catch-all route
//!   registered before the content routes. It times the rest of the chain by
//!   awaiting [`RouteContext::next`].
//! - [`LoggerLayer`] is a [`Decorator`]: installed with
//!   [`Router::layer`](crate::Router::layer), it wraps every route added after
//!   it in a [`Logger`].
//!
//! Both emit one `tracing::info!` line per request in the form
//!
//! ```text
//! METHOD /path - STATUS (duration)
//! ```
//!
//! and a `warn!` line instead when a handler fails.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::context::RouteContext;
use crate::http::Method;
use crate::router::{BoxFuture, Decorator, HandlerResult, Route, RouteHandler};

/// Catch-all handler that logs the outcome of the handlers matched after it.
///
/// # Examples
///
/// ```
/// use pathway::http::Method;
/// use pathway::middleware::RequestLogger;
/// use pathway::{Route, Router};
///
/// let mut router = Router::new();
/// router.add_route(Route::new(Method::Get, "/{path*}", RequestLogger)).unwrap();
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestLogger;

impl RouteHandler for RequestLogger {
    fn handle<'a>(&'a self, ctx: &'a mut RouteContext) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let log = AccessLog::begin(ctx);
            let result = ctx.next().await;
            log.finish("*", ctx, &result);
            result
        })
    }
}

/// A route handler wrapped with access logging.
pub struct Logger {
    route: String,
    inner: Arc<dyn RouteHandler>,
}

impl Logger {
    pub fn new(route: &Route, inner: Arc<dyn RouteHandler>) -> Self {
        Self {
            route: route.to_string(),
            inner,
        }
    }
}

impl RouteHandler for Logger {
    fn handle<'a>(&'a self, ctx: &'a mut RouteContext) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let log = AccessLog::begin(ctx);
            let result = self.inner.handle(ctx).await;
            log.finish(&self.route, ctx, &result);
            result
        })
    }
}

/// Wraps each route registered after it in a [`Logger`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggerLayer;

impl Decorator for LoggerLayer {
    fn decorate(&self, route: &Route, handler: Arc<dyn RouteHandler>) -> Arc<dyn RouteHandler> {
        Arc::new(Logger::new(route, handler))
    }
}

struct AccessLog {
    start: Instant,
    method: Method,
    path: String,
}

impl AccessLog {
    fn begin(ctx: &RouteContext) -> Self {
        Self {
            start: Instant::now(),
            method: ctx.request().method().clone(),
            path: ctx.request().path().to_owned(),
        }
    }

    fn finish(self, route: &str, ctx: &RouteContext, result: &HandlerResult) {
        let duration = self.start.elapsed();
        let response = ctx.response();
        match result {
            Ok(()) => info!(
                route,
                committed = response.is_committed(),
                "{} {} - {} ({:?})",
                self.method,
                self.path,
                response.status().as_u16(),
                duration
            ),
            Err(e) => warn!(
                route,
                error = %e,
                "{} {} - failed ({:?})",
                self.method,
                self.path,
                duration
            ),
        }
    }
}
