//! Per-request context handed to every route handler.
//!
//! A [`RouteContext`] bundles everything one request needs while its handler
//! chain runs: the [`Request`], the [`Response`] being built, the
//! [`RouteHandlerChain`] of remaining matches, a type-keyed [`Extensions`] map,
//! and the [`Application`] serving it. Handlers continue the chain by awaiting
//! [`RouteContext::next`] and stop it by returning without doing so.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
    sync::Arc,
};

use tracing::debug;

use crate::application::Application;
use crate::router::{BoxFuture, HandlerResult, RouteHandlerChain, RouteMatch};
use crate::{Request, Response};

/// Type-erased map keyed by type, used to share state without handlers
/// knowing about each other's types.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning the previous value of the same type.
    pub fn insert<T>(&mut self, value: T) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|previous| previous.downcast::<T>().ok())
            .map(|previous| *previous)
    }

    pub fn get<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn get_mut<T>(&mut self) -> Option<&mut T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
    }

    pub fn remove<T>(&mut self) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.map.len())
            .finish()
    }
}

/// String-keyed, string-valued path parameters bound by one route match.
///
/// Converting values into typed data is left to the caller.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Parameters {
    map: HashMap<String, String>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.map.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.map.remove(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates `(name, value)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for Parameters
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            map: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// The request, response and remaining handler chain for one request.
///
/// Owned by the dispatcher for the duration of a single request and lent to
/// each handler as `&mut RouteContext`.
pub struct RouteContext {
    application: Arc<Application>,
    request: Request,
    response: Response,
    chain: RouteHandlerChain,
    extensions: Extensions,
}

impl RouteContext {
    /// Creates a context positioned before the first of `matches`.
    pub fn new(
        application: Arc<Application>,
        request: Request,
        response: Response,
        matches: Vec<RouteMatch>,
    ) -> Self {
        Self {
            application,
            request,
            response,
            chain: RouteHandlerChain::new(matches),
            extensions: Extensions::new(),
        }
    }

    /// The application serving this request.
    pub fn application(&self) -> &Arc<Application> {
        &self.application
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Path parameters bound by the route currently executing.
    pub fn params(&self) -> &Parameters {
        self.request.path_params()
    }

    /// Shorthand for `ctx.params().get(name)`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.request.path_param(name)
    }

    /// Request-scoped state shared between the handlers of one chain.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    pub fn chain(&self) -> &RouteHandlerChain {
        &self.chain
    }

    /// Runs the next matching route's handler.
    ///
    /// - If the response is already committed, every remaining match is skipped
    ///   without running its handler.
    /// - Otherwise the next match's bindings replace the request's path
    ///   parameters, the match is consumed, and its handler runs with this
    ///   context. A handler that awaits `next()` again therefore reaches the
    ///   following match, never itself.
    /// - When no match remains this is a no-op.
    ///
    /// Handler errors are returned unchanged; the chain does not advance past
    /// a failed handler on its own.
    pub fn next(&mut self) -> BoxFuture<'_, HandlerResult> {
        Box::pin(async move {
            if self.response.is_committed() {
                for skipped in self.chain.skip_remaining() {
                    debug!(route = %skipped.route(), "response committed, skipping");
                }
                return Ok(());
            }

            let Some(route_match) = self.chain.advance() else {
                return Ok(());
            };
            let route = Arc::clone(route_match.route());
            let params = route_match.path_params().clone();

            debug!(route = %route, params = params.len(), "calling handler");
            self.request.set_path_params(params);

            let handler = Arc::clone(route.handler());
            handler.handle(self).await
        })
    }

    /// Takes the request and response back out once the chain is done.
    pub fn into_parts(self) -> (Request, Response) {
        (self.request, self.response)
    }
}

impl fmt::Debug for RouteContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteContext")
            .field("method", self.request.method())
            .field("path", &self.request.path())
            .field("committed", &self.response.is_committed())
            .field("remaining", &self.chain.remaining())
            .finish()
    }
}
