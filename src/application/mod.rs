//! The application a dispatcher serves: a frozen router, an error handler and
//! shared state.
//!
//! Handlers reach the application through
//! [`RouteContext::application`](crate::context::RouteContext::application);
//! there is no global "current application".

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;

use crate::context::Extensions;
use crate::router::Router;

mod error_handler;

pub use error_handler::{DefaultErrorHandler, ErrorHandler};

/// A router plus everything request handling needs besides it.
///
/// Built once at start-up. Moving the [`Router`] in here freezes the route set:
/// no `&mut` access to it remains once the application is shared.
///
/// # Examples
///
/// ```
/// use pathway::{Application, Router};
///
/// struct Greeting(&'static str);
///
/// let app = Application::new(Router::new())
///     .named("demo")
///     .with_state(Greeting("hello"));
///
/// assert_eq!(app.name(), "demo");
/// assert_eq!(app.state::<Greeting>().map(|g| g.0), Some("hello"));
/// ```
pub struct Application {
    name: String,
    router: Router,
    error_handler: Box<dyn ErrorHandler>,
    state: Extensions,
    active_requests: AtomicUsize,
}

impl Application {
    /// Creates an application using [`DefaultErrorHandler`].
    pub fn new(router: Router) -> Self {
        Self {
            name: String::from("pathway"),
            router,
            error_handler: Box::new(DefaultErrorHandler),
            state: Extensions::new(),
            active_requests: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replaces the error handler used for "not found" and handler failures.
    #[must_use]
    pub fn with_error_handler(mut self, error_handler: impl ErrorHandler) -> Self {
        self.error_handler = Box::new(error_handler);
        self
    }

    /// Stores a value every handler can read through [`Application::state`].
    #[must_use]
    pub fn with_state<T>(mut self, value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        self.state.insert(value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn error_handler(&self) -> &dyn ErrorHandler {
        self.error_handler.as_ref()
    }

    pub fn state<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.state.get::<T>()
    }

    /// Number of requests currently inside [`Application::enter`] scopes.
    pub fn active_requests(&self) -> usize {
        self.active_requests.load(Ordering::Acquire)
    }

    /// Opens the scope of one request. The scope closes when the guard drops,
    /// on every exit path.
    pub fn enter(self: &Arc<Self>) -> RequestScope {
        let active = self.active_requests.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(app = %self.name, active, "request scope opened");
        RequestScope {
            application: Arc::clone(self),
        }
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("name", &self.name)
            .field("routes", &self.router.len())
            .field("active_requests", &self.active_requests())
            .finish_non_exhaustive()
    }
}

/// Guard for one request's use of an [`Application`].
#[must_use = "the request scope closes as soon as the guard is dropped"]
#[derive(Debug)]
pub struct RequestScope {
    application: Arc<Application>,
}

impl RequestScope {
    pub fn application(&self) -> &Arc<Application> {
        &self.application
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        let active = self
            .application
            .active_requests
            .fetch_sub(1, Ordering::AcqRel)
            - 1;
        trace!(app = %self.application.name, active, "request scope closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_tracks_active_requests() {
        let app = Arc::new(Application::new(Router::new()));
        assert_eq!(app.active_requests(), 0);

        let first = app.enter();
        let second = app.enter();
        assert_eq!(app.active_requests(), 2);
        assert!(Arc::ptr_eq(first.application(), &app));

        drop(first);
        assert_eq!(app.active_requests(), 1);
        drop(second);
        assert_eq!(app.active_requests(), 0);
    }

    #[test]
    fn scope_closes_during_unwinding() {
        let app = Arc::new(Application::new(Router::new()));
        let inner = Arc::clone(&app);

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _scope = inner.enter();
            panic!("handler blew up");
        }));

        assert!(outcome.is_err());
        assert_eq!(app.active_requests(), 0);
    }

    #[test]
    fn state_is_typed() {
        let app = Application::new(Router::new()).with_state(7u64);
        assert_eq!(app.state::<u64>(), Some(&7));
        assert_eq!(app.state::<u32>(), None);
    }
}
