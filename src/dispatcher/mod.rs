//! Per-request entry point: maps a raw request onto the application's routes.
//!
//! For every request the dispatcher
//!
//! 1. opens the application's request scope,
//! 2. reduces the request path to the path relative to the context and mount
//!    paths,
//! 3. hands ignored paths back untouched ([`Dispatch::Passthrough`]),
//! 4. runs the chain of every matching route, and
//! 5. lets the [`ErrorHandler`](crate::application::ErrorHandler) answer when
//!    no handler committed a response or a handler failed or panicked.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{Instrument, debug, debug_span, error, warn};

use crate::application::Application;
use crate::config::{ConfigError, DispatcherConfig, DispatcherSettings};
use crate::context::RouteContext;
use crate::http::{Request, Response, StatusCode};
use crate::router::{BoxFuture, HandlerError};

type PassthroughHandler = Box<dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync>;

/// Outcome of [`Dispatcher::dispatch`].
#[derive(Debug)]
pub enum Dispatch {
    /// The request is not routed here: it lies outside the mount path or
    /// under an ignore prefix. It is returned unchanged.
    Passthrough(Request),
    /// The request was routed and this is its response.
    Complete(Response),
}

/// Routes requests through an [`Application`].
///
/// Shared by every connection; all methods take `&self`.
///
/// # Examples
///
/// ```
/// use pathway::config::DispatcherSettings;
/// use pathway::{Application, Dispatcher, Method, Request, Router, StatusCode};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut router = Router::new();
/// router
///     .get("/hello/{name}", |ctx| {
///         Box::pin(async move {
///             let greeting = format!("hello {}", ctx.param("name").unwrap_or("?"));
///             ctx.response_mut().send(greeting)?;
///             Ok(())
///         })
///     })
///     .unwrap();
///
/// let dispatcher = Dispatcher::new(Application::new(router), DispatcherSettings::new());
/// let response = dispatcher.handle(Request::new(Method::Get, "/hello/ana")).await;
///
/// assert_eq!(response.status(), StatusCode::Ok);
/// assert_eq!(response.body_bytes(), b"hello ana");
/// # }
/// ```
pub struct Dispatcher {
    application: Arc<Application>,
    settings: DispatcherSettings,
    passthrough: Option<PassthroughHandler>,
}

impl Dispatcher {
    pub fn new(application: Application, settings: DispatcherSettings) -> Self {
        Self {
            application: Arc::new(application),
            settings,
            passthrough: None,
        }
    }

    /// Builds a dispatcher from the `[dispatcher]` configuration section.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidMountPath`] if the mount mapping is malformed.
    pub fn from_config(
        application: Application,
        config: &DispatcherConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(application, config.settings()?))
    }

    /// Sets what [`handle`](Self::handle) does with requests that are not
    /// routed here, e.g. a static file service for an ignored prefix.
    #[must_use]
    pub fn with_passthrough<H, F>(mut self, handler: H) -> Self
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.passthrough = Some(Box::new(move |request| Box::pin(handler(request))));
        self
    }

    pub fn application(&self) -> &Arc<Application> {
        &self.application
    }

    pub fn settings(&self) -> &DispatcherSettings {
        &self.settings
    }

    /// Routes one request.
    pub async fn dispatch(&self, request: Request) -> Dispatch {
        let span = debug_span!(
            "dispatch",
            app = %self.application.name(),
            method = %request.method(),
            path = %request.path()
        );
        self.route(request).instrument(span).await
    }

    /// Routes one request and always produces a response.
    ///
    /// Passed-through requests go to the [`with_passthrough`](Self::with_passthrough)
    /// handler, or receive a bare `404 Not Found` when there is none.
    pub async fn handle(&self, request: Request) -> Response {
        match self.dispatch(request).await {
            Dispatch::Complete(response) => response,
            Dispatch::Passthrough(request) => match &self.passthrough {
                Some(passthrough) => passthrough(request).await,
                None => Response::new(StatusCode::NotFound)
                    .body(StatusCode::NotFound.canonical_reason()),
            },
        }
    }

    async fn route(&self, request: Request) -> Dispatch {
        let _scope = self.application.enter();

        let Some(relative) = self.relative_path(request.path()) else {
            debug!("outside the mount path, passing through");
            return Dispatch::Passthrough(request);
        };
        if self.is_ignored(&relative) {
            debug!(relative = %relative, "ignored path, passing through");
            return Dispatch::Passthrough(request);
        }

        let matches = self
            .application
            .router()
            .find_routes(&relative, request.method());

        let (request, mut response, outcome) = if matches.is_empty() {
            (request, Response::default(), Ok(()))
        } else {
            let mut ctx = RouteContext::new(
                Arc::clone(&self.application),
                request,
                Response::default(),
                matches,
            );
            let outcome = match AssertUnwindSafe(ctx.next()).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(payload) => Err(HandlerError::Panicked(panic_message(payload.as_ref()))),
            };
            let (request, response) = ctx.into_parts();
            (request, response, outcome)
        };

        let error_handler = self.application.error_handler();
        match outcome {
            Ok(()) if !response.is_committed() => {
                warn!(relative = %relative, "no handler committed a response");
                error_handler.handle_status(StatusCode::NotFound, &request, &mut response);
            }
            Ok(()) => {}
            Err(e) => {
                error!(error = %e, "handler failed");
                if response.is_committed() {
                    debug!("response already committed, error handler skipped");
                } else {
                    error_handler.handle_error(&e, &request, &mut response);
                }
            }
        }

        Dispatch::Complete(response)
    }

    /// Path below the context and mount paths, with a leading `/` and no
    /// trailing `/` (except for the root itself). `None` when `path` is not
    /// under them.
    fn relative_path(&self, path: &str) -> Option<String> {
        let rest = strip_segments(path, self.settings.context_path())?;
        let rest = strip_segments(rest, self.settings.mount_path())?;

        let mut relative = format!("/{}", rest.trim_start_matches('/'));
        if relative.len() > 1 && relative.ends_with('/') {
            relative.pop();
        }
        Some(relative)
    }

    fn is_ignored(&self, relative: &str) -> bool {
        let relative = relative.trim_start_matches('/');
        self.settings
            .ignore_paths()
            .iter()
            .any(|prefix| relative.starts_with(prefix.as_str()))
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("application", &self.application)
            .field("settings", &self.settings)
            .field("passthrough", &self.passthrough.is_some())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

/// Strips `prefix` from the start of `path` on a segment boundary, so that
/// `/admin` is stripped from `/admin/users` but not from `/administrator`.
fn strip_segments<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        return Some(path);
    }
    let rest = path.trim_start_matches('/').strip_prefix(prefix)?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;
    use crate::router::Router;

    fn settings(context: &str, mount: &str) -> DispatcherSettings {
        DispatcherSettings::new()
            .with_context_path(context)
            .with_mount_path(mount)
            .unwrap()
    }

    fn dispatcher(settings: DispatcherSettings) -> Dispatcher {
        let mut router = Router::new();
        router
            .get("/users", |ctx| {
                Box::pin(async move {
                    ctx.response_mut().send("users")?;
                    Ok(())
                })
            })
            .unwrap();
        Dispatcher::new(Application::new(router), settings)
    }

    #[test]
    fn relative_path_strips_context_and_mount() {
        let d = dispatcher(settings("/app", "admin"));
        assert_eq!(d.relative_path("/app/admin/users/").as_deref(), Some("/users"));
        assert_eq!(d.relative_path("/app/admin").as_deref(), Some("/"));
        assert_eq!(d.relative_path("/app/admin/").as_deref(), Some("/"));
        assert_eq!(d.relative_path("/app/admin/a/b").as_deref(), Some("/a/b"));
    }

    #[test]
    fn relative_path_respects_segment_boundaries() {
        let d = dispatcher(settings("/app", "/admin/*"));
        assert_eq!(d.relative_path("/app/administrator"), None);
        assert_eq!(d.relative_path("/application/admin"), None);
        assert_eq!(d.relative_path("/other"), None);
    }

    #[test]
    fn root_deployment_keeps_the_path() {
        let d = dispatcher(DispatcherSettings::new());
        assert_eq!(d.relative_path("/").as_deref(), Some("/"));
        assert_eq!(d.relative_path("").as_deref(), Some("/"));
        assert_eq!(d.relative_path("/users/").as_deref(), Some("/users"));
    }

    #[test]
    fn ignore_prefixes_match_the_relative_path() {
        let d = dispatcher(settings("", "").with_ignore_path("/static"));
        assert!(d.is_ignored("/static/css/site.css"));
        assert!(d.is_ignored("/static"));
        assert!(!d.is_ignored("/users"));
        assert!(!d.is_ignored("/"));
    }

    #[tokio::test]
    async fn ignored_request_is_handed_back_unchanged() {
        let d = dispatcher(settings("/app", "").with_ignore_path("static"));
        let request = Request::new(Method::Get, "/app/static/logo.png?v=3");

        match d.dispatch(request).await {
            Dispatch::Passthrough(request) => {
                assert_eq!(request.path(), "/app/static/logo.png");
                assert_eq!(request.query_param("v"), Some("3"));
            }
            Dispatch::Complete(response) => panic!("unexpected response {:?}", response.status()),
        }
        assert_eq!(d.application().active_requests(), 0);
    }

    #[tokio::test]
    async fn handle_routes_and_falls_back() {
        let d = dispatcher(settings("/app", "admin"));

        let ok = d.handle(Request::new(Method::Get, "/app/admin/users/")).await;
        assert_eq!(ok.status(), StatusCode::Ok);
        assert_eq!(ok.body_bytes(), b"users");

        let missing = d.handle(Request::new(Method::Get, "/app/admin/nope")).await;
        assert_eq!(missing.status(), StatusCode::NotFound);
        assert!(missing.is_committed());

        let outside = d.handle(Request::new(Method::Get, "/elsewhere")).await;
        assert_eq!(outside.status(), StatusCode::NotFound);
        assert!(!outside.is_committed());
    }

    #[tokio::test]
    async fn passthrough_handler_serves_unrouted_requests() {
        let d = dispatcher(settings("", "").with_ignore_path("assets")).with_passthrough(
            |request: Request| async move {
                Response::new(StatusCode::Ok).body(format!("asset {}", request.path()))
            },
        );

        let response = d.handle(Request::new(Method::Get, "/assets/app.js")).await;
        assert_eq!(response.body_bytes(), b"asset /assets/app.js");
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn info_subscriber(logs: &CapturedLogs) -> impl tracing::Subscriber + Send + Sync {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(logs.clone())
            .finish()
    }

    #[tokio::test]
    async fn failure_after_commit_is_logged_as_error() {
        let logs = CapturedLogs::default();
        let _guard = tracing::subscriber::set_default(info_subscriber(&logs));

        let mut router = Router::new();
        router
            .get("/save", |ctx| {
                Box::pin(async move {
                    ctx.response_mut().send("ok")?;
                    Err(HandlerError::msg("db write failed after send"))
                })
            })
            .unwrap();
        let d = Dispatcher::new(Application::new(router), DispatcherSettings::new());

        let response = d.handle(Request::new(Method::Get, "/save")).await;

        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.body_bytes(), b"ok");
        let text = logs.text();
        assert!(text.contains("ERROR"), "{text}");
        assert!(text.contains("db write failed after send"), "{text}");
    }

    #[tokio::test]
    async fn panicking_handler_reaches_the_error_handler() {
        let mut router = Router::new();
        router
            .get("/panic", |_ctx| {
                Box::pin(async move {
                    if true {
                        panic!("index out of range");
                    }
                    Ok(())
                })
            })
            .unwrap();
        let d = Dispatcher::new(Application::new(router), DispatcherSettings::new());

        let response = d.handle(Request::new(Method::Get, "/panic")).await;

        assert_eq!(response.status(), StatusCode::InternalServerError);
        assert!(response.is_committed());
        assert_eq!(d.application().active_requests(), 0);
    }

    #[test]
    fn panic_payloads_become_messages() {
        let text: Box<dyn Any + Send> = Box::new("static text");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned text"));
        let other: Box<dyn Any + Send> = Box::new(7u8);

        assert_eq!(panic_message(text.as_ref()), "static text");
        assert_eq!(panic_message(owned.as_ref()), "owned text");
        assert_eq!(panic_message(other.as_ref()), "unknown panic payload");
    }
}
