//! # pathway
//!
//! Request routing and dispatch for async HTTP/1.1 services.
//!
//! A [`Router`] maps `(method, path pattern)` pairs to handlers. For every
//! request **all** matching routes run as one ordered chain: a handler
//! continues it by awaiting [`RouteContext::next`] and ends it by returning.
//! Once a handler commits the response, the rest of the chain is skipped.
//! The [`Dispatcher`] strips the deployment prefix, runs the chain and falls
//! back to the application's error handler when nobody answered.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pathway::config::DispatcherSettings;
//! use pathway::middleware::RequestLogger;
//! use pathway::{Application, Dispatcher, Method, Route, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut router = Router::new();
//!     router.add_route(Route::new(Method::Get, "/{path*}", RequestLogger))?;
//!     router.get("/users/{id}", |ctx| Box::pin(async move {
//!         let body = format!("user {}", ctx.param("id").unwrap_or_default());
//!         ctx.response_mut().send(body)?;
//!         Ok(())
//!     }))?;
//!
//!     let dispatcher = Dispatcher::new(Application::new(router), DispatcherSettings::new());
//!     let server = Server::bind("127.0.0.1:8338").await?;
//!     println!("Listening on http://{}", server.local_addr());
//!     server.serve(dispatcher).await?;
//!     Ok(())
//! }
//! ```

pub mod application;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod handler;
pub mod http;
pub mod middleware;
pub mod router;
pub mod server;

pub use application::{Application, DefaultErrorHandler, ErrorHandler, RequestScope};
pub use config::{Config, ConfigError};
pub use context::{Extensions, Parameters, RouteContext};
pub use dispatcher::{Dispatch, Dispatcher};
pub use handler::StaticFiles;
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::{
    HandlerError, HandlerResult, Route, RouteHandler, RouteMatch, RouteValidationError, Router,
    handler_fn,
};
pub use server::{Server, ServerError};
