//! Ready-made route handlers.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::context::RouteContext;
use crate::router::{BoxFuture, HandlerResult, RouteHandler};

/// Serves files below a base directory from a wildcard route.
///
/// The file is named by the route's wildcard parameter (`path` unless changed
/// with [`param`](Self::param)). A remainder that could leave the base
/// directory (`..`, absolute paths) or names no regular file does not commit
/// the response; the chain simply continues, so the dispatcher's not-found
/// fallback answers unless a later route does.
///
/// # Examples
///
/// ```
/// use pathway::handler::StaticFiles;
/// use pathway::http::Method;
/// use pathway::{Route, Router};
///
/// let mut router = Router::new();
/// router
///     .add_route(Route::new(Method::Get, "/public/{path*}", StaticFiles::new("./public")))
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct StaticFiles {
    base_dir: PathBuf,
    param: String,
}

impl StaticFiles {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            param: String::from("path"),
        }
    }

    /// Reads the file name from the parameter `name` instead of `path`.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.param = name.into();
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Joins `resource` onto the base directory, or `None` if it is empty or
    /// has any component other than a plain name.
    fn resolve(&self, resource: &str) -> Option<PathBuf> {
        let relative = Path::new(resource);
        let plain = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        (!resource.is_empty() && plain).then(|| self.base_dir.join(relative))
    }
}

impl RouteHandler for StaticFiles {
    fn handle<'a>(&'a self, ctx: &'a mut RouteContext) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let resource = ctx.param(&self.param).unwrap_or_default().to_owned();
            let Some(path) = self.resolve(&resource) else {
                warn!(resource = %resource, "refusing resource path outside the base directory");
                return ctx.next().await;
            };

            let is_file = match fs::metadata(&path).await {
                Ok(metadata) => metadata.is_file(),
                Err(e) if e.kind() == ErrorKind::NotFound => false,
                Err(e) => return Err(e.into()),
            };
            if !is_file {
                warn!(path = %path.display(), "the resource could not be found");
                return ctx.next().await;
            }

            let contents = fs::read(&path).await?;
            debug!(path = %path.display(), bytes = contents.len(), "serving file");
            let response = ctx.response_mut();
            response.add_header("Content-Type", content_type(&path));
            response.send_bytes(contents)?;
            Ok(())
        })
    }
}

fn content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
}
