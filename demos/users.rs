//! A small user directory served through pathway.
//!
//! ```text
//! cargo run --example users [config.toml]
//! curl http://localhost:8338/users/1
//! curl http://localhost:8338/assets/readme.txt
//! ```

use std::collections::HashMap;
use std::sync::RwLock;

use pathway::http::{Method, StatusCode};
use pathway::middleware::{LoggerLayer, RequestLogger};
use pathway::{
    Application, Config, Dispatcher, HandlerError, Parameters, Route, Router, Server, StaticFiles,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Serialize, Deserialize)]
struct User {
    name: String,
}

#[derive(Default)]
struct Directory(RwLock<HashMap<u32, User>>);

fn routes() -> Result<Router, Box<dyn std::error::Error>> {
    let mut router = Router::new();
    router.add_route(Route::new(Method::Get, "/{path*}", RequestLogger))?;
    router.layer(LoggerLayer);

    router.add_route(
        Route::new(
            Method::Get,
            "/users/{id}",
            pathway::handler_fn(|ctx| {
                Box::pin(async move {
                    let id: u32 = ctx
                        .param("id")
                        .and_then(|id| id.parse().ok())
                        .ok_or_else(|| HandlerError::msg("user id must be a number"))?;
                    let user = ctx
                        .application()
                        .state::<Directory>()
                        .and_then(|dir| dir.0.read().ok()?.get(&id).cloned());
                    match user {
                        Some(user) => ctx.response_mut().json(&user)?,
                        None => ctx.next().await?,
                    }
                    Ok(())
                })
            }),
        )
        .named("user"),
    )?;

    router.post("/users/{id}", |ctx| {
        Box::pin(async move {
            let id: u32 = ctx
                .param("id")
                .and_then(|id| id.parse().ok())
                .ok_or_else(|| HandlerError::msg("user id must be a number"))?;
            let user: User = ctx.request().json()?;
            if let Some(dir) = ctx.application().state::<Directory>() {
                if let Ok(mut users) = dir.0.write() {
                    users.insert(id, user);
                }
            }

            let mut params = Parameters::new();
            params.insert("id", id.to_string());
            let location = ctx
                .application()
                .router()
                .uri_for("user", &params)
                .unwrap_or_default();

            let response = ctx.response_mut();
            response.set_status(StatusCode::Created);
            response.add_header("Location", location);
            response.send("created")?;
            Ok(())
        })
    })?;

    router.get("/", |ctx| {
        Box::pin(async move {
            ctx.response_mut().redirect("/users/1")?;
            Ok(())
        })
    })?;

    router.add_route(Route::new(
        Method::Get,
        "/assets/{path*}",
        StaticFiles::new("demos/assets"),
    ))?;

    Ok(router)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let directory = Directory::default();
    if let Ok(mut users) = directory.0.write() {
        users.insert(
            1,
            User {
                name: "Ada".to_string(),
            },
        );
    }

    let app = Application::new(routes()?)
        .named("users")
        .with_state(directory);
    let dispatcher = Dispatcher::from_config(app, &config.dispatcher)?;

    let server = Server::bind(config.server.address()).await?;
    tracing::info!("try http://{}/users/1", server.local_addr());
    server.serve(dispatcher).await?;
    Ok(())
}
