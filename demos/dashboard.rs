//! Login-protected dashboard.
//!
//! Run from the repository root with:
//!   RUST_LOG=info cargo run --example dashboard
//!
//! Try:
//!   curl http://localhost:8000/
//!   curl -i -X POST http://localhost:8000/auth -d 'username=bob&password=x'
//!   curl -i http://localhost:8000/dashboard                      # 401
//!   curl -i http://localhost:8000/dashboard -H 'cookie: auth=…'  # 200
//!   curl -i -X POST http://localhost:8000/logout -H 'cookie: auth=…'

use lime::{
    Access, App, Config, HandlerError, Json, Request, Response, Server, middleware,
    render, session,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Serialize)]
struct Status {
    sessions: usize,
}

#[tokio::main]
async fn main() -> Result<(), lime::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    let app = App::with_config(&config);
    let sessions = app.sessions().clone();
    let login = sessions.clone();
    let logout = sessions.clone();

    let app = app
        .middleware(middleware::logging)
        .get("/", |_: &Request, _: &mut Response| {
            render::html("demos/html/index.html", &["demos/html/site.css"], render::NO_ASSETS)
        })
        .post("/auth", move |req: &Request, res: &mut Response| -> Result<(), HandlerError> {
            let form = req.form()?;
            if form.contains_key("username") && form.contains_key("password") {
                session::start(&login, res)?;
            }
            res.redirect("/dashboard");
            Ok(())
        })
        .post("/logout", move |req: &Request, res: &mut Response| {
            session::end(&logout, req, res);
            res.redirect("/");
        })
        .route("GET", "/dashboard", Access::Protected, |_: &Request, _: &mut Response| {
            "Welcome to your dashboard!"
        })
        .route("GET", "/status", Access::Protected, move |_: &Request, _: &mut Response| {
            Json(Status { sessions: sessions.len() })
        });

    Server::with_config(config).serve(app).await
}
