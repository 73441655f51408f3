//! # lime
//!
//! A minimal HTTP application server: middleware, exact-match routes, and
//! cookie sessions guarding protected pages.
//!
//! ## How a request is served
//!
//! 1. Every registered middleware runs, in order, over the request and a
//!    fresh `200` response.
//! 2. The route table is scanned for an exact (method, path) match. No
//!    match: `404`.
//! 3. A [`Protected`](Access::Protected) route requires an `auth` cookie
//!    naming a live session. Otherwise: `401`.
//! 4. The handler runs and returns the body. Bodies that look like JSON are
//!    served as `application/json`, the rest as `text/html`.
//! 5. A handler error becomes `400` (malformed form body) or `500`; a panic
//!    becomes `500`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use lime::{Access, App, HandlerError, Request, Response, Server, middleware, session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), lime::Error> {
//!     let app = App::new().middleware(middleware::logging);
//!     let sessions = app.sessions().clone();
//!
//!     let app = app
//!         .post("/auth", move |req: &Request, res: &mut Response| -> Result<(), HandlerError> {
//!             let form = req.form()?;
//!             if form.get("username").is_some() {
//!                 session::start(&sessions, res)?;
//!             }
//!             res.redirect("/dashboard");
//!             Ok(())
//!         })
//!         .route("GET", "/dashboard", Access::Protected, dashboard);
//!
//!     Server::bind(([127, 0, 0, 1], 8000).into()).serve(app).await
//! }
//!
//! fn dashboard(_req: &Request, _res: &mut Response) -> &'static str {
//!     "Welcome to your dashboard!"
//! }
//! ```

mod dispatcher;
mod error;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;
mod status;

pub mod config;
pub mod cookie;
pub mod middleware;
pub mod render;
pub mod session;
pub mod token;

pub use config::Config;
pub use cookie::SetCookie;
pub use dispatcher::App;
pub use error::{Error, FormError, HandlerError};
pub use handler::{Handler, IntoBody, Json};
pub use method::Method;
pub use request::Request;
pub use response::{ContentType, Response, infer_content_type};
pub use router::Access;
pub use server::{DRAIN_GRACE, Server};
pub use session::{Session, SessionStore};
pub use status::Status;
pub use token::generate_token;
