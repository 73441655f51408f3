//! The request dispatcher.
//!
//! [`App`] owns everything a request touches: the middleware chain, the
//! route table, the session store and the request counter. Its
//! [`dispatch`](App::dispatch) method is the whole per-request lifecycle:
//!
//! ```text
//! Accepted → MiddlewareApplied ─┬─ RouteNotFound ──────────────────────→ 404
//!                               └─ RouteMatched ─┬─ Unauthorized ──────→ 401
//!                                                └─ Authorized → HandlerInvoked
//!                                                     ├─ Ok(body) ─────→ 200 (or handler's status)
//!                                                     ├─ Err(BadRequest) → 400
//!                                                     └─ Err(_) / panic ─→ 500
//! ```
//!
//! `dispatch` is synchronous and needs no network, which is also how the
//! tests drive it. The server runs it on the blocking pool.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::cookie::{self, AUTH_COOKIE};
use crate::error::HandlerError;
use crate::handler::{ErasedHandler, Handler};
use crate::middleware::Chain;
use crate::request::Request;
use crate::response::Response;
use crate::router::{Access, Route, Router};
use crate::session::SessionStore;
use crate::status::Status;

/// An application: middleware, routes and sessions.
///
/// Build it once at startup and hand it to [`Server::serve`](crate::Server::serve).
///
/// ```rust
/// use lime::{Access, App, Request, Response, middleware};
///
/// fn dashboard(_req: &Request, _res: &mut Response) -> &'static str {
///     "Welcome to your dashboard!"
/// }
///
/// let app = App::new()
///     .middleware(middleware::logging)
///     .get("/", |_req: &Request, _res: &mut Response| "<h1>home</h1>")
///     .route("GET", "/dashboard", Access::Protected, dashboard);
/// ```
pub struct App {
    router: Router,
    chain: Chain,
    sessions: SessionStore,
    requests: AtomicU64,
}

impl App {
    /// An empty application with a fresh session store.
    pub fn new() -> Self {
        Self::with_sessions(SessionStore::new())
    }

    /// An empty application whose sessions, and the `auth` cookies issued
    /// for them, live for `config.session_ttl`. Pair it with the same config
    /// passed to [`Server::with_config`](crate::Server::with_config).
    pub fn with_config(config: &Config) -> Self {
        Self::with_sessions(SessionStore::with_ttl(config.session_ttl))
    }

    /// An empty application backed by `sessions`. Handlers that log users in
    /// capture a clone of the same store.
    pub fn with_sessions(sessions: SessionStore) -> Self {
        Self {
            router: Router::default(),
            chain: Chain::default(),
            sessions,
            requests: AtomicU64::new(0),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Appends `f` to the middleware chain.
    pub fn middleware<F>(mut self, f: F) -> Self
    where
        F: Fn(Request, Response) -> (Request, Response) + Send + Sync + 'static,
    {
        self.chain.push(f);
        self
    }

    /// Registers a route.
    ///
    /// `method` must be `"GET"` or `"POST"` and `path` must start with `/`;
    /// anything else is logged and the route is dropped. If the pair is
    /// already registered the earlier route keeps serving it.
    pub fn route(mut self, method: &str, path: &str, access: Access, handler: impl Handler) -> Self {
        self.router.register(method, path, access, handler);
        self
    }

    /// Public `GET` route.
    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.route("GET", path, Access::Public, handler)
    }

    /// Public `POST` route.
    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.route("POST", path, Access::Public, handler)
    }

    /// Number of requests dispatched so far.
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn route_count(&self) -> usize {
        self.router.len()
    }

    /// Runs one request through middleware, routing, authorization and the
    /// handler, and returns the response to write.
    pub fn dispatch(&self, req: Request) -> Response {
        let (req, mut res) = self.chain.run(req, Response::new());
        self.requests.fetch_add(1, Ordering::Relaxed);

        let Some(route) = self.router.find(req.method(), req.path()) else {
            warn!(method = req.method(), path = req.path(), "[404] route not found");
            res.fail(Status::NotFound);
            return res;
        };

        if route.access == Access::Protected && !self.authorize(&req) {
            warn!(method = req.method(), path = req.path(), "[401] access denied");
            res.fail(Status::Unauthorized);
            return res;
        }

        self.invoke(route, &req, res)
    }

    /// Decides access to a protected route.
    ///
    /// Cookies are resolved first. An `auth` cookie the client presents as
    /// already expired names a session that must not outlive it, so that
    /// session is destroyed here. Access is then granted iff a live `auth`
    /// cookie names an existing session.
    fn authorize(&self, req: &Request) -> bool {
        let (jar, expired) = cookie::resolve(req, Utc::now());

        for stale in expired.iter().filter(|c| c.name == AUTH_COOKIE) {
            if self.sessions.destroy(&stale.value) {
                info!(path = req.path(), "expired auth cookie presented, session reaped");
            }
        }

        jar.value(AUTH_COOKIE)
            .is_some_and(|token| self.sessions.lookup(token))
    }

    /// Runs the handler. On failure the error page is built from the
    /// response as middleware left it, so headers the handler added (a
    /// half-issued `Set-Cookie`, a `Location`) are dropped.
    fn invoke(&self, route: &Route, req: &Request, mut res: Response) -> Response {
        let mut prepared = res.clone();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| route.handler.call(req, &mut res)));

        let status = match outcome {
            Ok(Ok(body)) => return res.finish(body),
            Ok(Err(HandlerError::BadRequest(e))) => {
                warn!(method = req.method(), path = req.path(), error = %e, "[400] malformed request");
                Status::BadRequest
            }
            Ok(Err(e)) => {
                error!(method = req.method(), path = req.path(), error = %e, "[500] handler failed");
                Status::InternalServerError
            }
            Err(panic) => {
                error!(
                    method = req.method(),
                    path = req.path(),
                    panic = %panic_message(panic.as_ref()),
                    "[500] handler panicked"
                );
                Status::InternalServerError
            }
        };
        prepared.fail(status);
        prepared
    }
}

impl Default for App {
    fn default() -> Self { Self::new() }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
