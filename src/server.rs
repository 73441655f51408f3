//! HTTP server, per-request execution and graceful shutdown.
//!
//! # Request lifecycle
//!
//! The accept loop is a single task. Each connection gets its own task,
//! driven by hyper. For each request on it:
//!
//! 1. The body is read completely (an I/O suspension point). A body larger
//!    than the configured maximum is answered with `413 Content Too Large`.
//! 2. [`App::dispatch`] runs on tokio's blocking pool, bounded by the
//!    configured request timeout. Middleware and handlers are synchronous and
//!    may block without stalling other connections.
//! 3. The response is written back (the other suspension point).
//!
//! A dispatch that overruns the timeout is answered with
//! `503 Service Unavailable`; its blocking thread is left to finish on its
//! own. A panic that escapes dispatch (handler panics are already caught
//! inside it) is answered with `500`. Neither affects the accept loop or
//! other connections.
//!
//! # Graceful shutdown
//!
//! On SIGTERM or Ctrl-C the server stops accepting and asks every
//! connection to close. Idle keep-alive connections close at once; those
//! with a request in flight get [`DRAIN_GRACE`] to finish it. Whatever is
//! left is aborted and the server returns.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::dispatcher::{App, panic_message};
use crate::error::Error;
use crate::request::Request;
use crate::response::Response;
use crate::session::SessionStore;
use crate::status::Status;

/// How long shutdown waits for in-flight connections before aborting them.
pub const DRAIN_GRACE: Duration = Duration::from_secs(10);

/// The HTTP server.
pub struct Server {
    config: Config,
}

impl Server {
    /// A server on `addr` with default settings otherwise.
    ///
    /// ```rust,no_run
    /// use lime::{App, Server};
    ///
    /// # async fn run() -> Result<(), lime::Error> {
    /// Server::bind(([127, 0, 0, 1], 8000).into()).serve(App::new()).await
    /// # }
    /// ```
    pub fn bind(addr: SocketAddr) -> Self {
        Self::with_config(Config { addr, ..Config::default() })
    }

    pub fn with_config(config: Config) -> Self {
        Self { config }
    }

    /// Binds the configured address and serves `app` until SIGTERM / Ctrl-C.
    ///
    /// # Errors
    ///
    /// Only a failure to bind the listener is returned; nothing that happens
    /// while serving stops the server.
    pub async fn serve(self, app: impl Into<Arc<App>>) -> Result<(), Error> {
        let listener = TcpListener::bind(self.config.addr).await?;
        self.serve_with_shutdown(listener, app, shutdown_signal()).await
    }

    /// Serves `app` on an already-bound listener until `shutdown` resolves.
    pub async fn serve_with_shutdown(
        self,
        listener: TcpListener,
        app: impl Into<Arc<App>>,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let app: Arc<App> = app.into();
        let addr = listener.local_addr()?;
        let limits = Limits {
            timeout: self.config.request_timeout,
            max_body_bytes: self.config.max_body_bytes,
        };

        info!(%addr, routes = app.route_count(), "lime listening");
        if app.sessions().ttl() != self.config.session_ttl {
            warn!(
                configured_secs = self.config.session_ttl.as_secs(),
                store_secs = app.sessions().ttl().as_secs(),
                "session store TTL differs from config; build the app with `App::with_config`"
            );
        }

        let sweeper = self
            .config
            .session_sweep_interval
            .filter(|period| !period.is_zero())
            .map(|period| spawn_session_sweeper(app.sessions().clone(), period));

        let builder = ConnBuilder::new(TokioExecutor::new());
        let graceful = GracefulShutdown::new();
        let mut tasks = JoinSet::new();

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Checked first so a shutdown request stops accepting at once,
                // even with connections queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, peer) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let app = Arc::clone(&app);
                    let io = TokioIo::new(stream);

                    // Called once per request on the connection.
                    let svc = service_fn(move |req| {
                        let app = Arc::clone(&app);
                        async move { handle(app, req, peer, limits).await }
                    });
                    let conn = graceful.watch(builder.serve_connection_with_upgrades(io, svc).into_owned());

                    tasks.spawn(async move {
                        if let Err(e) = conn.await {
                            debug!(%peer, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the set does not grow
                // without bound.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        let drained = tokio::time::timeout(DRAIN_GRACE, async {
            graceful.shutdown().await;
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(aborted = tasks.len(), "connections still open after grace period, aborting");
            tasks.abort_all();
        }

        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }

        info!(requests = app.request_count(), "lime stopped");
        Ok(())
    }
}

// ── Request handling ──────────────────────────────────────────────────────────

/// Per-request bounds taken from [`Config`].
#[derive(Clone, Copy, Debug)]
struct Limits {
    timeout: Option<Duration>,
    max_body_bytes: usize,
}

/// Reads one request, dispatches it off the async runtime and converts the
/// result.
///
/// The error type is [`Infallible`]: every failure becomes an HTTP response
/// so hyper never sees an error.
async fn handle(
    app: Arc<App>,
    req: hyper::Request<Incoming>,
    peer: SocketAddr,
    limits: Limits,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let request = match read_request(req, peer, limits.max_body_bytes).await {
        Ok(r) => r,
        Err(e) if e.is::<LengthLimitError>() => {
            warn!(%peer, limit = limits.max_body_bytes, "[413] request body too large");
            return Ok(Response::error(Status::ContentTooLarge).into_http());
        }
        Err(e) => {
            warn!(%peer, "failed to read request: {e}");
            return Ok(Response::error(Status::BadRequest).into_http());
        }
    };

    let method = request.method().to_owned();
    let path = request.path().to_owned();
    let work = tokio::task::spawn_blocking(move || app.dispatch(request));

    let joined = match limits.timeout {
        Some(limit) => match tokio::time::timeout(limit, work).await {
            Ok(joined) => joined,
            Err(_) => {
                error!(%method, %path, timeout_ms = limit.as_millis() as u64, "[503] request timed out");
                return Ok(Response::error(Status::ServiceUnavailable).into_http());
            }
        },
        None => work.await,
    };

    let response = match joined {
        Ok(res) => res,
        Err(e) if e.is_panic() => {
            let panic = e.into_panic();
            error!(%method, %path, panic = %panic_message(panic.as_ref()), "[500] dispatch panicked");
            Response::error(Status::InternalServerError)
        }
        Err(e) => {
            error!(%method, %path, "[500] dispatch task failed: {e}");
            Response::error(Status::InternalServerError)
        }
    };

    Ok(response.into_http())
}

async fn read_request(
    req: hyper::Request<Incoming>,
    peer: SocketAddr,
    max_body_bytes: usize,
) -> Result<Request, Box<dyn std::error::Error + Send + Sync>> {
    let (parts, body) = req.into_parts();
    let body = Limited::new(body, max_body_bytes).collect().await?.to_bytes();

    let target = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
    let mut request = Request::new(parts.method.as_str(), target)
        .with_body(body.to_vec())
        .with_remote_addr(peer);
    for (name, value) in &parts.headers {
        match value.to_str() {
            Ok(v) => request.insert_header(name.as_str(), v),
            Err(_) => debug!(%peer, header = %name, "dropping non-ASCII header value"),
        }
    }
    Ok(request)
}

fn spawn_session_sweeper(sessions: SessionStore, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sessions.purge_expired(Utc::now());
        }
    })
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or Ctrl-C. If a handler cannot be
/// installed, that signal is logged and ignored.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    // `pending()` never resolves: on non-Unix platforms only Ctrl-C counts.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}
