//! End-to-end tests: a real server on an ephemeral port, driven with raw
//! HTTP/1.1 over TCP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use lime::{Access, App, Config, HandlerError, Request, Response, Server, middleware, session};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct Reply {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl Reply {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

struct Running {
    addr: SocketAddr,
    app: Arc<App>,
    stop: oneshot::Sender<()>,
    task: JoinHandle<Result<(), lime::Error>>,
}

impl Running {
    async fn shutdown(self) {
        self.stop.send(()).unwrap();
        self.task.await.unwrap().unwrap();
    }
}

async fn start(app: App, config: Config) -> Running {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Arc::new(app);
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(Server::with_config(config).serve_with_shutdown(
        listener,
        Arc::clone(&app),
        async {
            let _ = stopped.await;
        },
    ));
    Running { addr, app, stop, task }
}

async fn send(addr: SocketAddr, method: &str, path: &str, headers: &[(&str, &str)], body: &str) -> Reply {
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let mut raw = format!(
        "{method} {path} HTTP/1.1\r\nhost: {addr}\r\nconnection: close\r\ncontent-length: {}\r\n",
        body.len()
    );
    for (name, value) in headers {
        raw.push_str(&format!("{name}: {value}\r\n"));
    }
    raw.push_str("\r\n");
    raw.push_str(body);
    stream.write_all(raw.as_bytes()).await.unwrap();

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    parse(&String::from_utf8(buf).unwrap())
}

/// Reads exactly one response from a connection that stays open.
async fn read_one(stream: &mut TcpStream) -> Reply {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed mid-response");
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf).into_owned();
        if let Some((head, body)) = text.split_once("\r\n\r\n") {
            let length: usize = head
                .split("\r\n")
                .filter_map(|l| l.split_once(": "))
                .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                .map_or(0, |(_, v)| v.parse().unwrap());
            if body.len() >= length {
                return parse(&text);
            }
        }
    }
}

fn parse(text: &str) -> Reply {
    let (head, body) = text.split_once("\r\n\r\n").unwrap();
    let mut lines = head.split("\r\n");
    let status = lines.next().unwrap().split(' ').nth(1).unwrap().parse().unwrap();
    let headers = lines
        .filter_map(|l| l.split_once(": "))
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();
    Reply { status, headers, body: body.to_owned() }
}

fn dashboard_app() -> App {
    dashboard_app_with(App::new())
}

fn dashboard_app_with(app: App) -> App {
    let app = app.middleware(middleware::logging);
    let sessions = app.sessions().clone();

    app.get("/", |_: &Request, _: &mut Response| "<h1>home</h1>")
        .post("/auth", move |req: &Request, res: &mut Response| -> Result<(), HandlerError> {
            let form = req.form()?;
            if form.contains_key("username") && form.contains_key("password") {
                session::start(&sessions, res)?;
            }
            res.redirect("/dashboard");
            Ok(())
        })
        .route("GET", "/dashboard", Access::Protected, |_: &Request, _: &mut Response| {
            "Welcome to your dashboard!"
        })
        .get("/api/profile", |_: &Request, _: &mut Response| r#"{"name":"bob"}"#)
}

fn test_config() -> Config {
    Config {
        request_timeout: Some(Duration::from_millis(300)),
        session_sweep_interval: None,
        ..Config::default()
    }
}

#[tokio::test]
async fn login_flow_over_http() {
    let server = start(dashboard_app(), test_config()).await;

    let login = send(
        server.addr,
        "POST",
        "/auth",
        &[("content-type", "application/x-www-form-urlencoded")],
        "username=bob&password=x",
    )
    .await;
    assert_eq!(login.status, 302);
    assert_eq!(login.header("location"), Some("/dashboard"));
    let set_cookie = login.header("set-cookie").unwrap();
    assert!(set_cookie.contains("Secure") && set_cookie.contains("HttpOnly"));
    let auth = set_cookie.split(';').next().unwrap().to_owned();
    assert!(auth.starts_with("auth="));

    let dashboard = send(server.addr, "GET", "/dashboard", &[("cookie", &auth)], "").await;
    assert_eq!(dashboard.status, 200);
    assert_eq!(dashboard.body, "Welcome to your dashboard!");
    assert_eq!(dashboard.header("content-length"), Some("26"));
    assert!(dashboard.header("content-type").unwrap().starts_with("text/html"));

    let anonymous = send(server.addr, "GET", "/dashboard", &[], "").await;
    assert_eq!(anonymous.status, 401);
    assert_eq!(anonymous.body, "<h1>401 - Unauthorized</h1>");

    assert_eq!(server.app.sessions().len(), 1);
    server.shutdown().await;
}

#[tokio::test]
async fn routing_misses_and_content_types() {
    let server = start(dashboard_app(), test_config()).await;

    let missing = send(server.addr, "GET", "/nowhere", &[], "").await;
    assert_eq!(missing.status, 404);
    assert_eq!(missing.body, "<h1>404 - Not Found</h1>");

    let wrong_method = send(server.addr, "PUT", "/", &[], "").await;
    assert_eq!(wrong_method.status, 404);

    let json = send(server.addr, "GET", "/api/profile?verbose=1", &[], "").await;
    assert_eq!(json.status, 200);
    assert_eq!(json.header("content-type"), Some("application/json"));

    assert_eq!(server.app.request_count(), 3);
    server.shutdown().await;
}

#[tokio::test]
async fn malformed_form_is_400() {
    let server = start(dashboard_app(), test_config()).await;

    let reply = send(server.addr, "POST", "/auth", &[], "username").await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.body, "<h1>400 - Bad Request</h1>");
    assert!(server.app.sessions().is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn slow_handler_times_out_without_blocking_others() {
    let app = App::new()
        .get("/slow", |_: &Request, _: &mut Response| {
            std::thread::sleep(Duration::from_secs(2));
            "late"
        })
        .get("/fast", |_: &Request, _: &mut Response| "fast");
    let server = start(app, test_config()).await;

    let addr = server.addr;
    let slow = tokio::spawn(async move { send(addr, "GET", "/slow", &[], "").await });
    let fast = send(server.addr, "GET", "/fast", &[], "").await;
    assert_eq!(fast.status, 200);

    let slow = slow.await.unwrap();
    assert_eq!(slow.status, 503);
    assert_eq!(slow.body, "<h1>503 - Service Unavailable</h1>");

    server.shutdown().await;
}

#[tokio::test]
async fn panicking_middleware_is_contained() {
    let app = App::new()
        .middleware(|req: Request, res: Response| {
            assert!(req.path() != "/explode", "middleware exploded");
            (req, res)
        })
        .get("/fine", |_: &Request, _: &mut Response| "fine");
    let server = start(app, test_config()).await;

    assert_eq!(send(server.addr, "GET", "/explode", &[], "").await.status, 500);
    assert_eq!(send(server.addr, "GET", "/fine", &[], "").await.status, 200);

    server.shutdown().await;
}

#[tokio::test]
async fn concurrent_logins_each_get_a_session() {
    let server = start(dashboard_app(), test_config()).await;

    let logins: Vec<_> = (0..16)
        .map(|i| {
            let addr = server.addr;
            tokio::spawn(async move {
                let body = format!("username=user{i}&password=x");
                send(addr, "POST", "/auth", &[], &body).await
            })
        })
        .collect();

    let mut cookies = Vec::new();
    for login in logins {
        let reply = login.await.unwrap();
        assert_eq!(reply.status, 302);
        cookies.push(reply.header("set-cookie").unwrap().split(';').next().unwrap().to_owned());
    }
    cookies.sort();
    cookies.dedup();
    assert_eq!(cookies.len(), 16);
    assert_eq!(server.app.sessions().len(), 16);
    assert_eq!(server.app.request_count(), 16);

    server.shutdown().await;
}

#[tokio::test]
async fn sweeper_purges_expired_sessions() {
    let sessions = lime::SessionStore::with_ttl(Duration::from_millis(50));
    let app = App::with_sessions(sessions.clone());
    sessions.create("short-lived");

    let config = Config {
        session_sweep_interval: Some(Duration::from_millis(20)),
        ..test_config()
    };
    let server = start(app, config).await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!sessions.lookup("short-lived"));

    server.shutdown().await;
}

#[tokio::test]
async fn configured_ttl_reaches_sessions_and_cookies() {
    let config = Config { session_ttl: Duration::from_secs(5), ..test_config() };
    let server = start(dashboard_app_with(App::with_config(&config)), config).await;

    let login = send(server.addr, "POST", "/auth", &[], "username=bob&password=x").await;
    assert_eq!(login.status, 302);

    let set_cookie = login.header("set-cookie").unwrap();
    let token = set_cookie.split(';').next().unwrap().trim_start_matches("auth=");
    let session = server.app.sessions().get(token).unwrap();
    assert_eq!(session.expires_at - session.created_at, TimeDelta::seconds(5));

    let expires = set_cookie
        .split("; ")
        .find_map(|attr| attr.strip_prefix("Expires="))
        .unwrap();
    let expires = DateTime::parse_from_rfc2822(expires).unwrap().with_timezone(&Utc);
    assert!((expires - session.expires_at).num_seconds().abs() <= 1);

    server.shutdown().await;
}

#[tokio::test]
async fn oversized_body_is_413() {
    let config = Config { max_body_bytes: 16, ..test_config() };
    let server = start(dashboard_app(), config).await;

    let reply = send(server.addr, "POST", "/auth", &[], "username=someone&password=much-too-long").await;
    assert_eq!(reply.status, 413);
    assert_eq!(reply.body, "<h1>413 - Content Too Large</h1>");
    assert!(server.app.sessions().is_empty());
    assert_eq!(server.app.request_count(), 0);

    let small = send(server.addr, "POST", "/auth", &[], "username=a").await;
    assert_eq!(small.status, 302);

    server.shutdown().await;
}

#[tokio::test]
async fn idle_keep_alive_connection_does_not_hold_shutdown() {
    let server = start(dashboard_app(), test_config()).await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    let request = format!("GET / HTTP/1.1\r\nhost: {}\r\n\r\n", server.addr);
    stream.write_all(request.as_bytes()).await.unwrap();
    let reply = read_one(&mut stream).await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, "<h1>home</h1>");

    server.stop.send(()).unwrap();
    let stopped = tokio::time::timeout(Duration::from_secs(3), server.task).await;
    stopped.expect("shutdown waited on an idle connection").unwrap().unwrap();

    let mut rest = Vec::new();
    let closed = tokio::time::timeout(Duration::from_secs(1), stream.read_to_end(&mut rest)).await;
    assert!(matches!(closed, Ok(Ok(0))));
}
