//! In-memory session store and the login/logout helpers built on it.
//!
//! Sessions live in a sharded concurrent map. Every operation takes the
//! shard lock for its key, so `create`, `destroy` and `lookup` are atomic
//! with respect to each other and concurrent requests never observe a
//! half-inserted record.
//!
//! Expiry policy: a session carries `expires_at = created_at + ttl`, where
//! the TTL matches the lifetime of the `auth` cookie issued by [`start`].
//! Nothing is removed on lookup. Stale sessions disappear through
//! [`SessionStore::purge_expired`], which the server runs on a timer, or when
//! a client presents an expired `auth` cookie.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info};

use crate::cookie::{self, AUTH_COOKIE, SetCookie};
use crate::error::Error;
use crate::request::Request;
use crate::response::Response;
use crate::token::{SESSION_TOKEN_LEN, generate_token};

/// Default session lifetime, also the `auth` cookie lifetime.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// Server-side proof that a client has authenticated.
#[derive(Clone, Debug)]
pub struct Session {
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub logged_in: bool,
}

/// Concurrent token → [`Session`] map.
///
/// Cheap to clone; clones share the same sessions.
#[derive(Clone, Debug)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, Session>>,
    ttl: TimeDelta,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_SESSION_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Session lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl.to_std().unwrap_or(Duration::MAX)
    }

    /// Creates a logged-in session for `token`. Returns `false` and leaves the
    /// existing record untouched if the token is already in use.
    pub fn create(&self, token: &str) -> bool {
        self.insert(token, Utc::now())
    }

    fn insert(&self, token: &str, now: DateTime<Utc>) -> bool {
        let created = match self.sessions.entry(token.to_owned()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Session {
                    token: token.to_owned(),
                    created_at: now,
                    expires_at: self.expiry_for(now),
                    logged_in: true,
                });
                true
            }
        };

        if created {
            info!(session_count = self.sessions.len(), "session created");
        } else {
            info!(token = %redact(token), "session already exists");
        }
        created
    }

    /// Removes the session for `token`. An unknown token is not an error:
    /// it is logged and `false` is returned.
    pub fn destroy(&self, token: &str) -> bool {
        if self.sessions.remove(token).is_some() {
            info!(session_count = self.sessions.len(), "session destroyed");
            true
        } else {
            debug!(token = %redact(token), "session to destroy does not exist");
            false
        }
    }

    /// Whether a session exists for `token`.
    pub fn lookup(&self, token: &str) -> bool {
        self.sessions.contains_key(token)
    }

    /// A snapshot of the session for `token`.
    pub fn get(&self, token: &str) -> Option<Session> {
        self.sessions.get(token).map(|s| s.clone())
    }

    pub fn len(&self) -> usize { self.sessions.len() }
    pub fn is_empty(&self) -> bool { self.sessions.is_empty() }

    /// Removes every session whose `expires_at` is at or before `now`.
    /// Returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut purged = 0;
        self.sessions.retain(|_, s| {
            let keep = s.expires_at > now;
            if !keep {
                purged += 1;
            }
            keep
        });
        if purged > 0 {
            info!(purged, session_count = self.sessions.len(), "expired sessions purged");
        }
        purged
    }

    fn expiry_for(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl Default for SessionStore {
    fn default() -> Self { Self::new() }
}

/// Logs a client in: issues a fresh token, creates its session and sets the
/// `auth` cookie (`Secure`, `HttpOnly`, expiring with the session) on `res`.
///
/// Returns the token.
///
/// ```rust
/// use lime::{HandlerError, Request, Response, SessionStore, session};
///
/// let sessions = SessionStore::new();
/// let login = move |_req: &Request, res: &mut Response| -> Result<(), HandlerError> {
///     session::start(&sessions, res)?;
///     res.redirect("/dashboard");
///     Ok(())
/// };
/// ```
pub fn start(sessions: &SessionStore, res: &mut Response) -> Result<String, Error> {
    let token = generate_token(SESSION_TOKEN_LEN)?;
    let now = Utc::now();
    sessions.insert(&token, now);

    res.set_cookie(
        &SetCookie::new(AUTH_COOKIE, token.as_str())
            .expires(sessions.expiry_for(now))
            .path("/")
            .secure(true)
            .http_only(true),
    );
    Ok(token)
}

/// Logs a client out: destroys the session named by the request's `auth`
/// cookie and tells the client to drop the cookie. Returns whether a session
/// was destroyed.
pub fn end(sessions: &SessionStore, req: &Request, res: &mut Response) -> bool {
    let (jar, _) = cookie::resolve(req, Utc::now());
    let destroyed = jar.value(AUTH_COOKIE).is_some_and(|token| sessions.destroy(token));

    res.set_cookie(
        &SetCookie::new(AUTH_COOKIE, "")
            .expires(DateTime::<Utc>::UNIX_EPOCH)
            .path("/")
            .secure(true)
            .http_only(true),
    );
    destroyed
}

/// Keeps a short prefix of a token for log lines.
fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(3).collect();
    format!("{prefix}*******")
}
