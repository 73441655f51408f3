//! Request cookie parsing and `Set-Cookie` rendering.
//!
//! Browsers send only `name=value` pairs, but clients following RFC 2965 may
//! attach `$Expires` / `$Secure` attributes after a pair. Those are parsed so
//! that an expired credential can be recognised and its session reaped.
//!
//! Parsing is pure. [`resolve`] only *reports* expired cookies; acting on them
//! (destroying the session they name) is the dispatcher's job.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::request::Request;

/// Name of the cookie carrying the session token.
pub const AUTH_COOKIE: &str = "auth";

/// A cookie presented by the client.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// `None` when the client sent no (parseable) expiry.
    pub expires: Option<DateTime<Utc>>,
    pub secure: bool,
}

impl Cookie {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }
}

/// Live cookies of one request, keyed by name. The first cookie of a given
/// name wins.
#[derive(Clone, Debug, Default)]
pub struct CookieJar {
    cookies: HashMap<String, Cookie>,
}

impl CookieJar {
    pub fn get(&self, name: &str) -> Option<&Cookie> {
        self.cookies.get(name)
    }

    /// Shortcut for the value of a cookie.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).map(|c| c.value.as_str())
    }

    pub fn len(&self) -> usize { self.cookies.len() }
    pub fn is_empty(&self) -> bool { self.cookies.is_empty() }
}

/// Parses a `Cookie` header value into cookies, in order of appearance.
pub fn parse(header: &str) -> Vec<Cookie> {
    let mut cookies: Vec<Cookie> = Vec::new();

    for segment in header.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let (name, value) = match segment.split_once('=') {
            Some((n, v)) => (n.trim(), unquote(v.trim())),
            None => (segment, ""),
        };
        if name.is_empty() {
            continue;
        }

        let attr = name.strip_prefix('$');
        let attr_name = attr.unwrap_or(name);
        let is_attribute = attr.is_some()
            || (!cookies.is_empty()
                && (attr_name.eq_ignore_ascii_case("expires") || attr_name.eq_ignore_ascii_case("secure")));

        if is_attribute {
            if let Some(last) = cookies.last_mut() {
                if attr_name.eq_ignore_ascii_case("expires") {
                    last.expires = parse_http_date(value);
                } else if attr_name.eq_ignore_ascii_case("secure") {
                    last.secure = true;
                }
            }
            continue;
        }

        cookies.push(Cookie {
            name: name.to_owned(),
            value: value.to_owned(),
            expires: None,
            secure: false,
        });
    }

    cookies
}

/// Splits the request's cookies into a jar of live cookies and the list of
/// cookies that had already expired at `now`.
pub fn resolve(req: &Request, now: DateTime<Utc>) -> (CookieJar, Vec<Cookie>) {
    let mut jar = CookieJar::default();
    let mut expired = Vec::new();

    let Some(header) = req.cookie_header() else {
        return (jar, expired);
    };

    for cookie in parse(&header) {
        if cookie.is_expired(now) {
            expired.push(cookie);
        } else {
            jar.cookies.entry(cookie.name.clone()).or_insert(cookie);
        }
    }

    (jar, expired)
}

fn unquote(v: &str) -> &str {
    v.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(v)
}

fn parse_http_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(s).ok().map(|d| d.with_timezone(&Utc))
}

fn format_http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

// ── SetCookie ─────────────────────────────────────────────────────────────────

/// A `Set-Cookie` header value.
///
/// ```rust
/// use lime::SetCookie;
///
/// let cookie = SetCookie::new("theme", "dark").path("/").http_only(true);
/// assert_eq!(cookie.to_string(), "theme=dark; Path=/; HttpOnly");
/// ```
#[derive(Clone, Debug)]
pub struct SetCookie {
    name: String,
    value: String,
    expires: Option<DateTime<Utc>>,
    path: Option<String>,
    secure: bool,
    http_only: bool,
}

impl SetCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            expires: None,
            path: None,
            secure: false,
            http_only: false,
        }
    }

    pub fn expires(mut self, at: DateTime<Utc>) -> Self {
        self.expires = Some(at);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }
}

impl fmt::Display for SetCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        if let Some(at) = self.expires {
            write!(f, "; Expires={}", format_http_date(at))?;
        }
        if let Some(path) = &self.path {
            write!(f, "; Path={path}")?;
        }
        if self.secure {
            f.write_str("; Secure")?;
        }
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        Ok(())
    }
}
