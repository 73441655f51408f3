//! Incoming HTTP request type.

use std::collections::HashMap;
use std::net::SocketAddr;

use crate::error::FormError;

/// An incoming HTTP request, fully read before dispatch.
#[derive(Clone, Debug)]
pub struct Request {
    pub(crate) method: String,
    pub(crate) path: String,
    pub(crate) query: Option<String>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Vec<u8>,
    pub(crate) remote_addr: Option<SocketAddr>,
}

impl Request {
    /// Builds a request from a method and a request target such as
    /// `/search?q=lime`. The query string is split off the path.
    pub fn new(method: &str, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_owned())),
            None => (target, None),
        };
        Self {
            method: method.to_owned(),
            path: path.to_owned(),
            query,
            headers: Vec::new(),
            body: Vec::new(),
            remote_addr: None,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub(crate) fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn method(&self) -> &str { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn query(&self) -> Option<&str> { self.query.as_deref() }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// Case-insensitive header lookup. Returns the first matching value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Adds a header. Middleware uses this to annotate requests.
    pub fn insert_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_owned(), value.to_owned()));
    }

    /// All `Cookie` headers joined into one `; `-separated string.
    ///
    /// HTTP/2 clients may split cookies across several header fields.
    pub fn cookie_header(&self) -> Option<String> {
        let parts: Vec<&str> = self.headers.iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("cookie"))
            .map(|(_, v)| v.as_str())
            .collect();
        if parts.is_empty() { None } else { Some(parts.join("; ")) }
    }

    /// Parses the body as `application/x-www-form-urlencoded` pairs.
    ///
    /// An empty body yields an empty map. Keys and values are
    /// percent-decoded and `+` is read as a space. If a key repeats, the
    /// first occurrence is kept.
    ///
    /// # Errors
    ///
    /// [`FormError::MissingSeparator`] when a non-empty segment lacks `=`,
    /// [`FormError::Decode`] when the body or a decoded component is not
    /// valid UTF-8.
    pub fn form(&self) -> Result<HashMap<String, String>, FormError> {
        let body = String::from_utf8(self.body.clone())?;
        let mut fields = HashMap::new();
        for pair in body.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| FormError::MissingSeparator(pair.to_owned()))?;
            fields
                .entry(decode_component(key)?)
                .or_insert(decode_component(value)?);
        }
        Ok(fields)
    }
}

fn decode_component(raw: &str) -> Result<String, FormError> {
    let spaced = raw.replace('+', " ");
    Ok(urlencoding::decode(&spaced)?.into_owned())
}
