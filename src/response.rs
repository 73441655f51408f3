//! Outgoing HTTP response type and content-type inference.
//!
//! A [`Response`] is created by the dispatcher for every request, handed
//! through the middleware chain and then to the handler as `&mut Response`.
//! Handlers set status, headers and cookies on it and *return* the body; the
//! dispatcher attaches the body and picks a content type.

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION, SET_COOKIE};
use http_body_util::Full;
use tracing::error;

use crate::cookie::SetCookie;
use crate::status::Status;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for [`Response::set_content_type`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    Css,          // text/css
    Csv,          // text/csv
    Html,         // text/html; charset=utf-8
    JavaScript,   // text/javascript
    Json,         // application/json
    OctetStream,  // application/octet-stream
    Text,         // text/plain; charset=utf-8
    Xml,          // application/xml
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Css         => "text/css",
            Self::Csv         => "text/csv",
            Self::Html        => "text/html; charset=utf-8",
            Self::JavaScript  => "text/javascript",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
        }
    }
}

/// Content-type policy for bodies whose handler declared none.
///
/// This is a prefix heuristic, not content negotiation: a body whose first
/// non-whitespace character is `{` or `[` is served as JSON, everything else
/// as HTML. Handlers that know better call
/// [`Response::set_content_type`] and bypass it.
pub fn infer_content_type(body: &str) -> ContentType {
    let trimmed = body.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        ContentType::Json
    } else {
        ContentType::Html
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// ```rust
/// use lime::{ContentType, Request, Response, Status};
///
/// fn export(_req: &Request, res: &mut Response) -> &'static str {
///     res.set_status(Status::Created);
///     res.insert_header("x-export-id", "42");
///     res.set_content_type(ContentType::Csv);
///     "id,name\n42,lime\n"
/// }
/// ```
#[derive(Clone, Debug)]
pub struct Response {
    pub(crate) status: u16,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) content_type: Option<ContentType>,
    pub(crate) body: Vec<u8>,
}

impl Response {
    /// An empty `200 OK` response.
    pub fn new() -> Self {
        Self { status: Status::Ok.into(), headers: Vec::new(), content_type: None, body: Vec::new() }
    }

    /// A response carrying one of the dispatcher's fixed HTML error pages,
    /// e.g. `<h1>404 - Not Found</h1>`.
    pub(crate) fn error(status: Status) -> Self {
        let mut res = Self::new();
        res.fail(status);
        res
    }

    /// Turns this response into a fixed HTML error page, keeping any headers
    /// middleware already attached.
    pub(crate) fn fail(&mut self, status: Status) {
        let code: u16 = status.into();
        self.status = code;
        self.content_type = Some(ContentType::Html);
        self.body = format!("<h1>{code} - {}</h1>", status.reason()).into_bytes();
    }

    /// Attaches the handler's body and settles the content type.
    pub(crate) fn finish(mut self, body: String) -> Self {
        if self.content_type.is_none() {
            self.content_type = Some(infer_content_type(&body));
        }
        self.body = body.into_bytes();
        self
    }

    pub fn status(&self) -> u16 { self.status }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    pub fn set_status(&mut self, status: Status) {
        self.status = status.into();
    }

    /// Case-insensitive header lookup. Returns the first matching value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn insert_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_owned(), value.to_owned()));
    }

    /// Declares the body's content type, disabling inference.
    pub fn set_content_type(&mut self, content_type: ContentType) {
        self.content_type = Some(content_type);
    }

    /// The declared or inferred content type, once known.
    pub fn content_type(&self) -> Option<ContentType> {
        self.content_type
    }

    /// Appends a `Set-Cookie` header.
    pub fn set_cookie(&mut self, cookie: &SetCookie) {
        self.headers.push((SET_COOKIE.as_str().to_owned(), cookie.to_string()));
    }

    /// `302 Found` with a `Location` header.
    pub fn redirect(&mut self, location: &str) {
        self.set_status(Status::Found);
        self.headers.push((LOCATION.as_str().to_owned(), location.to_owned()));
    }

    /// Converts into the hyper response written to the connection.
    ///
    /// `content-length` is always computed from the body. A raw
    /// `content-type` header overrides the declared or inferred type and is
    /// sent once. A handler that set a header hyper cannot encode turns the
    /// response into a bare `500`.
    pub(crate) fn into_http(self) -> http::Response<Full<Bytes>> {
        let content_type = self
            .header(CONTENT_TYPE.as_str())
            .or(self.content_type.map(ContentType::as_str))
            .map(str::to_owned);

        let mut builder = http::Response::builder()
            .status(self.status)
            .header(CONTENT_LENGTH, self.body.len());
        if let Some(content_type) = content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case(CONTENT_TYPE.as_str())
                || name.eq_ignore_ascii_case(CONTENT_LENGTH.as_str())
            {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        match builder.body(Full::new(Bytes::from(self.body))) {
            Ok(res) => res,
            Err(e) => {
                error!("response could not be encoded: {e}");
                let mut res = http::Response::new(Full::new(Bytes::new()));
                *res.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
                res
            }
        }
    }
}

impl Default for Response {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_json_from_leading_brace_or_bracket() {
        assert_eq!(infer_content_type(r#"{"a":1}"#), ContentType::Json);
        assert_eq!(infer_content_type("  \n[1,2]"), ContentType::Json);
        assert_eq!(infer_content_type("hello"), ContentType::Html);
        assert_eq!(infer_content_type(""), ContentType::Html);
    }

    #[test]
    fn finish_keeps_declared_content_type() {
        let mut res = Response::new();
        res.set_content_type(ContentType::Text);
        let res = res.finish("{not json}".to_owned());
        assert_eq!(res.content_type(), Some(ContentType::Text));
    }

    #[test]
    fn fail_renders_fixed_page_and_keeps_headers() {
        let mut res = Response::new();
        res.insert_header("x-request-id", "7");
        res.fail(Status::NotFound);
        assert_eq!(res.status(), 404);
        assert_eq!(res.body(), b"<h1>404 - Not Found</h1>");
        assert_eq!(res.header("X-Request-Id"), Some("7"));
    }

    #[test]
    fn redirect_sets_found_and_location() {
        let mut res = Response::new();
        res.redirect("/dashboard");
        assert_eq!(res.status(), 302);
        assert_eq!(res.header("location"), Some("/dashboard"));
    }

    #[test]
    fn into_http_sets_exact_content_length() {
        let res = Response::new().finish("héllo".to_owned()).into_http();
        assert_eq!(res.headers()[CONTENT_LENGTH], "6");
        assert_eq!(res.headers()[CONTENT_TYPE], "text/html; charset=utf-8");
    }

    #[test]
    fn raw_content_headers_are_sent_once() {
        let mut res = Response::new();
        res.insert_header("Content-Type", "image/svg+xml");
        res.insert_header("content-length", "999");
        res.insert_header("x-request-id", "7");
        let res = res.finish("<svg/>".to_owned()).into_http();

        let types: Vec<_> = res.headers().get_all(CONTENT_TYPE).iter().collect();
        assert_eq!(types, ["image/svg+xml"]);
        let lengths: Vec<_> = res.headers().get_all(CONTENT_LENGTH).iter().collect();
        assert_eq!(lengths, ["6"]);
        assert_eq!(res.headers()["x-request-id"], "7");
    }

    #[test]
    fn unencodable_header_becomes_500() {
        let mut res = Response::new();
        res.insert_header("bad header", "x");
        assert_eq!(res.into_http().status(), http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
