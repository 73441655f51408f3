//! HTTP status codes as a typed enum.
//!
//! Use [`Status`] with [`Response::set_status`](crate::Response::set_status).
//! The set is limited to what an application behind lime actually sends:
//! success, redirects, and the error statuses the dispatcher produces itself.
//!
//! ```rust
//! use lime::{Request, Response, Status};
//!
//! fn create(_req: &Request, res: &mut Response) -> &'static str {
//!     res.set_status(Status::Created);
//!     r#"{"id":42}"#
//! }
//! ```

/// A known HTTP status code.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    // ── 2xx Success ───────────────────────────────────────────────────────────
    Ok,                  // 200
    Created,             // 201
    Accepted,            // 202
    NoContent,           // 204

    // ── 3xx Redirection ───────────────────────────────────────────────────────
    MovedPermanently,    // 301
    Found,               // 302
    SeeOther,            // 303
    TemporaryRedirect,   // 307

    // ── 4xx Client errors ─────────────────────────────────────────────────────
    BadRequest,          // 400
    Unauthorized,        // 401
    Forbidden,           // 403
    NotFound,            // 404
    ContentTooLarge,     // 413

    // ── 5xx Server errors ─────────────────────────────────────────────────────
    InternalServerError, // 500
    ServiceUnavailable,  // 503
}

impl Status {
    /// The canonical reason phrase, e.g. `"Not Found"`.
    pub fn reason(self) -> &'static str {
        match self {
            Self::Ok                  => "OK",
            Self::Created             => "Created",
            Self::Accepted            => "Accepted",
            Self::NoContent           => "No Content",
            Self::MovedPermanently    => "Moved Permanently",
            Self::Found               => "Found",
            Self::SeeOther            => "See Other",
            Self::TemporaryRedirect   => "Temporary Redirect",
            Self::BadRequest          => "Bad Request",
            Self::Unauthorized        => "Unauthorized",
            Self::Forbidden           => "Forbidden",
            Self::NotFound            => "Not Found",
            Self::ContentTooLarge     => "Content Too Large",
            Self::InternalServerError => "Internal Server Error",
            Self::ServiceUnavailable  => "Service Unavailable",
        }
    }
}

impl From<Status> for u16 {
    fn from(s: Status) -> u16 {
        match s {
            Status::Ok                  => 200,
            Status::Created             => 201,
            Status::Accepted            => 202,
            Status::NoContent           => 204,
            Status::MovedPermanently    => 301,
            Status::Found               => 302,
            Status::SeeOther            => 303,
            Status::TemporaryRedirect   => 307,
            Status::BadRequest          => 400,
            Status::Unauthorized        => 401,
            Status::Forbidden           => 403,
            Status::NotFound            => 404,
            Status::ContentTooLarge     => 413,
            Status::InternalServerError => 500,
            Status::ServiceUnavailable  => 503,
        }
    }
}
