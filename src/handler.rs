//! Handler trait, body conversion and type erasure.
//!
//! # What a handler is
//!
//! A handler is any function or closure
//!
//! ```text
//! fn name(req: &Request, res: &mut Response) -> impl IntoBody
//! ```
//!
//! It reads the request, sets status/headers/cookies on the response the
//! middleware chain prepared, and *returns* the body. Handlers are
//! synchronous and run to completion on the blocking pool, so they may do
//! blocking file or network I/O without stalling the accept loop.
//!
//! # How handlers are stored
//!
//! The route table holds handlers of different concrete types in one `Vec`,
//! so each is erased behind `dyn ErasedHandler`:
//!
//! ```text
//! fn dashboard(req, res) -> &'static str { … }   ← user writes this
//!        ↓ app.get("/dashboard", dashboard)
//! dashboard.into_boxed_handler()                 ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(dashboard))                 ← stored as BoxedHandler
//!        ↓
//! handler.call(&req, &mut res)                   ← one vtable dispatch
//!        ↓
//! dashboard(&req, &mut res).into_body()          ← Result<String, HandlerError>
//! ```

use std::sync::Arc;

use serde::Serialize;

use crate::error::HandlerError;
use crate::request::Request;
use crate::response::Response;

// ── IntoBody ──────────────────────────────────────────────────────────────────

/// Conversion of a handler's return value into the response body text.
///
/// Implemented for strings, `()` and `None` (empty body), JSON values, and
/// `Result`s whose error converts into [`HandlerError`].
pub trait IntoBody {
    fn into_body(self) -> Result<String, HandlerError>;
}

impl IntoBody for String {
    fn into_body(self) -> Result<String, HandlerError> { Ok(self) }
}

impl IntoBody for &'static str {
    fn into_body(self) -> Result<String, HandlerError> { Ok(self.to_owned()) }
}

impl IntoBody for () {
    fn into_body(self) -> Result<String, HandlerError> { Ok(String::new()) }
}

impl<T: IntoBody> IntoBody for Option<T> {
    fn into_body(self) -> Result<String, HandlerError> {
        self.map_or_else(|| Ok(String::new()), IntoBody::into_body)
    }
}

impl<T: IntoBody, E: Into<HandlerError>> IntoBody for Result<T, E> {
    fn into_body(self) -> Result<String, HandlerError> {
        match self {
            Ok(body) => body.into_body(),
            Err(e) => Err(e.into()),
        }
    }
}

impl IntoBody for serde_json::Value {
    fn into_body(self) -> Result<String, HandlerError> { Ok(self.to_string()) }
}

/// Serializes `T` as the JSON body.
///
/// ```rust
/// use lime::{Json, Request, Response};
///
/// #[derive(serde::Serialize)]
/// struct Profile { name: &'static str }
///
/// fn profile(_req: &Request, _res: &mut Response) -> Json<Profile> {
///     Json(Profile { name: "bob" })
/// }
/// ```
#[derive(Clone, Debug)]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoBody for Json<T> {
    fn into_body(self) -> Result<String, HandlerError> {
        Ok(serde_json::to_string(&self.0)?)
    }
}

// ── Type erasure ──────────────────────────────────────────────────────────────

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: &Request, res: &mut Response) -> Result<String, HandlerError>;
}

/// A type-erased handler shared by every request that hits its route.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every valid route handler.
///
/// You never implement this yourself; it is satisfied by any
/// `Fn(&Request, &mut Response) -> impl IntoBody` that is `Send + Sync`.
/// Closures need their parameter types spelled out:
///
/// ```rust
/// use lime::{App, Request, Response};
///
/// let app = App::new().get("/", |_req: &Request, _res: &mut Response| "hello");
/// ```
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, R> private::Sealed for F
where
    F: Fn(&Request, &mut Response) -> R + Send + Sync + 'static,
    R: IntoBody,
{
}

impl<F, R> Handler for F
where
    F: Fn(&Request, &mut Response) -> R + Send + Sync + 'static,
    R: IntoBody,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Bridges a concrete handler `F` to the trait-object world.
struct FnHandler<F>(F);

impl<F, R> ErasedHandler for FnHandler<F>
where
    F: Fn(&Request, &mut Response) -> R,
    R: IntoBody,
{
    fn call(&self, req: &Request, res: &mut Response) -> Result<String, HandlerError> {
        (self.0)(req, res).into_body()
    }
}
