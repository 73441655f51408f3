//! Middleware layer.
//!
//! Middleware is a function `(Request, Response) -> (Request, Response)`
//! run on every request, in registration order, before route matching. It is
//! the place for cross-cutting concerns: logging, request-id injection,
//! default response headers.
//!
//! Middleware cannot short-circuit: whatever it returns is routed. A
//! `Response` it modifies is the one the handler receives, and its headers
//! also survive onto `401`/`404` pages.
//!
//! ```rust
//! use lime::{App, Request, Response, middleware};
//!
//! fn powered_by(req: Request, mut res: Response) -> (Request, Response) {
//!     res.insert_header("x-powered-by", "lime");
//!     (req, res)
//! }
//!
//! let app = App::new()
//!     .middleware(middleware::logging)
//!     .middleware(powered_by);
//! ```

mod logging;

use std::sync::Arc;

use crate::request::Request;
use crate::response::Response;

pub use logging::logging;

/// A type-erased middleware function.
pub type Middleware = Arc<dyn Fn(Request, Response) -> (Request, Response) + Send + Sync + 'static>;

/// Ordered middleware, folded left to right over each request.
#[derive(Clone, Default)]
pub(crate) struct Chain {
    layers: Vec<Middleware>,
}

impl Chain {
    pub(crate) fn push<F>(&mut self, f: F)
    where
        F: Fn(Request, Response) -> (Request, Response) + Send + Sync + 'static,
    {
        self.layers.push(Arc::new(f));
    }

    pub(crate) fn run(&self, req: Request, res: Response) -> (Request, Response) {
        self.layers
            .iter()
            .fold((req, res), |(req, res), layer| layer(req, res))
    }
}
