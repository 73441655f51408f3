//! Route table.
//!
//! Routes are kept in registration order and matched by exact method and
//! path equality; the query string plays no part. When the same
//! (method, path) pair is registered twice, the first registration wins.
//! The table is built once at startup and only read while serving.

use tracing::{debug, warn};

use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;

/// Whether a route needs an authenticated session.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Access {
    Public,
    /// Requires a live `auth` cookie naming an existing session.
    Protected,
}

pub(crate) struct Route {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) access: Access,
    pub(crate) handler: BoxedHandler,
}

#[derive(Default)]
pub(crate) struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Adds a route. Invalid registrations are operator errors: they are
    /// logged and dropped, and `false` is returned.
    pub(crate) fn register(
        &mut self,
        method: &str,
        path: &str,
        access: Access,
        handler: impl Handler,
    ) -> bool {
        let Ok(parsed) = method.parse::<Method>() else {
            warn!(method, path, "method is not routable, route dropped");
            return false;
        };
        if !path.starts_with('/') {
            warn!(method, path, "path must start with `/`, route dropped");
            return false;
        }
        if self.find(method, path).is_some() {
            warn!(method, path, "route already registered, later registration is unreachable");
        }

        debug!(method, path, ?access, "route registered");
        self.routes.push(Route {
            method: parsed,
            path: path.to_owned(),
            access,
            handler: handler.into_boxed_handler(),
        });
        true
    }

    /// First route, in registration order, whose method and path both match.
    pub(crate) fn find(&self, method: &str, path: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|r| r.method.as_str() == method && r.path == path)
    }

    pub(crate) fn len(&self) -> usize {
        self.routes.len()
    }
}
