use tracing::info;

use crate::request::Request;
use crate::response::Response;

/// Logs method, path and peer of every request at `info`.
pub fn logging(req: Request, res: Response) -> (Request, Response) {
    info!(
        method = req.method(),
        path = req.path(),
        query = req.query().unwrap_or(""),
        peer = ?req.remote_addr(),
        "request"
    );
    (req, res)
}
