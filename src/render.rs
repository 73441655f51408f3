//! Page and JSON rendering helpers for handlers.
//!
//! Both helpers degrade instead of failing: a missing file or an
//! unserializable value is logged and rendered as a placeholder, so a broken
//! asset never turns a page into a `500`.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{error, warn};

/// An empty asset list for [`html`].
pub const NO_ASSETS: &[&str] = &[];

/// Renders the HTML file at `path` with each stylesheet in `css` inlined as a
/// `<style>` block before `</head>` and each script in `js` inlined as a
/// `<script>` block before `</body>`.
///
/// Without `</head>` the styles go first; without `</body>` the scripts go
/// last. A missing asset is skipped. A missing page renders as
/// `"{path} was not found."`. Pass [`NO_ASSETS`] for an empty list.
///
/// ```rust,no_run
/// use lime::{Request, Response, render};
///
/// fn index(_req: &Request, _res: &mut Response) -> String {
///     render::html("html/index.html", &["html/site.css"], render::NO_ASSETS)
/// }
/// ```
pub fn html(path: impl AsRef<Path>, css: &[impl AsRef<Path>], js: &[impl AsRef<Path>]) -> String {
    let path = path.as_ref();
    let mut page = match fs::read_to_string(path) {
        Ok(page) => page,
        Err(e) => {
            error!(path = %path.display(), "page could not be read: {e}");
            return format!("{} was not found.", path.display());
        }
    };

    let styles: String = css.iter().filter_map(|p| inline(p.as_ref(), "style")).collect();
    match page.find("</head>") {
        Some(at) => page.insert_str(at, &styles),
        None => page.insert_str(0, &styles),
    }

    let scripts: String = js.iter().filter_map(|p| inline(p.as_ref(), "script")).collect();
    match page.find("</body>") {
        Some(at) => page.insert_str(at, &scripts),
        None => page.push_str(&scripts),
    }

    page
}

fn inline(path: &Path, tag: &str) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(content) => Some(format!("<{tag}>{content}</{tag}>")),
        Err(e) => {
            warn!(path = %path.display(), "asset could not be read, skipping: {e}");
            None
        }
    }
}

/// Serializes `value` as JSON, indented when `pretty`. Serialization errors
/// are logged and render as an empty string.
pub fn json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> String {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    rendered.unwrap_or_else(|e| {
        error!("value could not be rendered as JSON: {e}");
        String::new()
    })
}
