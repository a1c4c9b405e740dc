//! Assembles the router the process-wide bridge serves.
//!
//! | Path | Handler |
//! |---|---|
//! | `/healthz` | [`health::liveness`] |
//! | `/robots.txt` | built-in static file |
//! | `/lib/` | built-in static files (stylesheet, robots) |
//! | `/pkg/C/` | redirect to `/cmd/cgo/` |
//! | `/` | the packaged site (archive or directory) |

use bytes::Bytes;
use http::StatusCode;

use crate::config::Config;
use crate::error::Error;
use crate::files::{FileServer, Redirect};
use crate::health;
use crate::router::Router;
use crate::vfs::MapFs;
use crate::{Request, ResponseWriter};

const STATIC_PREFIX: &str = "/lib/";

const ROBOTS_TXT: &str = "User-agent: *\nDisallow: /search\n";

const STYLE_CSS: &str = "\
body { margin: 0; font-family: sans-serif; line-height: 1.4; }
pre { overflow-x: auto; padding: 0.5rem; background: #f4f4f4; }
a { color: #375eab; text-decoration: none; }
";

/// Files every site carries regardless of the asset directory.
pub fn static_files() -> MapFs {
    let mut fs = MapFs::new();
    fs.insert("robots.txt", ROBOTS_TXT).insert("style.css", STYLE_CSS);
    fs
}

/// Loads the packaged site named by `config` and registers every handler.
///
/// An archive, when configured, wins over the asset directory.
pub fn router(config: &Config) -> Result<Router, Error> {
    let assets = match config.archive() {
        Some(archive) => MapFs::load_zip(archive, config.archive_root())?,
        None => MapFs::load_dir(config.assets())?,
    };
    Ok(router_with(assets, config))
}

/// Like [`router`] with an already loaded asset tree.
pub fn router_with(assets: MapFs, config: &Config) -> Router {
    let chunk_size = config.chunk_size();
    Router::new()
        .get("/healthz", health::liveness)
        .get("/robots.txt", robots)
        .mount(STATIC_PREFIX, FileServer::new(static_files(), STATIC_PREFIX).with_chunk_size(chunk_size))
        .mount("/pkg/C/", Redirect::to("/cmd/cgo/"))
        .mount("/", FileServer::new(assets, "/").with_chunk_size(chunk_size))
}

async fn robots(_req: Request, mut w: ResponseWriter) {
    w.set_header("content-type", "text/plain; charset=utf-8");
    w.write_head(StatusCode::OK);
    let _ = w.send(Bytes::from_static(ROBOTS_TXT.as_bytes())).await;
}
