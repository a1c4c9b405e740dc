//! Built-in handlers: a file server over [`MapFs`] and a fixed redirect.

use std::fmt::Write as _;
use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode, header};
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler, private};
use crate::request::Request;
use crate::vfs::{MapFs, clean_path};
use crate::writer::{self, ResponseWriter};

/// Bytes escaped when a file name becomes one segment of a listing link.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ').add(b'"').add(b'#').add(b'%').add(b'/').add(b'<')
    .add(b'>').add(b'?').add(b'`').add(b'{').add(b'}');

/// Serves a [`MapFs`] under a mount prefix.
///
/// ```rust,no_run
/// # use localserve::{FileServer, MapFs, Router};
/// let fs = MapFs::new();
/// Router::new().mount("/lib/", FileServer::new(fs, "/lib/"));
/// ```
///
/// - `GET` and `HEAD` only; anything else is `405` with an `Allow` header.
/// - Files stream in chunks of [`chunk_size`](Self::with_chunk_size) bytes.
/// - Directories redirect to their slash form, then serve `index.html` or a
///   generated listing.
pub struct FileServer {
    fs: Arc<MapFs>,
    prefix: String,
    chunk_size: usize,
}

impl FileServer {
    pub fn new(fs: impl Into<Arc<MapFs>>, prefix: &str) -> Self {
        Self { fs: fs.into(), prefix: prefix.to_owned(), chunk_size: 32 * 1024 }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    async fn serve(self: Arc<Self>, req: Request, mut w: ResponseWriter) {
        let head_only = match *req.method() {
            Method::GET => false,
            Method::HEAD => true,
            _ => {
                w.set_header(header::ALLOW.as_str(), "GET, HEAD");
                writer::error(&mut w, StatusCode::METHOD_NOT_ALLOWED, "method not allowed").await;
                return;
            }
        };

        let rel = req.path().strip_prefix(self.prefix.as_str()).unwrap_or(req.path());
        let Some(key) = decode_path(rel) else {
            writer::error(&mut w, StatusCode::BAD_REQUEST, "invalid path").await;
            return;
        };

        if let Some(data) = self.fs.get(&key) {
            let data = data.clone();
            self.send_file(&mut w, &key, data, head_only).await;
            return;
        }

        if !self.fs.is_dir(&key) {
            writer::not_found(&mut w).await;
            return;
        }

        if !req.path().ends_with('/') {
            let location = match req.query() {
                Some(query) => format!("{}/?{query}", req.path()),
                None => format!("{}/", req.path()),
            };
            writer::redirect(&mut w, &location, StatusCode::MOVED_PERMANENTLY);
            return;
        }

        let index = if key.is_empty() { "index.html".to_owned() } else { format!("{key}/index.html") };
        if let Some(data) = self.fs.get(&index) {
            let data = data.clone();
            self.send_file(&mut w, &index, data, head_only).await;
            return;
        }

        let listing = Bytes::from(self.listing(&key));
        self.send_file(&mut w, "index.html", listing, head_only).await;
    }

    async fn send_file(&self, w: &mut ResponseWriter, name: &str, data: Bytes, head_only: bool) {
        w.set_header(header::CONTENT_TYPE.as_str(), content_type(name));
        w.set_header(header::CONTENT_LENGTH.as_str(), &data.len().to_string());
        w.write_head(StatusCode::OK);
        if head_only {
            return;
        }

        let mut rest = data;
        while !rest.is_empty() {
            let chunk = rest.split_to(rest.len().min(self.chunk_size));
            if w.send(chunk).await.is_err() {
                // Reader gone; nobody left to serve.
                return;
            }
        }
    }

    fn listing(&self, key: &str) -> String {
        let mut html = String::from("<!DOCTYPE html>\n<pre>\n");
        if !key.is_empty() {
            html.push_str("<a href=\"../\">../</a>\n");
        }
        for entry in self.fs.list(key) {
            let slash = if entry.is_dir { "/" } else { "" };
            let href = escape_html(&utf8_percent_encode(&entry.name, SEGMENT).to_string());
            let name = escape_html(&entry.name);
            let _ = writeln!(html, "<a href=\"{href}{slash}\">{name}{slash}</a>");
        }
        html.push_str("</pre>\n");
        html
    }
}

impl private::Sealed for FileServer {}

impl Handler for FileServer {
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(Arc::new(self))
    }
}

impl ErasedHandler for Arc<FileServer> {
    fn call(&self, req: Request, w: ResponseWriter) -> BoxFuture {
        Box::pin(Arc::clone(self).serve(req, w))
    }
}

/// Permanently redirects every request to a fixed location.
pub struct Redirect {
    location: String,
    status: StatusCode,
}

impl Redirect {
    /// `301 Moved Permanently` to `location`.
    pub fn to(location: &str) -> Self {
        Self { location: location.to_owned(), status: StatusCode::MOVED_PERMANENTLY }
    }

    /// `302 Found` to `location`.
    pub fn temporary(location: &str) -> Self {
        Self { location: location.to_owned(), status: StatusCode::FOUND }
    }
}

impl private::Sealed for Redirect {}

impl Handler for Redirect {
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(self)
    }
}

impl ErasedHandler for Redirect {
    fn call(&self, _req: Request, mut w: ResponseWriter) -> BoxFuture {
        writer::redirect(&mut w, &self.location, self.status);
        Box::pin(async move { drop(w) })
    }
}

/// Percent-decodes every segment of a request path and cleans the result
/// into a [`MapFs`] key. `None` for invalid UTF-8, an encoded `/` inside a
/// segment, or a path that climbs out of the tree.
fn decode_path(path: &str) -> Option<String> {
    let segments: Option<Vec<_>> = path
        .split('/')
        .map(|s| percent_decode_str(s).decode_utf8().ok().filter(|s| !s.contains('/')))
        .collect();
    clean_path(&segments?.join("/"))
}

fn content_type(name: &str) -> &'static str {
    let ext = name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css"          => "text/css; charset=utf-8",
        "js"           => "text/javascript; charset=utf-8",
        "json"         => "application/json",
        "xml"          => "application/xml",
        "txt" | "md"   => "text/plain; charset=utf-8",
        "svg"          => "image/svg+xml",
        "png"          => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif"          => "image/gif",
        "ico"          => "image/x-icon",
        "pdf"          => "application/pdf",
        _              => "application/octet-stream",
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
