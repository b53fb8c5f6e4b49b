//! Multi-root static file serving over `tiny_http`.
//!
//! A [`SiteMap`] answers "which file does this URL mean": route mounts are
//! consulted first (a mounted prefix never falls through to the roots),
//! then each root in order, first existing file wins. Directory URLs serve
//! their `index.html`. Any `..` segment is rejected outright.
//!
//! Requests are handled on their own thread so a held reload poll never
//! blocks file requests.

use super::ServeError;
use super::reload::{self, POLL_TIMEOUT, RELOAD_PATH, ReloadHub};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Method, Request, Response, Server};
use tracing::{debug, warn};

/// A URL prefix served from a fixed directory.
#[derive(Debug, Clone)]
pub struct Mount {
    pub prefix: String,
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct SiteMap {
    mounts: Vec<Mount>,
    roots: Vec<PathBuf>,
}

fn decode_percent(segment: &str) -> Option<String> {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = segment.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// Split a URL path into safe, decoded segments.
fn segments(url_path: &str) -> Option<Vec<String>> {
    let mut out = Vec::new();
    for raw in url_path.split('/') {
        let segment = decode_percent(raw)?;
        match segment.as_str() {
            "" | "." => continue,
            ".." => return None,
            s if s.contains(['/', '\\', '\0']) => return None,
            _ => out.push(segment),
        }
    }
    Some(out)
}

fn existing_file(candidate: PathBuf) -> Option<PathBuf> {
    if candidate.is_dir() {
        let index = candidate.join("index.html");
        return index.is_file().then_some(index);
    }
    candidate.is_file().then_some(candidate)
}

impl SiteMap {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            mounts: Vec::new(),
            roots,
        }
    }

    pub fn with_mount(mut self, prefix: &str, dir: PathBuf) -> Self {
        self.mounts.push(Mount {
            prefix: format!("/{}", prefix.trim_matches('/')),
            dir,
        });
        self
    }

    /// Map a request path (query already stripped) to a file.
    pub fn resolve(&self, url_path: &str) -> Option<PathBuf> {
        for mount in &self.mounts {
            let rest = match url_path.strip_prefix(&mount.prefix) {
                Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
                _ => continue,
            };
            let rel: PathBuf = segments(rest)?.iter().collect();
            return existing_file(mount.dir.join(rel));
        }
        let rel: PathBuf = segments(url_path)?.iter().collect();
        self.roots
            .iter()
            .find_map(|root| existing_file(root.join(&rel)))
    }
}

/// Content type by file extension.
pub fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",
        "webmanifest" => "application/manifest+json",
        "pdf" => "application/pdf",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}

/// A response computed without touching the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Reply {
    fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            body: body.into().into_bytes(),
        }
    }
}

/// Serves a [`SiteMap`], optionally with live reload.
pub struct StaticSite {
    map: SiteMap,
    reload: Option<Arc<ReloadHub>>,
    poll_timeout: Duration,
}

impl StaticSite {
    pub fn new(map: SiteMap) -> Self {
        Self {
            map,
            reload: None,
            poll_timeout: POLL_TIMEOUT,
        }
    }

    /// Inject the reload client into HTML and answer reload polls.
    pub fn with_reload(mut self, hub: Arc<ReloadHub>) -> Self {
        self.reload = Some(hub);
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Answer a request for `url` (path plus optional query).
    pub fn reply(&self, method: &Method, url: &str) -> Reply {
        if !matches!(method, Method::Get | Method::Head) {
            return Reply::text(405, "method not allowed");
        }
        let (path, query) = match url.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (url, None),
        };
        let path = path.split('#').next().unwrap_or_default();

        if let Some(hub) = &self.reload {
            if path == RELOAD_PATH {
                let since = reload::parse_since(query);
                let generation = hub.wait_past(since, self.poll_timeout);
                return Reply::text(200, generation.to_string());
            }
        }

        let Some(file) = self.map.resolve(path) else {
            return Reply::text(404, "not found");
        };
        let body = match fs::read(&file) {
            Ok(body) => body,
            Err(e) => {
                warn!(file = %file.display(), error = %e, "cannot read file");
                return Reply::text(500, "cannot read file");
            }
        };
        let content_type = mime_type(&file);
        let body = match (&self.reload, content_type.starts_with("text/html")) {
            (Some(_), true) => reload::inject_client(&String::from_utf8_lossy(&body)).into_bytes(),
            _ => body,
        };
        Reply {
            status: 200,
            content_type,
            body,
        }
    }

    fn handle(&self, request: Request) {
        let reply = self.reply(request.method(), request.url());
        debug!(url = request.url(), status = reply.status, "request");
        let mut response = Response::from_data(reply.body).with_status_code(reply.status);
        for (name, value) in [("Content-Type", reply.content_type), ("Cache-Control", "no-cache")] {
            if let Ok(header) = Header::from_bytes(name.as_bytes(), value.as_bytes()) {
                response = response.with_header(header);
            }
        }
        if let Err(e) = request.respond(response) {
            debug!(error = %e, "client went away");
        }
    }
}

/// A bound server, ready to [`run`](HttpServer::run).
pub struct HttpServer {
    server: Server,
    site: Arc<StaticSite>,
}

impl HttpServer {
    pub fn bind(host: &str, port: u16, site: StaticSite) -> Result<Self, ServeError> {
        let addr = format!("{host}:{port}");
        let server = Server::http(&addr).map_err(|e| ServeError::Bind {
            addr,
            message: e.to_string(),
        })?;
        Ok(Self {
            server,
            site: Arc::new(site),
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Accept requests until `shutdown` is set.
    pub fn run(&self, shutdown: &AtomicBool) -> Result<(), ServeError> {
        while !shutdown.load(Ordering::SeqCst) {
            match self.server.recv_timeout(Duration::from_millis(200))? {
                Some(request) => {
                    let site = self.site.clone();
                    thread::spawn(move || site.handle(request));
                }
                None => continue,
            }
        }
        Ok(())
    }
}
