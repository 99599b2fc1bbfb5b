use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use crate::{MockrestError, MockrestResult, error::ErrorKind};

use super::FilePath;
use super::http::{
    HttpBody, HttpMethod, HttpRequest, HttpResponse, HttpServerConfig, HttpServerHandle,
    HttpService, HttpStatusCode,
};
use super::traits::Pal;

/* 📖 # Why a single worker thread for tiny_http?

The document is process-wide mutable state and the engine assumes requests are
processed one after another, never interleaved. tiny_http accepts connections on its
own threads, but we pull requests from it on exactly one worker and run each to
completion before taking the next. A slow handler delays the queue; nothing races.
*/

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Concrete PAL implementation using the real filesystem and tiny_http.
///
/// Relative file paths are resolved against the configured base directory
/// (normally the working directory), absolute paths are used as given.
#[derive(Debug)]
pub struct RealPal {
    base_dir: PathBuf,
}

impl RealPal {
    /// Create a new RealPal with the given base directory.
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    fn resolve_path(&self, path: &FilePath) -> PathBuf {
        self.base_dir.join(path.as_path())
    }

    fn file_error(path: PathBuf, source: std::io::Error) -> Box<MockrestError> {
        Box::new(MockrestError::new(ErrorKind::FileError { path, source }))
    }
}

impl Pal for RealPal {
    #[instrument(skip(self), fields(path = %path))]
    fn file_exists(&self, path: &FilePath) -> MockrestResult<bool> {
        let resolved = self.resolve_path(path);
        let exists = resolved.is_file();
        debug!(exists, resolved = %resolved.display(), "checked file existence");
        Ok(exists)
    }

    #[instrument(skip(self), fields(path = %path))]
    fn read_file(&self, path: &FilePath) -> MockrestResult<Box<dyn Read + 'static>> {
        let resolved = self.resolve_path(path);
        debug!(resolved = %resolved.display(), "opening file for reading");
        let file = fs::File::open(&resolved).map_err(|e| Self::file_error(resolved, e))?;
        Ok(Box::new(file))
    }

    #[instrument(skip(self), fields(path = %path))]
    fn create_file(&self, path: &FilePath) -> MockrestResult<Box<dyn Write>> {
        let resolved = self.resolve_path(path);
        debug!(resolved = %resolved.display(), "creating file");
        let file = fs::File::create(&resolved).map_err(|e| Self::file_error(resolved, e))?;
        Ok(Box::new(file))
    }

    #[instrument(skip(self, service), fields(address = %config.address()))]
    fn start_http_server(
        &self,
        service: Box<dyn HttpService>,
        config: HttpServerConfig,
    ) -> MockrestResult<HttpServerHandle> {
        let server = tiny_http::Server::http(config.address()).map_err(|e| {
            crate::err!("Failed to bind HTTP server to {}: {}", config.address(), e)
        })?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .ok_or_else(|| crate::err!("HTTP server is not bound to an IP address"))?;

        let handle = HttpServerHandle::new(port);
        let shutdown = handle.shutdown_flag();
        let server_name = config.server_name.clone();
        std::thread::Builder::new()
            .name("mockrest-http".to_string())
            .spawn(move || serve_requests(server, service, shutdown, server_name))
            .map_err(|e| crate::err!("Failed to spawn HTTP worker thread: {}", e))?;

        info!(host = %config.host, port, "HTTP server listening");
        Ok(handle)
    }
}

fn serve_requests(
    server: tiny_http::Server,
    service: Box<dyn HttpService>,
    shutdown: Arc<AtomicBool>,
    server_name: String,
) {
    while !shutdown.load(Ordering::SeqCst) {
        let mut request = match server.recv_timeout(POLL_INTERVAL) {
            Ok(Some(request)) => request,
            Ok(None) => continue,
            Err(e) => {
                error!(error = %e, "failed to receive HTTP request");
                continue;
            }
        };

        let response = match convert_request(&mut request) {
            Ok(http_request) => service.handle_request(http_request).unwrap_or_else(|e| {
                error!(error = %e, "service failed to produce a response");
                HttpResponse::internal_error()
                    .with_content_type("text/plain; charset=utf-8")
                    .with_body(format!("{:?}", e))
            }),
            Err(e) => {
                warn!(error = %e, "rejecting malformed request");
                HttpResponse::new(HttpStatusCode::BadRequest)
                    .with_content_type("text/plain; charset=utf-8")
                    .with_body(e.to_string())
            }
        };

        if let Err(e) = request.respond(convert_response(response, &server_name)) {
            warn!(error = %e, "failed to write HTTP response");
        }
    }
    info!("HTTP server stopped");
}

fn convert_request(request: &mut tiny_http::Request) -> MockrestResult<HttpRequest> {
    let method_name = request.method().to_string();
    let method = HttpMethod::parse(&method_name)
        .ok_or_else(|| crate::err!("Unsupported HTTP method: {}", method_name))?;

    let mut converted = HttpRequest::new(method, request.url().to_string());
    for header in request.headers() {
        converted = converted.with_header(header.field.as_str().as_str(), header.value.as_str());
    }

    let mut body = Vec::new();
    request
        .as_reader()
        .read_to_end(&mut body)
        .map_err(|e| crate::err!("Failed to read request body: {}", e))?;
    Ok(converted.with_body(HttpBody::from_bytes(body)))
}

fn convert_response(
    response: HttpResponse,
    server_name: &str,
) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let mut converted =
        tiny_http::Response::from_data(response.into_body().into_bytes()).with_status_code(status);
    for (key, value) in headers.iter() {
        match tiny_http::Header::from_bytes(key.as_bytes(), value.as_bytes()) {
            Ok(header) => converted.add_header(header),
            Err(()) => warn!(header = key, "dropping header that is not valid ASCII"),
        }
    }
    if let Ok(header) = tiny_http::Header::from_bytes(&b"Server"[..], server_name.as_bytes()) {
        converted.add_header(header);
    }
    converted
}
