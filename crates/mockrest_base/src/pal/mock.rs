use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

use parking_lot::Mutex;

use crate::MockrestResult;
use crate::error::{ErrorKind, MockrestError};

use super::FilePath;
use super::http::{HttpRequest, HttpResponse, HttpServerConfig, HttpServerHandle, HttpService};
use super::traits::Pal;

/* 📖 # Why keep MockPal files in a shared map?

Store tests need to look at what got persisted after a mutating request, and renderer
tests need templates to exist without a directory on disk. Files live in a map behind
an Arc, so a clone handed to the engine and the clone kept by the test see the same
contents. Servers are not bound to sockets; `simulate_request` calls the registered
service directly.
*/

/// In-memory PAL implementation for testing.
///
/// # Examples
///
/// ```
/// use mockrest_base::{MockPal, Pal, FilePath};
///
/// let mock = MockPal::new();
/// mock.add_file(FilePath::from("db.json"), b"{}".to_vec());
/// let content = mock.read_file_to_string(&FilePath::from("db.json")).unwrap();
/// assert_eq!(content, "{}");
/// ```
#[derive(Debug, Clone)]
pub struct MockPal {
    files: Arc<Mutex<HashMap<FilePath, Vec<u8>>>>,
    http_servers: Arc<Mutex<HashMap<u16, HttpServerInfo>>>,
    next_port: Arc<AtomicU16>,
}

#[derive(Debug)]
struct HttpServerInfo {
    service: Box<dyn HttpService>,
    handle: HttpServerHandle,
}

impl MockPal {
    /// Create a new empty MockPal.
    pub fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(HashMap::new())),
            http_servers: Arc::new(Mutex::new(HashMap::new())),
            next_port: Arc::new(AtomicU16::new(10000)),
        }
    }

    /// Add a file to the mock storage.
    pub fn add_file(&self, path: FilePath, content: Vec<u8>) {
        self.files.lock().insert(path, content);
    }

    /// Current contents of a file as a string, if it exists and is UTF-8.
    pub fn file_contents(&self, path: &FilePath) -> Option<String> {
        let files = self.files.lock();
        files
            .get(path)
            .and_then(|bytes| String::from_utf8(bytes.clone()).ok())
    }

    /// Simulate an HTTP request to a running server.
    ///
    /// Looks up the service registered for `port` and invokes it directly.
    /// Fails if no server is registered there or it has been shut down.
    pub fn simulate_request(
        &self,
        port: u16,
        request: HttpRequest,
    ) -> MockrestResult<HttpResponse> {
        let servers = self.http_servers.lock();
        let server_info = servers
            .get(&port)
            .filter(|info| !info.handle.is_shutdown())
            .ok_or_else(|| crate::err!("No HTTP server registered on port {}", port))?;

        server_info.service.handle_request(request)
    }

    /// Get the number of registered HTTP servers.
    pub fn http_server_count(&self) -> usize {
        self.http_servers.lock().len()
    }
}

impl Default for MockPal {
    fn default() -> Self {
        Self::new()
    }
}

impl Pal for MockPal {
    fn file_exists(&self, path: &FilePath) -> MockrestResult<bool> {
        Ok(self.files.lock().contains_key(path))
    }

    fn read_file(&self, path: &FilePath) -> MockrestResult<Box<dyn Read + 'static>> {
        let files = self.files.lock();
        let content = files
            .get(path)
            .ok_or_else(|| {
                Box::new(MockrestError::new(ErrorKind::FileError {
                    path: path.as_path().to_path_buf(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("File not found: {}", path),
                    ),
                }))
            })?
            .clone();
        Ok(Box::new(Cursor::new(content)))
    }

    fn create_file(&self, path: &FilePath) -> MockrestResult<Box<dyn Write>> {
        // Contents land in the map when the writer is dropped
        Ok(Box::new(MockFileWriter {
            path: path.clone(),
            files: Arc::clone(&self.files),
            buffer: Vec::new(),
        }))
    }

    fn start_http_server(
        &self,
        service: Box<dyn HttpService>,
        config: HttpServerConfig,
    ) -> MockrestResult<HttpServerHandle> {
        let port = match config.port {
            Some(p) if p != 0 => p,
            _ => self.next_port.fetch_add(1, Ordering::SeqCst),
        };

        let handle = HttpServerHandle::new(port);
        let server_info = HttpServerInfo {
            service,
            handle: handle.clone(),
        };
        self.http_servers.lock().insert(port, server_info);
        Ok(handle)
    }
}

/// Writer that stores its buffer in the MockPal file map on drop.
struct MockFileWriter {
    path: FilePath,
    files: Arc<Mutex<HashMap<FilePath, Vec<u8>>>>,
    buffer: Vec<u8>,
}

impl Write for MockFileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Drop for MockFileWriter {
    fn drop(&mut self) {
        let buffer = std::mem::take(&mut self.buffer);
        self.files.lock().insert(self.path.clone(), buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pal::http::{HttpMethod, HttpStatusCode};

    #[derive(Debug)]
    struct EchoService;

    impl HttpService for EchoService {
        fn handle_request(&self, request: HttpRequest) -> MockrestResult<HttpResponse> {
            Ok(HttpResponse::text(format!("{} {}", request.method(), request.url())))
        }
    }

    #[test]
    fn test_file_exists() {
        let pal = MockPal::new();
        pal.add_file(FilePath::from("db.json"), b"{}".to_vec());

        assert!(pal.file_exists(&FilePath::from("db.json")).unwrap());
        assert!(!pal.file_exists(&FilePath::from("other.json")).unwrap());
    }

    #[test]
    fn test_read_file_not_found() {
        let pal = MockPal::new();

        let result = pal.read_file(&FilePath::from("nonexistent.json"));
        assert!(result.is_err());
    }

    #[test]
    fn test_create_file_replaces_content() {
        let pal = MockPal::new();
        pal.add_file(FilePath::from("db.json"), b"{\"old\":true}".to_vec());

        let mut writer = pal.create_file(&FilePath::from("db.json")).unwrap();
        writer.write_all(b"{}").unwrap();
        drop(writer);

        assert_eq!(
            pal.file_contents(&FilePath::from("db.json")),
            Some("{}".to_string())
        );
    }

    #[test]
    fn test_clones_share_files() {
        let pal = MockPal::new();
        let clone = pal.clone();
        clone.write_file(&FilePath::from("db.json"), b"[]").unwrap();

        assert_eq!(
            pal.file_contents(&FilePath::from("db.json")),
            Some("[]".to_string())
        );
    }

    #[test]
    fn test_simulate_request() {
        let pal = MockPal::new();
        let handle = pal
            .start_http_server(Box::new(EchoService), HttpServerConfig::default())
            .unwrap();

        let response = pal
            .simulate_request(handle.port(), HttpRequest::new(HttpMethod::Get, "/posts?q=x"))
            .unwrap();
        assert_eq!(response.status(), HttpStatusCode::Ok);
        assert_eq!(
            response.body().as_string(),
            Some("GET /posts?q=x".to_string())
        );
        assert_eq!(pal.http_server_count(), 1);
    }

    #[test]
    fn test_simulate_request_after_shutdown_fails() {
        let pal = MockPal::new();
        let handle = pal
            .start_http_server(Box::new(EchoService), HttpServerConfig::default())
            .unwrap();
        let port = handle.port();
        handle.shutdown();

        let result = pal.simulate_request(port, HttpRequest::new(HttpMethod::Get, "/"));
        assert!(result.is_err());
    }

    #[test]
    fn test_ports_are_assigned_sequentially() {
        let pal = MockPal::new();
        let first = pal
            .start_http_server(Box::new(EchoService), HttpServerConfig::default())
            .unwrap();
        let second = pal
            .start_http_server(Box::new(EchoService), HttpServerConfig::default())
            .unwrap();
        let fixed = pal
            .start_http_server(
                Box::new(EchoService),
                HttpServerConfig::default().with_port(3000),
            )
            .unwrap();

        assert_eq!(first.port(), 10000);
        assert_eq!(second.port(), 10001);
        assert_eq!(fixed.port(), 3000);
    }
}
