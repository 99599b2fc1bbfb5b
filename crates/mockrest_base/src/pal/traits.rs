use std::io::{Read, Write};
use std::sync::Arc;

use crate::MockrestResult;
use crate::error::{ErrorKind, MockrestError};

use super::file_path::FilePath;
use super::http::{HttpServerConfig, HttpServerHandle, HttpService};

/* 📖 # Why is Pal a trait instead of a struct?

The engine depends on the abstraction: the JSON file store and the hypermedia
renderer read and write through `Pal`, and tests swap in MockPal to check
persisted output and rendered templates without touching the disk.
*/

/// Platform Abstraction Layer (PAL) trait providing filesystem and HTTP operations.
pub trait Pal: std::fmt::Debug + Send + Sync + 'static {
    /// Check if a file exists at the given path.
    fn file_exists(&self, path: &FilePath) -> MockrestResult<bool>;

    /// Open a file for reading.
    fn read_file(&self, path: &FilePath) -> MockrestResult<Box<dyn Read + 'static>>;

    /// Read entire file contents as a UTF-8 string.
    fn read_file_to_string(&self, path: &FilePath) -> MockrestResult<String> {
        let mut reader = self.read_file(path)?;
        let mut contents = Vec::new();
        reader.read_to_end(&mut contents).map_err(|e| {
            Box::new(MockrestError::new(ErrorKind::FileError {
                path: path.as_path().to_path_buf(),
                source: e,
            }))
        })?;
        String::from_utf8(contents).map_err(|_e| crate::err!("File is not valid UTF-8: {}", path))
    }

    /// Create a new file, overwriting if it exists.
    fn create_file(&self, path: &FilePath) -> MockrestResult<Box<dyn Write>>;

    /// Replace the contents of a file with `contents`.
    fn write_file(&self, path: &FilePath, contents: &[u8]) -> MockrestResult<()> {
        let mut writer = self.create_file(path)?;
        writer
            .write_all(contents)
            .and_then(|()| writer.flush())
            .map_err(|e| {
                Box::new(MockrestError::new(ErrorKind::FileError {
                    path: path.as_path().to_path_buf(),
                    source: e,
                }))
            })
    }

    /// Start an HTTP server with the given service.
    ///
    /// Returns a handle to the running server. When the last handle is dropped
    /// (or shutdown() is called) the server stops accepting requests.
    fn start_http_server(
        &self,
        service: Box<dyn HttpService>,
        config: HttpServerConfig,
    ) -> MockrestResult<HttpServerHandle>;
}

/// Handle to a PAL implementation, enabling shared ownership.
///
/// # Examples
///
/// ```no_run
/// use mockrest_base::{RealPal, PalHandle};
///
/// let pal = PalHandle::new(RealPal::new(".".into()));
/// let pal_clone = pal.clone(); // Cheap clone, shares the same implementation
/// ```
#[derive(Debug, Clone)]
pub struct PalHandle(Arc<dyn Pal>);

impl PalHandle {
    /// Create a new PalHandle from a Pal implementation.
    pub fn new(pal: impl Pal + 'static) -> Self {
        Self(Arc::new(pal))
    }
}

impl std::ops::Deref for PalHandle {
    type Target = dyn Pal;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}
