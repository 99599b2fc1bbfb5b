use tracing::{debug, info, instrument};

use mockrest_base::{FilePath, MockrestResult, PalHandle, ResultExt};

use crate::document::Document;
use crate::store::traits::DocumentStore;

/* 📖 # Why rewrite the whole file on every write?

Documents are small fixtures edited by hand. Rewriting the complete file keeps it
valid JSON at every point in time and pretty-printed, so a diff of the fixture
after a test run shows exactly which records the requests changed.
*/

/// A document store backed by a JSON file, read and written through the PAL.
#[derive(Debug)]
pub struct JsonFileStore {
    pal: PalHandle,
    path: FilePath,
    document: Document,
}

impl JsonFileStore {
    /// Load the document from `path`. A missing file is created holding `{}`.
    #[instrument(skip(pal), fields(path = %path))]
    pub fn open(pal: PalHandle, path: FilePath) -> MockrestResult<Self> {
        let document = if pal.file_exists(&path)? {
            let content = pal.read_file_to_string(&path)?;
            Document::parse(&content)
                .with_context(|| format!("Failed to load document from {}", path))?
        } else {
            info!("document file does not exist, creating it");
            pal.write_file(&path, b"{}")?;
            Document::new()
        };
        debug!(entries = document.len(), "loaded document");
        Ok(Self {
            pal,
            path,
            document,
        })
    }

    pub fn path(&self) -> &FilePath {
        &self.path
    }
}

impl DocumentStore for JsonFileStore {
    fn document(&self) -> &Document {
        &self.document
    }

    fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    fn write(&mut self) -> MockrestResult<()> {
        let json = serde_json::to_string_pretty(self.document.as_map())?;
        self.pal
            .write_file(&self.path, json.as_bytes())
            .with_context(|| format!("Failed to write document to {}", self.path))?;
        debug!(path = %self.path, "wrote document");
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.to_string()
    }
}
