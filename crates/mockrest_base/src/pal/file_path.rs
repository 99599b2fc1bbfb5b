use relative_path::{RelativePath, RelativePathBuf};
use std::path::Path;

/* 📖 # Why a FilePath type instead of PathBuf?

Document files and templates are named relative to the working directory the server
was started in (template paths in the options are "filesystem-relative"). FilePath
wraps RelativePathBuf so PAL implementations decide how to anchor a path: RealPal joins
it to its base directory, MockPal uses it directly as a key in its in-memory file map.
Paths given as absolute on the command line pass through RealPal unchanged.
*/

/// Path of a file as seen by the PAL, relative to its base directory.
///
/// # Examples
///
/// ```
/// use mockrest_base::FilePath;
///
/// let db = FilePath::from("db.json");
/// let template = FilePath::from(String::from("views/posts/list.html"));
/// assert_eq!(template.to_string(), "views/posts/list.html");
/// # let _ = db;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilePath(RelativePathBuf);

impl FilePath {
    /// Returns the underlying RelativePathBuf as a reference.
    pub fn as_relative(&self) -> &RelativePath {
        &self.0
    }

    /// Converts to a regular Path for use with std::fs operations.
    /// This returns the path portion without a base directory.
    pub fn as_path(&self) -> &Path {
        Path::new(self.0.as_str())
    }
}

impl From<&str> for FilePath {
    fn from(s: &str) -> Self {
        Self(RelativePathBuf::from(s))
    }
}

impl From<String> for FilePath {
    fn from(s: String) -> Self {
        Self(RelativePathBuf::from(s))
    }
}

impl From<&Path> for FilePath {
    fn from(p: &Path) -> Self {
        Self(RelativePathBuf::from(p.to_string_lossy().into_owned()))
    }
}

impl std::fmt::Display for FilePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
