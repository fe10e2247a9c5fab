//! Relative resource paths
//!
//! Keys for file-backed assets. Paths are kept relative (joined with `/`) so
//! that the same key resolves the same way regardless of where the asset
//! root lives on disk.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::AssetError;

/// An immutable, `/`-separated path relative to an asset root
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetPath(String);

impl AssetPath {
    /// Create a path from a string
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Create a path by joining segments with `/`
    #[must_use]
    pub fn from_segments<S: AsRef<str>>(segments: &[S]) -> Self {
        let joined: Vec<&str> = segments.iter().map(|s| s.as_ref()).collect();
        Self(joined.join("/"))
    }

    /// Append a segment, returning a new path
    #[must_use]
    pub fn join(&self, segment: impl AsRef<str>) -> Self {
        Self(format!("{}/{}", self.0, segment.as_ref()))
    }

    /// Append another relative path, returning a new path
    #[must_use]
    pub fn join_path(&self, relative: &Self) -> Self {
        self.join(&relative.0)
    }

    /// The path as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The file system location of this path under `root`
    #[must_use]
    pub fn resolve_in(&self, root: impl AsRef<Path>) -> PathBuf {
        self.0
            .split('/')
            .filter(|s| !s.is_empty())
            .fold(root.as_ref().to_path_buf(), |acc, segment| acc.join(segment))
    }

    /// Read the file under `root`
    ///
    /// # Errors
    ///
    /// Returns [`AssetError::NotFound`] if the file does not exist and
    /// [`AssetError::Io`] for any other read failure
    pub fn read_bytes(&self, root: impl AsRef<Path>) -> Result<Vec<u8>, AssetError> {
        std::fs::read(self.resolve_in(root)).map_err(|e| self.map_io_error(&e))
    }

    /// Read the file under `root` as UTF-8 text
    ///
    /// # Errors
    ///
    /// Same as [`read_bytes`](Self::read_bytes), plus [`AssetError::Io`] for
    /// invalid UTF-8
    pub fn read_to_string(&self, root: impl AsRef<Path>) -> Result<String, AssetError> {
        std::fs::read_to_string(self.resolve_in(root)).map_err(|e| self.map_io_error(&e))
    }

    fn map_io_error(&self, e: &std::io::Error) -> AssetError {
        if e.kind() == ErrorKind::NotFound {
            AssetError::NotFound(self.0.clone())
        } else {
            AssetError::Io(format!("{}: {e}", self.0))
        }
    }
}

impl fmt::Display for AssetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AssetPath {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_and_join() {
        let base = AssetPath::from_segments(&["res", "textures"]);
        assert_eq!(base.as_str(), "res/textures");

        let file = base.join("grass.png");
        assert_eq!(file, AssetPath::new("res/textures/grass.png"));

        let nested = base.join_path(&AssetPath::new("ui/button.png"));
        assert_eq!(nested.to_string(), "res/textures/ui/button.png");
    }

    #[test]
    fn test_equal_paths_hash_equal() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(AssetPath::new("a/b"));
        set.insert(AssetPath::from_segments(&["a", "b"]));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_read_text_under_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("shaders")).unwrap();
        std::fs::write(dir.path().join("shaders/basic.vert"), "void main() {}").unwrap();

        let path = AssetPath::new("shaders/basic.vert");
        assert_eq!(path.read_to_string(dir.path()).unwrap(), "void main() {}");
        assert_eq!(path.read_bytes(dir.path()).unwrap().len(), 14);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = AssetPath::new("missing.png").read_bytes(dir.path()).unwrap_err();
        assert_eq!(err, AssetError::NotFound("missing.png".to_string()));
    }
}
