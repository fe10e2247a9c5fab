//! Asset error types

/// Errors that can occur while materializing or releasing an asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    /// A generator function failed to produce its element
    Generation(String),
    /// A keyed loader failed for the given key
    Load {
        /// Display form of the key that failed to load
        key: String,
        /// Loader error message
        message: String,
    },
    /// The requested resource does not exist
    NotFound(String),
    /// IO error
    Io(String),
    /// A cleanup callback failed; only ever logged
    Cleanup(String),
}

impl AssetError {
    /// Shorthand for a generator failure
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    /// Shorthand for a cleanup failure
    pub fn cleanup(message: impl Into<String>) -> Self {
        Self::Cleanup(message.into())
    }
}

impl std::fmt::Display for AssetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generation(e) => write!(f, "Generation error: {e}"),
            Self::Load { key, message } => write!(f, "{key}: {message}"),
            Self::NotFound(e) => write!(f, "Could not find resource {e}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Cleanup(e) => write!(f, "Cleanup error: {e}"),
        }
    }
}

impl std::error::Error for AssetError {}

impl From<std::io::Error> for AssetError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
