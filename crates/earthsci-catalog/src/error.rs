//! Error types for catalog operations.

use std::io;
use std::path::PathBuf;

use earthsci_core::TreeError;

use crate::catalog::CatalogId;

/// Errors raised by the catalog crate.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The catalog node ID is invalid.
    #[error("Invalid catalog node ID {0:?}")]
    InvalidNode(CatalogId),

    /// A layer tree operation failed.
    #[error("Layer tree error: {0}")]
    Tree(#[from] TreeError),

    /// Starting a layer load failed.
    #[error(transparent)]
    Core(#[from] earthsci_core::Error),

    /// Reading or writing a preferences file failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// A preferences file is not valid TOML.
    #[error("Invalid TOML in {}: {source}", .path.display())]
    TomlDe {
        /// The file involved.
        path: PathBuf,
        /// The parse error.
        #[source]
        source: toml::de::Error,
    },

    /// Preferences could not be rendered as TOML.
    #[error("Cannot serialize preferences as TOML: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// A preferences file is not valid JSON, or could not be rendered as JSON.
    #[error("Invalid JSON for {}: {source}", .path.display())]
    Json {
        /// The file involved.
        path: PathBuf,
        /// The parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The file extension does not name a supported format.
    #[error("Unsupported preferences format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
}

impl CatalogError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_error_conversion() {
        let err: CatalogError = TreeError::RootImmovable.into();
        assert!(matches!(err, CatalogError::Tree(TreeError::RootImmovable)));
        assert_eq!(err.to_string(), "Layer tree error: The tree root cannot be moved or destroyed");
    }

    #[test]
    fn test_io_error_names_path() {
        let err = CatalogError::io(
            "/tmp/prefs.toml",
            io::Error::new(io::ErrorKind::NotFound, "missing"),
        );
        assert_eq!(err.to_string(), "I/O error on /tmp/prefs.toml: missing");
    }
}
