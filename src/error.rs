//! Error types for the media catalog

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for media catalog operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the media catalog
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Permission denied for {path}: {message}")]
    Permission { path: PathBuf, message: String },

    #[error("Corrupt data in {path}: {message}")]
    CorruptData { path: PathBuf, message: String },

    #[error("Source file is missing: {path}")]
    FileMissing { path: PathBuf },

    #[error("Destination already exists and was not planned for replacement: {path}")]
    DestinationExists { path: PathBuf },

    #[error("IO error on {path}: {source}")]
    PathIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read EXIF data from {path}: {message}")]
    ExifRead { path: PathBuf, message: String },

    #[error("Failed to extract video metadata from {path}: {message}")]
    VideoMetadata { path: PathBuf, message: String },

    #[error("File hash computation failed for {path}: {message}")]
    HashComputation { path: PathBuf, message: String },

    #[error("An indexing run is suspended (checkpoint {path}); resume it first")]
    ScanInProgress { path: PathBuf },

    #[error("Invalid period '{0}', expected YYYY-MM")]
    InvalidPeriod(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Classify an I/O error raised while touching `path`.
    pub fn from_io(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => Error::Permission {
                path: path.to_path_buf(),
                message: err.to_string(),
            },
            _ => Error::PathIo {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    pub fn corrupt(path: &Path, message: impl Into<String>) -> Self {
        Error::CorruptData {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_classifies_kind() {
        let path = Path::new("/tmp/missing.jpg");

        let err = Error::from_io(path, std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(matches!(err, Error::NotFound { .. }));

        let err = Error::from_io(
            path,
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, Error::Permission { .. }));

        let err = Error::from_io(path, std::io::Error::other("disk on fire"));
        assert!(matches!(err, Error::PathIo { .. }));
        assert!(err.to_string().contains("disk on fire"));
    }
}
