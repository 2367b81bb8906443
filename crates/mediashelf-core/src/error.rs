//! Error types module
//!
//! All library-level failures are unified under [`MediaError`]. Reference resolution that
//! finds nothing is *not* an error (see `Resolution::NotFound`); the variants here are the
//! failures a caller has to handle.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Boxed source error carried by storage-related variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected failures such as bad caller input
    Debug,
    /// Recoverable or isolated failures
    Warn,
    /// Unexpected failures
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: BoxError,
    },

    #[error("Conversion is not registered: {0}")]
    InvalidConversion(String),

    #[error("Disk is not configured: {0}")]
    DiskNotConfigured(String),

    #[error("Disk is not writable: {disk}")]
    DiskUnwritable {
        disk: String,
        #[source]
        source: BoxError,
    },

    #[error("Reference list mixes element kinds: {0}")]
    AmbiguousReferenceList(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error: {message}")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Result alias used across the mediashelf crates
pub type MediaResult<T> = Result<T, MediaError>;

#[cfg(feature = "sqlx")]
impl From<SqlxError> for MediaError {
    fn from(err: SqlxError) -> Self {
        MediaError::Database(err)
    }
}

impl From<anyhow::Error> for MediaError {
    fn from(err: anyhow::Error) -> Self {
        MediaError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for MediaError {
    fn from(err: io::Error) -> Self {
        MediaError::Storage {
            message: format!("IO error: {}", err),
            source: Box::new(err),
        }
    }
}

impl From<serde_json::Error> for MediaError {
    fn from(err: serde_json::Error) -> Self {
        MediaError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

/// Static metadata for each variant: (error_code, recoverable, log_level).
fn media_error_static_metadata(err: &MediaError) -> (&'static str, bool, LogLevel) {
    match err {
        MediaError::Database(_) => ("DATABASE_ERROR", true, LogLevel::Error),
        MediaError::Storage { .. } => ("STORAGE_ERROR", true, LogLevel::Error),
        MediaError::InvalidConversion(_) => ("INVALID_CONVERSION", false, LogLevel::Warn),
        MediaError::DiskNotConfigured(_) => ("DISK_NOT_CONFIGURED", false, LogLevel::Error),
        MediaError::DiskUnwritable { .. } => ("DISK_UNWRITABLE", false, LogLevel::Error),
        MediaError::AmbiguousReferenceList(_) => {
            ("AMBIGUOUS_REFERENCE_LIST", false, LogLevel::Debug)
        }
        MediaError::ImageProcessing(_) => ("IMAGE_PROCESSING_ERROR", false, LogLevel::Warn),
        MediaError::InvalidInput(_) => ("INVALID_INPUT", false, LogLevel::Debug),
        MediaError::NotFound(_) => ("NOT_FOUND", false, LogLevel::Debug),
        MediaError::Internal(_) => ("INTERNAL_ERROR", true, LogLevel::Error),
        MediaError::InternalWithSource { .. } => ("INTERNAL_ERROR", true, LogLevel::Error),
    }
}

impl MediaError {
    /// Wrap a storage backend failure, keeping the original error as source.
    pub fn storage(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        MediaError::Storage {
            message: message.into(),
            source: source.into(),
        }
    }

    /// Machine-readable error code (e.g. "DISK_NOT_CONFIGURED")
    pub fn error_code(&self) -> &'static str {
        media_error_static_metadata(self).0
    }

    /// Whether retrying the same operation may succeed
    pub fn is_recoverable(&self) -> bool {
        media_error_static_metadata(self).1
    }

    /// Log level for this error
    pub fn log_level(&self) -> LogLevel {
        media_error_static_metadata(self).2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_metadata_database() {
        #[cfg(feature = "sqlx")]
        let err = MediaError::from(sqlx::Error::PoolClosed);
        #[cfg(not(feature = "sqlx"))]
        let err = MediaError::Database("pool closed".to_string());
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert!(err.is_recoverable());
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_invalid_conversion_is_not_recoverable() {
        let err = MediaError::InvalidConversion("thumb".to_string());
        assert_eq!(err.error_code(), "INVALID_CONVERSION");
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("thumb"));
    }

    #[test]
    fn test_disk_unwritable_preserves_source() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "read-only volume");
        let err = MediaError::DiskUnwritable {
            disk: "s3".to_string(),
            source: Box::new(io_err),
        };
        assert_eq!(err.error_code(), "DISK_UNWRITABLE");
        let source = err.source().map(|s| s.to_string()).unwrap_or_default();
        assert!(source.contains("read-only volume"));
    }

    #[test]
    fn test_io_error_maps_to_storage() {
        let err = MediaError::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.error_code(), "STORAGE_ERROR");
        assert_eq!(err.log_level(), LogLevel::Error);
    }
}
