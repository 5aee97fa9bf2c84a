use thiserror::Error;

/// Errors produced by policy signing and the ingestion pipeline
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// Signer input rejected before any crypto work
    #[error("Invalid policy options: {0}")]
    InvalidPolicyOptions(String),

    /// Upload target rejected before any I/O
    #[error("Invalid upload target: {0}")]
    InvalidTarget(String),

    /// Inline image is not a `data:<mime>;base64,<payload>` string
    #[error("Malformed data URI: {0}")]
    MalformedDataUri(String),

    /// Image payload could not be decoded
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Operation requested on a format it does not support
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// Store rejected the object or the network failed
    #[error("Upload to s3://{bucket}/{key} failed: {message}")]
    Upload {
        bucket: String,
        key: String,
        message: String,
    },

    /// File not found on local filesystem
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    /// Permission denied accessing local file
    #[error("Permission denied: {path}")]
    PermissionDenied { path: String },

    /// Other local IO failure
    #[error("IO error on {path}: {message}")]
    Io { path: String, message: String },

    /// Batch deadline elapsed before the item completed
    #[error("Timed out before the item completed")]
    Timeout,

    /// The worker running the item died without reporting
    #[error("Worker failed: {0}")]
    WorkerFailed(String),
}

impl IngestError {
    /// Create an upload error from a store failure
    pub fn from_store_error<E: std::fmt::Display>(bucket: &str, key: &str, error: E) -> Self {
        Self::Upload {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: error.to_string(),
        }
    }

    /// Create an error from an IO error with context
    pub fn from_io_error(error: std::io::Error, path: &str) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::FileNotFound {
                path: path.to_string(),
            },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: path.to_string(),
            },
            _ => Self::Io {
                path: path.to_string(),
                message: error.to_string(),
            },
        }
    }

    /// True for errors raised by input validation, before any side effect
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidPolicyOptions(_) | Self::InvalidTarget(_)
        )
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            Self::FileNotFound { path } => {
                format!(
                    "File not found: {}\n\nPossible solutions:\n  \
                     1. Check if the file path is correct\n  \
                     2. Verify the file exists: ls -la {}",
                    path, path
                )
            }
            Self::PermissionDenied { path } => {
                format!(
                    "Permission denied: {}\n\nPossible solutions:\n  \
                     1. Check file permissions: ls -l {}\n  \
                     2. Ensure you have read access to the file",
                    path, path
                )
            }
            Self::Upload {
                bucket, message, ..
            } if message.to_lowercase().contains("access denied")
                || message.to_lowercase().contains("forbidden") =>
            {
                format!(
                    "Access denied for bucket '{}': {}\n\nPossible solutions:\n  \
                     1. Check AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY in .env\n  \
                     2. Verify the key is allowed to PutObject with a public-read ACL\n  \
                     3. Check AWS_REGION in .env matches bucket region",
                    bucket, message
                )
            }
            Self::Decode(message) => {
                format!(
                    "Failed to decode image: {}\n\nOnly PNG and JPEG images can be uploaded \
                     with dimensions; use plain file upload for anything else",
                    message
                )
            }
            Self::Timeout => "Timed out before the item completed\n\nPossible solutions:\n  \
                 1. Raise UPLOAD_TIMEOUT_SECS\n  \
                 2. Try again with --max-concurrent 1"
                .to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for signing and ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_error_maps_kinds() {
        let err = IngestError::from_io_error(
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
            "a.png",
        );
        assert_eq!(
            err,
            IngestError::FileNotFound {
                path: "a.png".to_string()
            }
        );

        let err = IngestError::from_io_error(
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope"),
            "b.png",
        );
        assert!(matches!(err, IngestError::PermissionDenied { .. }));

        let err = IngestError::from_io_error(std::io::Error::other("disk on fire"), "c.png");
        assert!(matches!(err, IngestError::Io { .. }));
    }

    #[test]
    fn test_upload_error_display() {
        let err = IngestError::from_store_error("photos", "avatars/x.png", "connection reset");
        assert_eq!(
            err.to_string(),
            "Upload to s3://photos/avatars/x.png failed: connection reset"
        );
    }

    #[test]
    fn test_user_message_access_denied() {
        let err = IngestError::from_store_error("photos", "k", "AccessDenied: Access Denied");
        assert!(err.user_message().contains("Possible solutions"));
        assert!(err.user_message().contains("photos"));
    }

    #[test]
    fn test_is_validation() {
        assert!(IngestError::InvalidTarget("bucket".into()).is_validation());
        assert!(IngestError::InvalidPolicyOptions("size".into()).is_validation());
        assert!(!IngestError::Timeout.is_validation());
    }
}
