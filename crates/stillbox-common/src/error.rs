//! Common error types used throughout stillbox.
//!
//! Every component boundary returns one of these kinds so callers are forced
//! to handle each failure class explicitly. Validation, session, security,
//! and processing errors map to distinct HTTP behavior at the server layer.

/// Common error type for stillbox.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input: bad shape, disallowed filename, or a magic-byte mismatch.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Input exceeded the configured size ceiling.
    #[error("File size {actual} exceeds maximum allowed size ({max} bytes)")]
    SizeLimit {
        /// Actual (or declared) size in bytes.
        actual: u64,
        /// Maximum allowed size in bytes.
        max: u64,
    },

    /// Upload session problem: unknown, expired, or foreign token, or an
    /// offset conflict. The client may retry with a fresh init.
    #[error("Upload session error: {0}")]
    Session(String),

    /// Security check failed (symlink detected, lockdown failure). The
    /// message is for logs; it must never be sent to clients verbatim.
    #[error("Security check failed: {0}")]
    Security(String),

    /// Decode/encode failure on content that passed signature validation.
    #[error("Image processing failed: {0}")]
    Processing(String),

    /// The requested resource was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller does not own the resource.
    #[error("Forbidden")]
    Forbidden,

    /// The operation conflicts with current references to the resource.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new Validation error.
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new Session error.
    pub fn session<S: Into<String>>(msg: S) -> Self {
        Self::Session(msg.into())
    }

    /// Create a new Security error.
    pub fn security<S: Into<String>>(msg: S) -> Self {
        Self::Security(msg.into())
    }

    /// Create a new Processing error.
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new Conflict error.
    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a new Database error.
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::validation("magic bytes do not match declared type");
        assert_eq!(
            err.to_string(),
            "Validation failed: magic bytes do not match declared type"
        );

        let err = Error::SizeLimit {
            actual: 21_000_000,
            max: 20_971_520,
        };
        assert!(err.to_string().contains("21000000"));

        let err = Error::session("unknown session token");
        assert_eq!(err.to_string(), "Upload session error: unknown session token");

        let err = Error::Forbidden;
        assert_eq!(err.to_string(), "Forbidden");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_constructors() {
        assert!(matches!(Error::validation("x"), Error::Validation(_)));
        assert!(matches!(Error::session("x"), Error::Session(_)));
        assert!(matches!(Error::security("x"), Error::Security(_)));
        assert!(matches!(Error::processing("x"), Error::Processing(_)));
        assert!(matches!(Error::not_found("x"), Error::NotFound(_)));
        assert!(matches!(Error::conflict("x"), Error::Conflict(_)));
        assert!(matches!(Error::database("x"), Error::Database(_)));
    }

    #[test]
    fn test_result_type() {
        fn ok_fn() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(ok_fn().unwrap(), 42);

        fn err_fn() -> Result<i32> {
            Err(Error::Forbidden)
        }
        assert!(err_fn().is_err());
    }
}
