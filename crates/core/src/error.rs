//! Error types for regionstore
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Every error is scoped to the region or operation that raised it; none of
//! them is meant to take the whole process down.

use std::io;
use thiserror::Error;

/// Result type alias for regionstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the snapshot and bootstrap layer
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid on-disk layout or configuration (e.g. snapshot base path is a file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed snapshot file name
    #[error("Parse error: {0}")]
    Parse(String),

    /// Requested artifact does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Quota eviction could not bring snapshot usage under the limit
    #[error("Quota exhausted: {0}")]
    QuotaExhausted(String),

    /// Store or engine already carries bootstrap state
    #[error("Already bootstrapped: {0}")]
    AlreadyBootstrapped(String),

    /// I/O error with the operation it happened in
    #[error("I/O error: {context}: {source}")]
    Io {
        /// What was being done
        context: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Serialization/deserialization error
    #[error("Codec error: {0}")]
    Codec(String),

    /// Checksum or framing mismatch
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// Storage engine failure
    #[error("Engine error: {0}")]
    Engine(String),

    /// Operation not valid for the handle's current role or state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    /// Wrap an I/O error with context
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }

    /// The quota-exhaustion error raised by snapshot eviction
    pub fn too_many_snapshots() -> Self {
        Error::QuotaExhausted("too many snapshots".to_string())
    }

    /// Check if this is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::io("", e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Codec(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Error::Codec(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Error::Codec(e.to_string())
    }
}

/// Attach context to `std::io::Result` values
pub trait IoResultExt<T> {
    /// Convert into a regionstore `Result`, recording what was being done
    fn ctx<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn ctx<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| Error::io(f(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("/tmp/snap should be a directory".to_string());
        let msg = err.to_string();
        assert!(msg.contains("Configuration error"));
        assert!(msg.contains("should be a directory"));
    }

    #[test]
    fn test_error_display_quota() {
        let msg = Error::too_many_snapshots().to_string();
        assert!(msg.contains("too many snapshots"));
    }

    #[test]
    fn test_error_display_io_with_context() {
        let err = Error::io(
            "remove /tmp/x.tmp",
            io::Error::new(io::ErrorKind::PermissionDenied, "access denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("remove /tmp/x.tmp"));
        assert!(msg.contains("access denied"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_ctx_extension() {
        let res: io::Result<()> = Err(io::Error::new(io::ErrorKind::Other, "boom"));
        let err = res.ctx(|| "stat base dir").unwrap_err();
        match err {
            Error::Io { context, .. } => assert_eq!(context, "stat base dir"),
            _ => panic!("Wrong error variant"),
        }
    }

    #[test]
    fn test_error_from_json() {
        let result: Result<u64> = serde_json::from_slice::<u64>(b"not json").map_err(|e| e.into());
        assert!(matches!(result, Err(Error::Codec(_))));
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::NotFound("snapshot".into()).is_not_found());
        assert!(!Error::Parse("x".into()).is_not_found());
    }
}
