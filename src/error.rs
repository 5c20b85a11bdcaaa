//! Centralized error handling for notedeck
//!
//! This module provides a unified error type that covers the failure modes
//! of the state manager: backend calls, file I/O in the filesystem backend,
//! configuration, and the distinguished "save cancelled" condition.

use log::warn;
use std::fmt;
use std::io;
use std::path::PathBuf;

// ─────────────────────────────────────────────────────────────────────────────
// Custom Result Type Alias
// ─────────────────────────────────────────────────────────────────────────────

/// A specialized `Result` type for the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The centralized error type for the crate.
#[derive(Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────
    // File I/O Errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Generic I/O error wrapper
    Io(io::Error),

    /// Failed to read file contents
    FileRead { path: PathBuf, source: io::Error },

    /// Failed to write file contents
    FileWrite { path: PathBuf, source: io::Error },

    // ─────────────────────────────────────────────────────────────────────────
    // Backend Errors
    // ─────────────────────────────────────────────────────────────────────────
    /// A backend call failed
    Backend {
        operation: &'static str,
        message: String,
    },

    /// The user dismissed the save dialog
    SaveCancelled,

    /// A file or folder name was rejected before reaching the backend
    InvalidName(String),

    /// An operation needed the editing widget but none is attached
    EditorUnavailable,

    // ─────────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Failed to load configuration file
    ConfigLoad {
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to save configuration file
    ConfigSave {
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to parse configuration (invalid JSON/format)
    ConfigParse {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration directory not found or inaccessible
    ConfigDirNotFound,

    // ─────────────────────────────────────────────────────────────────────────
    // Application Errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Generic application error with a message
    Application(String),
}

impl Error {
    /// Build a backend error for the named operation.
    pub fn backend(operation: &'static str, message: impl Into<String>) -> Self {
        Error::Backend {
            operation,
            message: message.into(),
        }
    }

    /// Whether this is the save-dialog cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::SaveCancelled)
    }
}

// Implement From traits for convenient error conversion
impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ConfigParse {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Display trait implementation for user-friendly error messages
// ─────────────────────────────────────────────────────────────────────────────
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // File I/O Errors
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::FileRead { path, source } => {
                write!(f, "Failed to read '{}': {}", path.display(), source)
            }
            Error::FileWrite { path, source } => {
                write!(f, "Failed to write '{}': {}", path.display(), source)
            }

            // Backend Errors
            Error::Backend { operation, message } => {
                write!(f, "{} failed: {}", operation, message)
            }
            Error::SaveCancelled => write!(f, "save cancelled"),
            Error::InvalidName(reason) => write!(f, "{}", reason),
            Error::EditorUnavailable => write!(f, "Editor is not ready"),

            // Configuration Errors
            Error::ConfigLoad { path, source } => {
                write!(
                    f,
                    "Failed to load configuration from '{}': {}",
                    path.display(),
                    source
                )
            }
            Error::ConfigSave { path, source } => {
                write!(
                    f,
                    "Failed to save configuration to '{}': {}",
                    path.display(),
                    source
                )
            }
            Error::ConfigParse { message, .. } => {
                write!(f, "Invalid configuration format: {}", message)
            }
            Error::ConfigDirNotFound => {
                write!(f, "Configuration directory not found")
            }

            // Application Errors
            Error::Application(msg) => write!(f, "{}", msg),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// std::error::Error trait implementation for error chaining
// ─────────────────────────────────────────────────────────────────────────────
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::FileRead { source, .. } | Error::FileWrite { source, .. } => Some(source),
            Error::ConfigLoad { source, .. } => Some(source.as_ref()),
            Error::ConfigSave { source, .. } => Some(source.as_ref()),
            Error::ConfigParse { source, .. } => source
                .as_ref()
                .map(|s| s.as_ref() as &(dyn std::error::Error + 'static)),
            Error::Backend { .. }
            | Error::SaveCancelled
            | Error::InvalidName(_)
            | Error::EditorUnavailable
            | Error::ConfigDirNotFound
            | Error::Application(_) => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Graceful Degradation Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Extension trait for Result to support graceful degradation.
pub trait ResultExt<T> {
    /// If the result is an error, log it at warning level and return the provided default.
    fn unwrap_or_warn_default(self, default: T, context: &str) -> T;
}

impl<T> ResultExt<T> for Result<T> {
    fn unwrap_or_warn_default(self, default: T, context: &str) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                warn!("{}: {}. Using default.", context, err);
                default
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_creation() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "test error");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_file_read_error() {
        let path = PathBuf::from("/notes/missing.md");
        let err = Error::FileRead {
            path: path.clone(),
            source: io::Error::new(io::ErrorKind::NotFound, "gone"),
        };
        assert!(matches!(err, Error::FileRead { path: ref p, .. } if *p == path));
        assert!(err.to_string().contains("missing.md"));
    }

    #[test]
    fn test_save_cancelled_is_distinguished() {
        assert!(Error::SaveCancelled.is_cancelled());
        assert!(!Error::backend("SaveDocument", "disk full").is_cancelled());
        assert_eq!(Error::SaveCancelled.to_string(), "save cancelled");
    }

    #[test]
    fn test_display_backend_error() {
        let err = Error::backend("RenameFile", "target exists");
        assert_eq!(err.to_string(), "RenameFile failed: target exists");
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_result: std::result::Result<String, _> = serde_json::from_str("invalid json");
        let err = Error::from(json_result.unwrap_err());
        assert!(matches!(err, Error::ConfigParse { .. }));
    }

    #[test]
    fn test_error_source_io() {
        use std::error::Error as StdError;
        let err = Error::Io(io::Error::new(io::ErrorKind::NotFound, "not found"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_error_source_none_for_simple_variants() {
        use std::error::Error as StdError;
        assert!(Error::Application("test".to_string()).source().is_none());
        assert!(Error::SaveCancelled.source().is_none());
        assert!(Error::EditorUnavailable.source().is_none());
    }

    #[test]
    fn test_unwrap_or_warn_default_err() {
        let result: Result<i32> = Err(Error::Application("test".to_string()));
        assert_eq!(result.unwrap_or_warn_default(7, "test context"), 7);
    }

    #[test]
    fn test_unwrap_or_warn_default_ok() {
        let result: Result<i32> = Ok(42);
        assert_eq!(result.unwrap_or_warn_default(0, "test context"), 42);
    }
}
