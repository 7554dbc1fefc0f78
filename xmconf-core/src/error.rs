//! Error types for xmconf.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for xmconf operations.
pub type Result<T> = std::result::Result<T, XmError>;

/// Main error type for xmconf.
#[derive(Error, Debug)]
pub enum XmError {
    // Caller input errors
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    // Lookup errors
    #[error("Domain not found: {name}")]
    DomainNotFound { name: String },

    #[error("{what} not found: {key}")]
    NotFound { what: &'static str, key: String },

    // Configuration document errors
    #[error("Config value {key} was malformed: {reason}")]
    MalformedConfig { key: String, reason: String },

    #[error("Config syntax error at line {line}: {reason}")]
    ConfigSyntax { line: usize, reason: String },

    #[error("Invalid domain XML: {reason}")]
    InvalidXml { reason: String },

    // File system errors
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Capability errors
    #[error("Unsupported: {reason}")]
    Unsupported { reason: String },

    // Access errors
    #[error("Read-only session cannot {operation}")]
    ReadOnly { operation: &'static str },

    #[error("Domain {name} is in the wrong state: {reason}")]
    InvalidState { name: String, reason: String },
}

impl XmError {
    /// Shorthand for a field-level configuration error.
    pub fn malformed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedConfig { key: key.into(), reason: reason.into() }
    }

    /// Shorthand for a structured-document error.
    pub fn xml(reason: impl Into<String>) -> Self {
        Self::InvalidXml { reason: reason.into() }
    }

    /// Shorthand for a bad caller argument.
    pub fn invalid_arg(reason: impl Into<String>) -> Self {
        Self::InvalidArgument { reason: reason.into() }
    }

    /// Shorthand for an operation this definition cannot support.
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::Unsupported { reason: reason.into() }
    }

    /// Wrap an I/O error with the path it occurred at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

impl From<roxmltree::Error> for XmError {
    fn from(err: roxmltree::Error) -> Self {
        Self::InvalidXml { reason: err.to_string() }
    }
}
