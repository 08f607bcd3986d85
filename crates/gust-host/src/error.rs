//! Error types for gust-host

use thiserror::Error;

/// Result type alias for host operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the gust host
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid HTTP method
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// Invalid header
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Plugin rejected its registration
    #[error("Plugin {name} failed to register: {message}")]
    Plugin { name: String, message: String },

    /// Plugin registered twice
    #[error("Plugin {0} is already registered")]
    DuplicatePlugin(String),

    /// Route registered twice
    #[error("Route already defined: {method} {path}")]
    DuplicateRoute { method: String, path: String },

    /// IO error (native only)
    #[cfg(feature = "native")]
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
