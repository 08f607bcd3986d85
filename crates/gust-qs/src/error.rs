//! Error types for gust-qs

use crate::plugin::PLUGIN_NAME;
use gust_host::Response;
use thiserror::Error;

/// Result type alias for gust-qs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the nested query plugin
#[derive(Debug, Error)]
pub enum Error {
    /// Plugin options failed validation. Fatal at registration.
    #[error("Invalid plugin options: {0}")]
    Configuration(String),

    /// Query string or payload could not be parsed
    #[error("{0}")]
    Parse(String),
}

impl Error {
    /// Client error response for a failed parse of `source`
    /// (`"query string"`, `"payload"`)
    pub fn to_response(&self, source: &str) -> Response {
        Response::bad_request(&format!("Invalid request {source}: {self}"))
    }
}

impl From<Error> for gust_host::Error {
    fn from(err: Error) -> Self {
        gust_host::Error::Plugin {
            name: PLUGIN_NAME.to_string(),
            message: err.to_string(),
        }
    }
}
