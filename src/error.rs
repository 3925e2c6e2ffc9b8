//! Error types shared by the pipeline, the facade and the filesystem helpers.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// An unknown response mode name was given to the mode setter.
    #[error("Invalid response type '{0}'. Valid types are: array, object, json, raw")]
    InvalidResponseMode(String),

    /// An HTTP method outside GET/POST/PUT/PATCH/DELETE.
    #[error("Unsupported HTTP method '{0}'")]
    InvalidMethod(String),

    /// A header line that is not `Name: value` with a valid name and value.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Connection, timeout, DNS or TLS failure. Only surfaced in raw mode;
    /// enveloped modes capture it in the error envelope instead.
    #[error("Transport error: {message}")]
    Transport { message: String, status: u16 },

    /// A request or response interceptor failed.
    #[error("Interceptor failed: {0:#}")]
    Interceptor(anyhow::Error),

    /// The envelope reported failure after all retries.
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// A successful envelope without a `data` field.
    #[error("No data in response")]
    MissingData,

    /// The response data could not be converted into the requested type.
    #[error("Failed to decode response data: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Failed to encode response envelope: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Empty response received from server")]
    EmptyResponse,

    #[error("Failed to write file to: {}: {cause:#}", .path.display())]
    Write { path: PathBuf, cause: anyhow::Error },

    #[error("File was not created at: {}", .0.display())]
    FileNotCreated(PathBuf),

    /// Any other filesystem failure reported by the runtime.
    #[error(transparent)]
    Io(anyhow::Error),
}

impl Error {
    /// True for errors raised while the request itself was on the wire.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport { .. })
    }
}
