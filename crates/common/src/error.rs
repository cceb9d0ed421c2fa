//! Common error types for Faultline components.

use std::fmt;

/// A specialized Result type for Faultline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for Faultline operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unable to start server on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to gracefully shutdown the server: {0}")]
    Serve(std::io::Error),

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Unknown error: {0}")]
    Other(String),
}

impl Error {
    /// Create a new configuration error.
    pub fn config(msg: impl fmt::Display) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create a new bind error for `addr`.
    pub fn bind(addr: impl fmt::Display, source: std::io::Error) -> Self {
        Error::Bind {
            addr: addr.to_string(),
            source,
        }
    }

    /// Create a new HTTP client error.
    pub fn client(msg: impl fmt::Display) -> Self {
        Error::Client(msg.to_string())
    }

    /// Create a new other error.
    pub fn other(msg: impl fmt::Display) -> Self {
        Error::Other(msg.to_string())
    }
}
