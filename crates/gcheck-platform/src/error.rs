//! Platform-specific errors

use thiserror::Error;

/// Platform-specific errors
#[derive(Error, Debug)]
pub enum PlatformError {
    /// A child process could not be started
    #[error("Failed to start '{program}': {message}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Error message
        message: String,
    },

    /// A process could not be killed
    #[error("Failed to kill '{0}'")]
    Kill(String),

    /// A service control command failed
    #[error("Service control '{action}' failed for '{service}'")]
    ServiceControl {
        /// `stop` or `delete`
        action: &'static str,
        /// Service name
        service: String,
    },

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Name resolution error
    #[error("DNS error: {0}")]
    Dns(String),

    /// Executable not found in any search location
    #[error("Executable '{name}' not found, searched: {searched}")]
    ExecutableNotFound {
        /// File name searched for
        name: String,
        /// Searched directories, comma separated
        searched: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Platform result type
pub type Result<T> = std::result::Result<T, PlatformError>;
