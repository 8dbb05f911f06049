//! Error types for gcheck-core
//!
//! Centralized error handling using `thiserror` for ergonomic error definitions.
//! Probe-level failures are never errors: they are recorded as
//! [`ProbeOutcome`](crate::probe::ProbeOutcome) values instead.

use thiserror::Error;

/// Main error type for gcheck-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed strategy-definition source
    #[error("Strategy list error at line {line}: {message}")]
    Compile {
        /// 1-based line number in the source
        line: usize,
        /// Error message
        message: String,
    },

    /// No usable strategies, or a required scalar setting is missing
    #[error("Strategy configuration error: {0}")]
    Configuration(String),

    /// The external program could not be started
    #[error("Failed to launch '{program}': {message}")]
    Launch {
        /// Executable that failed to start
        program: String,
        /// Error message
        message: String,
    },

    /// The external program could not be confirmed stopped
    #[error("Failed to terminate external program: {message}")]
    Teardown {
        /// Error message
        message: String,
    },

    /// Expansion bookkeeping disagreed with itself
    #[error("Internal consistency fault: {0}")]
    Internal(String),

    /// Settings error
    #[error("Settings error: {0}")]
    Settings(String),

    /// Settings file not found
    #[error("Settings file not found: {path}")]
    SettingsNotFound {
        /// Path to the missing settings file
        path: String,
    },

    /// Invalid settings value
    #[error("Invalid settings value for '{key}': {message}")]
    SettingsValue {
        /// Settings key
        key: String,
        /// Error message
        message: String,
    },

    /// Checklist file error
    #[error("Checklist error for '{path}': {message}")]
    Checklist {
        /// Path to the checklist file
        path: String,
        /// Error message
        message: String,
    },

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Hex decoding error
    #[error("Hex decoding error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a compile error for a source line
    pub fn compile(line: usize, message: impl Into<String>) -> Self {
        Self::Compile {
            line,
            message: message.into(),
        }
    }

    /// Create a launch error
    pub fn launch(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Launch {
            program: program.into(),
            message: message.into(),
        }
    }

    /// Create a teardown error
    pub fn teardown(message: impl Into<String>) -> Self {
        Self::Teardown {
            message: message.into(),
        }
    }

    /// Create a settings value error
    pub fn settings_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SettingsValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::compile(7, "unexpected content");
        assert!(err.to_string().contains("line 7"));
        assert!(err.to_string().contains("unexpected content"));

        let err = Error::launch("winws.exe", "not found");
        assert!(err.to_string().contains("winws.exe"));
        assert!(err.to_string().contains("not found"));
    }
}
