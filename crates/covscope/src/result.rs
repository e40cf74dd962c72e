//! Result and error types for Covscope.

use thiserror::Error;

/// Result type for Covscope operations
pub type CovscopeResult<T> = Result<T, CovscopeError>;

/// Errors that can occur while collecting and scoping coverage
#[derive(Debug, Error)]
pub enum CovscopeError {
    /// The per-invocation manifest is structurally invalid (fatal)
    #[error("Malformed coverage manifest: {message}")]
    ManifestMalformed {
        /// Error message
        message: String,
    },

    /// A raw path cannot be mapped to any repository location (recoverable)
    #[error("Cannot resolve {raw} to a repository path")]
    UnresolvablePath {
        /// Path as emitted by the toolchain
        raw: String,
    },

    /// A raw coverage artifact could not be decoded (recoverable)
    #[error("Failed to decode coverage artifact {artifact}: {message}")]
    ReaderDecode {
        /// Artifact that failed
        artifact: String,
        /// Error message
        message: String,
    },

    /// The output sink could not be opened or written (fatal)
    #[error("Failed to write coverage output {path}: {message}")]
    SinkWrite {
        /// Sink location
        path: String,
        /// Error message
        message: String,
    },

    /// Engine configuration is invalid
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// A scope token could not be parsed
    #[error("Invalid scope token {token:?}: {message}")]
    InvalidScopeToken {
        /// Token as supplied by the caller
        token: String,
        /// Error message
        message: String,
    },

    /// The owning invocation was cancelled before output was written
    #[error("Coverage collection cancelled")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl CovscopeError {
    /// Create a malformed-manifest error
    #[must_use]
    pub fn manifest(message: impl Into<String>) -> Self {
        Self::ManifestMalformed {
            message: message.into(),
        }
    }

    /// Create an unresolvable-path error
    #[must_use]
    pub fn unresolvable(raw: impl Into<String>) -> Self {
        Self::UnresolvablePath { raw: raw.into() }
    }

    /// Create a reader decode error
    #[must_use]
    pub fn decode(artifact: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ReaderDecode {
            artifact: artifact.into(),
            message: message.into(),
        }
    }

    /// Create a sink write error
    #[must_use]
    pub fn sink(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid scope token error
    #[must_use]
    pub fn scope_token(token: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidScopeToken {
            token: token.into(),
            message: message.into(),
        }
    }

    /// Whether the error aborts the whole invocation
    ///
    /// Per-artifact failures are isolated to that artifact.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::UnresolvablePath { .. } | Self::ReaderDecode { .. }
        )
    }
}
