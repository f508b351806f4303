//! Error types for Vidra Core

use thiserror::Error;

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, Error>;

/// Session error types
#[derive(Error, Debug)]
pub enum Error {
    // Source errors
    #[error("Invalid media descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("No playable tracks ({attempted} descriptors attempted)")]
    NoPlayableTracks { attempted: usize },

    #[error("Failed to parse manifest: {0}")]
    ManifestParse(String),

    // Engine errors
    #[error("Engine fault {code}: {message}")]
    EngineFault { code: String, message: String },

    // Lifecycle errors
    #[error("Render surface unavailable")]
    SurfaceUnavailable,

    #[error("Session disposed")]
    SessionDisposed,

    #[error("Invalid lifecycle transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an engine fault
    pub fn engine(code: impl Into<String>, message: impl Into<String>) -> Self {
        Error::EngineFault {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Returns true if this error prevents a session from ever becoming active.
    ///
    /// Nothing in this crate retries; fatal errors mean dispose and recreate.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::InvalidDescriptor(_) | Error::NoPlayableTracks { .. } | Error::ManifestParse(_)
        )
    }

    /// Returns the error code reported to the host
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidDescriptor(_) => "INVALID_DESCRIPTOR",
            Error::NoPlayableTracks { .. } => "NO_PLAYABLE_TRACKS",
            Error::ManifestParse(_) => "MANIFEST_PARSE",
            Error::EngineFault { .. } => "ENGINE_FAULT",
            Error::SurfaceUnavailable => "SURFACE_UNAVAILABLE",
            Error::SessionDisposed => "SESSION_DISPOSED",
            Error::InvalidStateTransition { .. } => "INVALID_STATE",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Json(_) => "JSON",
            Error::Io(_) => "IO",
        }
    }
}
