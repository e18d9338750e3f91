//! Error types for PaperPup.

use thiserror::Error;

/// Result type alias using PaperPup's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for PaperPup.
#[derive(Error, Debug)]
pub enum Error {
    // Audio errors
    /// The audio host, device or stream could not be brought up.
    #[error("Audio initialization failed: {0}")]
    InitializationFailure(String),

    #[error("Audio output error: {0}")]
    AudioOutput(String),

    // Input errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns true if this error leaves the engine unable to produce sound.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::InitializationFailure(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_fatal() {
        assert!(Error::InitializationFailure("no device".into()).is_fatal());
        assert!(!Error::InvalidArgument("test".into()).is_fatal());
        assert!(!Error::Config("test".into()).is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = Error::InitializationFailure("no output device".into());
        assert_eq!(
            err.to_string(),
            "Audio initialization failed: no output device"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
