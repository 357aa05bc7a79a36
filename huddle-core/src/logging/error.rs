//! Error types for the logging subsystem

/// Errors that can occur in the logging subsystem
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to initialize logging: {0}")]
    InitializationFailed(String),

    #[error("invalid logging configuration: {0}")]
    InvalidConfiguration(String),
}
