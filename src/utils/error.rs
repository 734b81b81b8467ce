use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Export sink could not be written
    #[error("Export failed: {0}")]
    ExportError(String),

    /// Search pattern did not compile
    #[error("Invalid search pattern: {0}")]
    InvalidPattern(String),

    /// Request was well-formed but cannot be acted on
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type for application
pub type AppResult<T> = Result<T, AppError>;
