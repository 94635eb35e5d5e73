use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize)]
pub enum AppError {
    Internal(String),
    BadRequest(String),
    UnsupportedFormat(String),
    PayloadNotFound(String),
    ArchiveCorrupt(String),
    MalformedCsv(String),
    DatabaseError(String),
    Config(String),
    IoError(String),
}

impl AppError {
    /// Errors caused by the uploaded content rather than by the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::BadRequest(_)
                | AppError::UnsupportedFormat(_)
                | AppError::PayloadNotFound(_)
                | AppError::ArchiveCorrupt(_)
                | AppError::MalformedCsv(_)
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::UnsupportedFormat(msg) => write!(f, "Unsupported archive type: {}", msg),
            AppError::PayloadNotFound(msg) => write!(f, "Payload not found: {}", msg),
            AppError::ArchiveCorrupt(msg) => write!(f, "Corrupt archive: {}", msg),
            AppError::MalformedCsv(msg) => write!(f, "Malformed CSV: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(AppError::PayloadNotFound("x".into()).is_client_error());
        assert!(AppError::MalformedCsv("x".into()).is_client_error());
        assert!(!AppError::DatabaseError("x".into()).is_client_error());
        assert!(!AppError::Internal("x".into()).is_client_error());
    }

    #[test]
    fn test_display_keeps_message() {
        let err = AppError::UnsupportedFormat("rar".to_string());
        assert_eq!(err.to_string(), "Unsupported archive type: rar");
    }
}
