// Central Error Type for the Application

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Failure classification reported on a failed job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Input,
    Credential,
    EngineRejected,
    EngineUnreachable,
    Transfer,
    DeadlineExceeded,
    Archive,
    Cancelled,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Input => write!(f, "INPUT_ERROR"),
            ErrorKind::Credential => write!(f, "CREDENTIAL_ERROR"),
            ErrorKind::EngineRejected => write!(f, "ENGINE_REJECTED"),
            ErrorKind::EngineUnreachable => write!(f, "ENGINE_UNREACHABLE"),
            ErrorKind::Transfer => write!(f, "TRANSFER_ERROR"),
            ErrorKind::DeadlineExceeded => write!(f, "DEADLINE_EXCEEDED"),
            ErrorKind::Archive => write!(f, "ARCHIVE_ERROR"),
            ErrorKind::Cancelled => write!(f, "CANCELLED"),
            ErrorKind::Internal => write!(f, "INTERNAL_ERROR"),
        }
    }
}

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Input error: {0}")]
    Input(crate::domain::DomainError),

    #[error("Credential error: {0}")]
    Credential(#[from] crate::port::CredentialError),

    #[error("Engine rejected operation: {0}")]
    EngineRejected(String),

    #[error("Engine unreachable: {0}")]
    EngineUnreachable(String),

    #[error("Transfer error: {0}")]
    Transfer(#[from] crate::port::TransferError),

    #[error("Deadline exceeded after {}s: {last_failure}", .waited.as_secs())]
    DeadlineExceeded {
        waited: Duration,
        last_failure: String,
    },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<crate::domain::DomainError> for AppError {
    fn from(err: crate::domain::DomainError) -> Self {
        use crate::domain::DomainError;
        match err {
            DomainError::InvalidPhaseTransition { .. } => AppError::Internal(err.to_string()),
            DomainError::InvalidManifest(_) => AppError::Archive(err.to_string()),
            other => AppError::Input(other),
        }
    }
}

impl AppError {
    /// Job-level classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Input(_) => ErrorKind::Input,
            AppError::Credential(_) => ErrorKind::Credential,
            AppError::EngineRejected(_) => ErrorKind::EngineRejected,
            AppError::EngineUnreachable(_) => ErrorKind::EngineUnreachable,
            AppError::Transfer(_) => ErrorKind::Transfer,
            AppError::DeadlineExceeded { .. } => ErrorKind::DeadlineExceeded,
            AppError::Archive(_) | AppError::Io(_) => ErrorKind::Archive,
            AppError::Cancelled => ErrorKind::Cancelled,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
