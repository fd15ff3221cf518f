// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid job phase transition: {from} -> {to}")]
    InvalidPhaseTransition { from: String, to: String },

    #[error("Missing required parameter: --{0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for --{name}: {value}")]
    InvalidParameter { name: &'static str, value: String },

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
