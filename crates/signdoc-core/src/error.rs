//! Error types for the signing core

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid placement: {0}")]
    Validation(String),

    #[error("No signatures to finalize")]
    NoSignatures,

    #[error("Failed to decode mark image: {0}")]
    ImageDecode(String),

    #[error("Failed to finalize document: {0}")]
    FinalizeFailed(String),

    #[error("Backend error: {0}")]
    Backend(#[from] anyhow::Error),
}
