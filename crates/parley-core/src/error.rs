//! # Storage Error Types
//!
//! Errors raised while persisting or restoring the session credential.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The persisted token does not look like a bearer credential
    #[error("Invalid credential: {message}")]
    InvalidCredential { message: String },

    #[error("Storage error: {message}")]
    Other { message: String },
}

impl StorageError {
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    pub fn invalid_credential(message: impl Into<String>) -> Self {
        Self::InvalidCredential {
            message: message.into(),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
