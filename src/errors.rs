//! Error types for the kajian-notes application.
//!
//! This module defines the error taxonomy shared by the storage gateway, the
//! note repository, the settings store and the reference lookups.

use std::io;

use thiserror::Error;

/// The main error type for the kajian-notes application.
#[derive(Error, Debug)]
pub enum NotesError {
    /// A durable read or write could not complete (quota, unavailable store,
    /// denied write, serialization issue).
    #[error("Storage failure: {message}")]
    StorageFailure { message: String },

    /// The repository was used before its initial load finished.
    #[error("Note repository is not ready yet")]
    NotReady,

    /// The external verse provider could not be reached or answered badly.
    #[error("Reference provider unavailable: {message}")]
    ProviderUnavailable { message: String },

    /// A storage key that cannot be mapped onto the store safely.
    #[error("Invalid storage key: {key:?}")]
    InvalidKey { key: String },

    /// Note was not found when the caller explicitly required it.
    #[error("Note not found: {id}")]
    NoteNotFound { id: String },

    /// Invalid user supplied value.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Errors related to configuration.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

impl NotesError {
    pub fn storage(message: impl Into<String>) -> Self {
        NotesError::StorageFailure {
            message: message.into(),
        }
    }

    pub fn provider(message: impl Into<String>) -> Self {
        NotesError::ProviderUnavailable {
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        NotesError::InvalidInput {
            message: message.into(),
        }
    }

    /// Whether this error means a durable write or read did not happen.
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, NotesError::StorageFailure { .. })
    }
}

impl From<io::Error> for NotesError {
    fn from(e: io::Error) -> Self {
        NotesError::storage(format!("I/O error: {}", e))
    }
}

impl From<serde_json::Error> for NotesError {
    fn from(e: serde_json::Error) -> Self {
        NotesError::storage(format!("Serialization error: {}", e))
    }
}

impl From<reqwest::Error> for NotesError {
    fn from(e: reqwest::Error) -> Self {
        NotesError::provider(e.to_string())
    }
}
