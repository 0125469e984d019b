//! Error types for the story board engine

use crate::store::StoreError;
use thiserror::Error;

/// Result type for board operations
pub type Result<T> = std::result::Result<T, BoardError>;

/// Errors that can occur in board operations
#[derive(Debug, Error)]
pub enum BoardError {
    /// Story not found on the board
    #[error("story not found: {key}")]
    StoryNotFound { key: String },

    /// Column is not part of the configured workflow
    #[error("column not found: {id}")]
    ColumnNotFound { id: String },

    /// Story is open for editing and cannot be moved from elsewhere
    #[error("story '{key}' is being edited")]
    StoryEditing { key: String },

    /// A save for this story is still outstanding
    #[error("save already in progress for story '{key}'")]
    SaveInProgress { key: String },

    /// Story has never been persisted
    #[error("story '{key}' has not been saved yet")]
    NotPersisted { key: String },

    /// Transition not offered for the story's type and state
    #[error("cannot {transition} a {story_type} story in state {state}")]
    InvalidTransition {
        transition: String,
        story_type: String,
        state: String,
    },

    /// Invalid field value
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    /// The ordered story collection is inconsistent
    #[error("ordering invariant violated: {message}")]
    OrderingInvariant { message: String },

    /// Board is read-only
    #[error("board is read-only")]
    ReadOnly,

    /// Configuration could not be loaded or is invalid
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Persistence collaborator failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BoardError {
    /// Create a story-not-found error
    pub fn story_not_found(key: impl ToString) -> Self {
        Self::StoryNotFound {
            key: key.to_string(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an ordering invariant error
    pub fn ordering(message: impl Into<String>) -> Self {
        Self::OrderingInvariant {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl ToString) -> Self {
        Self::Config {
            message: message.to_string(),
        }
    }

    /// Whether the user can recover by retrying or correcting input.
    ///
    /// Invariant violations and configuration errors are not recoverable.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::OrderingInvariant { .. } | Self::Config { .. })
    }
}
