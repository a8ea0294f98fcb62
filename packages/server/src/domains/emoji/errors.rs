use serde::Serialize;
use thiserror::Error;

/// One rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Errors surfaced by the ingestion and search pipelines.
///
/// `message` is the public text; sources are only logged.
#[derive(Error, Debug)]
pub enum EmojiError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Vec<FieldError>,
    },

    #[error("{message}")]
    Upstream {
        message: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("{message}")]
    Persistence {
        message: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl EmojiError {
    pub fn validation(message: impl Into<String>, details: Vec<FieldError>) -> Self {
        EmojiError::Validation {
            message: message.into(),
            details,
        }
    }

    pub fn upstream(message: &'static str, source: anyhow::Error) -> Self {
        EmojiError::Upstream { message, source }
    }

    pub fn persistence(message: &'static str, source: anyhow::Error) -> Self {
        EmojiError::Persistence { message, source }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, EmojiError::Validation { .. })
    }
}

pub type EmojiResult<T> = std::result::Result<T, EmojiError>;
