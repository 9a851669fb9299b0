//! Error types for the reference builder.
//!
//! Two tiers: [`RefError`] aborts construction before any manifest is
//! emitted, [`SlotError`] is local to one (time, member) slot and is carried
//! as data into the gaps report.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using RefError.
pub type RefResult<T> = Result<T, RefError>;

/// Fatal errors for a reference build.
#[derive(Debug, Error)]
pub enum RefError {
    #[error("coordinate grid has no slots but at least one was required")]
    EmptyGrid,

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("run cancelled before the manifest was assembled")]
    Cancelled,

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors confined to a single grid slot.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotError {
    #[error("malformed index: {reason}")]
    MalformedIndex { reason: String },

    #[error("selector {selector} matched {matches} index records, expected exactly one")]
    VariableNotFound { selector: String, matches: usize },

    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },
}

impl SlotError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedIndex {
            reason: reason.into(),
        }
    }

    pub fn transport(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Short label used in log fields and summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            SlotError::MalformedIndex { .. } => "malformed_index",
            SlotError::VariableNotFound { .. } => "variable_not_found",
            SlotError::Transport { .. } => "transport",
        }
    }
}
