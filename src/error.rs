//! Error taxonomy shared by every core operation.
//!
//! Only [`CaptionError::Configuration`] is fatal for a session. Everything
//! else is reported to the user and the session stays usable.

use thiserror::Error;

/// Errors produced by the caption workflow.
#[derive(Error, Debug)]
pub enum CaptionError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("authorization code exchange failed: {0}")]
    Exchange(String),

    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("no caption tracks found for this video or captions are not accessible")]
    EmptyResult,

    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl CaptionError {
    /// Whether the error halts the whole session rather than a single action.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub(crate) fn input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, CaptionError>;
