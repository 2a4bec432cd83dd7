//! Error types for the response pipeline.

use prompter_core::error::CoreError;

/// Errors from the chat pipeline.
///
/// Malformed model output is deliberately absent: the action parser
/// degrades to a plain-text reply instead of erroring (see
/// [`crate::parser`]).
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("a submission is already in flight")]
    Busy,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("search error: {0}")]
    Search(String),
    #[error("workflow error: {0}")]
    Workflow(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<CoreError> for ChatError {
    fn from(err: CoreError) -> Self {
        ChatError::Storage(err.to_string())
    }
}
