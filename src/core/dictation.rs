//! Speech-to-text capability port.
//!
//! Dictation is optional: a session built without a [`DictationPort`] simply
//! reports itself as unsupported. A port produces one finalized transcript per
//! call to [`DictationPort::listen`], which the session merges into the draft.

use std::error::Error as StdError;
use std::fmt;

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictationError {
    Unsupported,
    Cancelled,
    Provider(String),
}

impl fmt::Display for DictationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DictationError::Unsupported => write!(f, "voice input is not supported"),
            DictationError::Cancelled => write!(f, "dictation cancelled"),
            DictationError::Provider(msg) => write!(f, "speech recognition error: {msg}"),
        }
    }
}

impl StdError for DictationError {}

#[async_trait]
pub trait DictationPort: Send + Sync {
    fn is_supported(&self) -> bool {
        true
    }

    async fn listen(&self) -> Result<String, DictationError>;
}

/// Appends `transcript` to `draft`, inserting a single space unless the
/// draft is empty or already ends in whitespace.
pub fn merge_transcript(draft: &str, transcript: &str) -> String {
    let needs_space = !draft.is_empty() && !draft.ends_with(char::is_whitespace);
    let mut merged = String::with_capacity(draft.len() + transcript.len() + 1);
    merged.push_str(draft);
    if needs_space {
        merged.push(' ');
    }
    merged.push_str(transcript);
    merged
}
