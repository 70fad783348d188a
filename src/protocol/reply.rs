//! Reply definitions
//!
//! Represents replies sent to clients.

use crate::error::EmberError;

/// A RESP reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+<text>`
    Simple(String),

    /// `-<text>`; the text starts with an error code such as `ERR`
    Error(String),

    /// `:<n>`
    Integer(i64),

    /// `$<len>` followed by the bytes
    Bulk(Vec<u8>),

    /// `$-1`
    Null,

    /// `*<n>` followed by n replies
    Array(Vec<Reply>),
}

impl Reply {
    /// `+OK`
    pub fn ok() -> Self {
        Reply::Simple("OK".to_string())
    }

    /// `-ERR <message>`
    pub fn error(message: impl std::fmt::Display) -> Self {
        Reply::Error(format!("ERR {}", message))
    }

    /// Map an engine error to the error reply a Redis client expects
    pub fn from_error(error: &EmberError) -> Self {
        match error {
            // Display already carries the WRONGTYPE code
            EmberError::WrongType => Reply::Error(error.to_string()),
            EmberError::Protocol(message) => Reply::error(message),
            other => Reply::error(other),
        }
    }

    /// Bulk array from raw values
    pub fn bulk_array(values: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Reply::Array(values.into_iter().map(Reply::Bulk).collect())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }
}
