//! Content source errors

use thiserror::Error;

/// Errors raised while retrieving a book from the remote library
///
/// The display text is what a failed fetch task reports to clients.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Every candidate text URL failed
    #[error("Failed to fetch book content from any URL")]
    ContentUnavailable,

    /// The catalogue page answered with a non-200 status
    #[error("Failed to fetch book metadata. Status code: {0}")]
    MetadataUnavailable(u16),

    /// Transport failure (connection, timeout, body decoding)
    #[error("Error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Http(err.to_string())
    }
}
