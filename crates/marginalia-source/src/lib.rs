//! Marginalia Content Source
//!
//! Retrieves book text and catalogue metadata from a remote digital library
//! and strips publisher boilerplate from the text.
//!
//! # Architecture
//!
//! The orchestrator depends only on the [`ContentSource`] trait, so tests can
//! substitute a stub. [`GutenbergSource`] is the production implementation.

#![warn(missing_docs)]

pub mod clean;
pub mod error;
pub mod gutenberg;
pub mod metadata;

use async_trait::async_trait;
use marginalia_domain::{BookId, BookMetadata};

pub use clean::clean_book_content;
pub use error::SourceError;
pub use gutenberg::{GutenbergConfig, GutenbergSource};
pub use metadata::parse_metadata;

/// A remote library that can supply book text and metadata
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetch catalogue metadata for a book
    async fn get_metadata(&self, id: &BookId) -> Result<BookMetadata, SourceError>;

    /// Fetch the raw plain text of a book
    async fn get_content(&self, id: &BookId) -> Result<String, SourceError>;

    /// Strip boilerplate from raw text
    fn clean_content(&self, raw: &str) -> String {
        clean_book_content(raw)
    }
}
