//! Book module - identifiers, metadata and fetched content

use crate::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of characters of cleaned text kept in a record's preview
pub const PREVIEW_LENGTH: usize = 5000;

/// Marker appended to a preview that was truncated
const PREVIEW_ELLIPSIS: &str = "...";

/// Opaque identifier of a book in the remote library
///
/// The identifier is the sole correlation key across all caches and tasks.
/// Surrounding whitespace is stripped; nothing else about its format is checked.
///
/// # Examples
///
/// ```
/// use marginalia_domain::BookId;
///
/// let id = BookId::parse(" 1787 ").unwrap();
/// assert_eq!(id.as_str(), "1787");
/// assert!(BookId::parse("   ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(String);

impl BookId {
    /// Parse a book identifier from caller input
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::EmptyBookId);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Descriptive metadata scraped from a book's catalogue page
///
/// Every field has a sentinel ("Unknown ...", zero, or empty) used when the
/// page does not provide it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookMetadata {
    /// Identifier the metadata was fetched for
    pub id: BookId,
    /// Book title
    pub title: String,
    /// Primary author
    pub author: String,
    /// Language name as displayed by the library
    pub language: String,
    /// Subject headings, in page order
    pub subjects: Vec<String>,
    /// Release date as displayed by the library
    pub release_date: String,
    /// Download counter
    pub download_count: u64,
    /// Absolute URL of the cover image
    pub cover_url: String,
}

impl BookMetadata {
    /// Metadata with every field at its sentinel value
    pub fn unknown(id: BookId) -> Self {
        Self {
            id,
            title: "Unknown Title".to_string(),
            author: "Unknown Author".to_string(),
            language: "Unknown Language".to_string(),
            subjects: Vec::new(),
            release_date: "Unknown Release Date".to_string(),
            download_count: 0,
            cover_url: String::new(),
        }
    }
}

/// A fetched and cleaned book
///
/// Created once per book when its fetch completes and never modified
/// afterwards. `full_content` is not serializable; read paths
/// expose [`BookSummary`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookRecord {
    /// Catalogue metadata
    pub metadata: BookMetadata,
    /// Bounded prefix of the cleaned text
    pub content_preview: String,
    /// Length of the cleaned text, in characters
    pub content_length: usize,
    /// The complete cleaned text
    pub full_content: String,
}

/// Public view of a [`BookRecord`], without the full text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSummary {
    /// Catalogue metadata
    pub metadata: BookMetadata,
    /// Bounded prefix of the cleaned text
    pub content_preview: String,
    /// Length of the cleaned text, in characters
    pub content_length: usize,
}

impl BookRecord {
    /// Build a record from metadata and cleaned text, deriving the preview
    pub fn new(metadata: BookMetadata, full_content: String) -> Self {
        let content_length = full_content.chars().count();
        let content_preview = if content_length > PREVIEW_LENGTH {
            let mut preview: String = full_content.chars().take(PREVIEW_LENGTH).collect();
            preview.push_str(PREVIEW_ELLIPSIS);
            preview
        } else {
            full_content.clone()
        };

        Self {
            metadata,
            content_preview,
            content_length,
            full_content,
        }
    }

    /// Metadata, preview and length, without the full text
    pub fn summary(&self) -> BookSummary {
        BookSummary {
            metadata: self.metadata.clone(),
            content_preview: self.content_preview.clone(),
            content_length: self.content_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn metadata() -> BookMetadata {
        BookMetadata {
            id: BookId::parse("1787").unwrap(),
            title: "Romeo and Juliet".to_string(),
            author: "William Shakespeare".to_string(),
            language: "English".to_string(),
            subjects: vec!["Drama".to_string()],
            release_date: "2021-08-05".to_string(),
            download_count: 12345,
            cover_url: "https://www.gutenberg.org/cache/epub/1787/pg1787.cover.medium.jpg"
                .to_string(),
        }
    }

    #[test]
    fn test_unknown_metadata_sentinels() {
        let meta = BookMetadata::unknown(BookId::parse("42").unwrap());
        assert_eq!(meta.title, "Unknown Title");
        assert_eq!(meta.author, "Unknown Author");
        assert_eq!(meta.download_count, 0);
        assert!(meta.subjects.is_empty());
    }

    #[test]
    fn test_book_id_trims_whitespace() {
        let id = BookId::parse("  42\n").unwrap();
        assert_eq!(id.as_str(), "42");
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_book_id_rejects_empty() {
        assert_eq!(BookId::parse(""), Err(DomainError::EmptyBookId));
        assert_eq!(BookId::parse(" \t "), Err(DomainError::EmptyBookId));
    }

    #[test]
    fn test_short_content_preview_is_untouched() {
        let record = BookRecord::new(metadata(), "A short book.".to_string());
        assert_eq!(record.content_preview, "A short book.");
        assert_eq!(record.content_length, 13);
    }

    #[test]
    fn test_long_content_preview_is_truncated() {
        let text = "x".repeat(PREVIEW_LENGTH + 10);
        let record = BookRecord::new(metadata(), text);
        assert_eq!(record.content_length, PREVIEW_LENGTH + 10);
        assert_eq!(record.content_preview.len(), PREVIEW_LENGTH + 3);
        assert!(record.content_preview.ends_with("..."));
    }

    #[test]
    fn test_preview_counts_characters_not_bytes() {
        let text = "é".repeat(PREVIEW_LENGTH);
        let record = BookRecord::new(metadata(), text);
        assert_eq!(record.content_length, PREVIEW_LENGTH);
        assert!(!record.content_preview.ends_with("..."));
    }

    #[test]
    fn test_summary_never_serializes_full_content() {
        let record = BookRecord::new(metadata(), "Full text of the book".to_string());
        let json = serde_json::to_value(record.summary()).unwrap();
        assert!(json.get("full_content").is_none());
        assert_eq!(json["metadata"]["title"], "Romeo and Juliet");
        assert_eq!(json["content_length"], 21);
    }

    proptest! {
        #[test]
        fn prop_preview_is_bounded_prefix(text in "\\PC{0,6000}") {
            let record = BookRecord::new(metadata(), text.clone());
            let body = record.content_preview.strip_suffix("...").unwrap_or(&record.content_preview);
            prop_assert!(text.starts_with(body));
            prop_assert!(body.chars().count() <= PREVIEW_LENGTH);
            prop_assert_eq!(record.content_length, text.chars().count());
        }
    }
}
