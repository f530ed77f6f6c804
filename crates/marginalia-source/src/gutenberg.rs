//! Project Gutenberg content source

use crate::metadata::parse_metadata;
use crate::{ContentSource, SourceError};
use async_trait::async_trait;
use marginalia_domain::{BookId, BookMetadata};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default library host
pub const DEFAULT_BASE_URL: &str = "https://www.gutenberg.org";

/// Default per-attempt request timeout
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Configuration for [`GutenbergSource`]
#[derive(Debug, Clone, PartialEq)]
pub struct GutenbergConfig {
    /// Library host, without a trailing slash
    pub base_url: String,
    /// Timeout applied to each individual request
    pub request_timeout: Duration,
}

impl Default for GutenbergConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Fetches plain text and catalogue metadata from Project Gutenberg
pub struct GutenbergSource {
    base_url: String,
    client: reqwest::Client,
}

impl GutenbergSource {
    /// Create a source from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: GutenbergConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Library host requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Candidate plain-text locations, in priority order
    pub fn content_urls(&self, id: &BookId) -> [String; 3] {
        let base = &self.base_url;
        [
            format!("{base}/files/{id}/{id}-0.txt"),
            format!("{base}/cache/epub/{id}/pg{id}.txt"),
            format!("{base}/ebooks/{id}.txt.utf-8"),
        ]
    }

    async fn try_url(&self, url: &str) -> Result<String, String> {
        let response = self.client.get(url).send().await.map_err(|e| e.to_string())?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(format!("Status {}", response.status().as_u16()));
        }
        response.text().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl ContentSource for GutenbergSource {
    async fn get_metadata(&self, id: &BookId) -> Result<BookMetadata, SourceError> {
        let url = format!("{}/ebooks/{}", self.base_url, id);
        debug!(book_id = %id, %url, "Fetching catalogue page");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            warn!(book_id = %id, status = status.as_u16(), "Catalogue page unavailable");
            return Err(SourceError::MetadataUnavailable(status.as_u16()));
        }

        let html = response.text().await?;
        Ok(parse_metadata(&html, id, &self.base_url))
    }

    async fn get_content(&self, id: &BookId) -> Result<String, SourceError> {
        for url in self.content_urls(id) {
            match self.try_url(&url).await {
                Ok(text) => {
                    info!(book_id = %id, %url, bytes = text.len(), "Book text downloaded");
                    return Ok(text);
                }
                Err(reason) => debug!(book_id = %id, %url, %reason, "Candidate URL failed"),
            }
        }

        warn!(book_id = %id, "No candidate URL returned the book text");
        Err(SourceError::ContentUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_urls_in_priority_order() {
        let source = GutenbergSource::new(GutenbergConfig::default()).unwrap();
        let id = BookId::parse("1787").unwrap();
        assert_eq!(
            source.content_urls(&id),
            [
                "https://www.gutenberg.org/files/1787/1787-0.txt".to_string(),
                "https://www.gutenberg.org/cache/epub/1787/pg1787.txt".to_string(),
                "https://www.gutenberg.org/ebooks/1787.txt.utf-8".to_string(),
            ]
        );
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let source = GutenbergSource::new(GutenbergConfig {
            base_url: "http://localhost:8080/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(source.base_url(), "http://localhost:8080");
    }
}
