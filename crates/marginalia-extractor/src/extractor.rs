//! Core Extractor implementation

use crate::config::ExtractorConfig;
use crate::error::ExtractorError;
use crate::parser::{parse_characters, parse_themes, Parsed, ThemeReport};
use crate::prompt::PromptBuilder;
use futures::StreamExt;
use marginalia_domain::{BookMetadata, Character};
use marginalia_llm::{CompletionRequest, LlmError, LlmProvider};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Asks the model for characters and themes and parses its replies
///
/// Malformed replies become empty results; only a failure of the model call
/// itself is an error.
#[derive(Clone)]
pub struct Extractor {
    llm: Arc<dyn LlmProvider>,
    config: ExtractorConfig,
}

impl Extractor {
    /// Create a new Extractor
    pub fn new(llm: Arc<dyn LlmProvider>, config: ExtractorConfig) -> Self {
        Self { llm, config }
    }

    /// Configuration in use
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    fn character_request(&self, sample: &str, metadata: &BookMetadata) -> CompletionRequest {
        let prompt = PromptBuilder::new(sample, metadata, self.config.excerpt_len).characters();
        debug!("Character prompt length: {} chars", prompt.len());
        CompletionRequest::new(
            prompt,
            self.config.character_temperature,
            self.config.character_max_tokens,
        )
    }

    fn theme_request(&self, sample: &str, metadata: &BookMetadata) -> CompletionRequest {
        let prompt = PromptBuilder::new(sample, metadata, self.config.excerpt_len).themes();
        debug!("Theme prompt length: {} chars", prompt.len());
        CompletionRequest::new(
            prompt,
            self.config.theme_temperature,
            self.config.theme_max_tokens,
        )
    }

    /// Identify characters with a single request
    pub async fn identify_characters(
        &self,
        sample: &str,
        metadata: &BookMetadata,
    ) -> Result<Vec<Character>, ExtractorError> {
        let request = self.character_request(sample, metadata);
        let reply = self.llm.complete(&request).await?;
        Ok(characters_from(&reply))
    }

    /// Identify characters over a streamed request
    ///
    /// Falls back to [`Extractor::identify_characters`] if streaming fails.
    pub async fn identify_characters_streaming(
        &self,
        sample: &str,
        metadata: &BookMetadata,
    ) -> Result<Vec<Character>, ExtractorError> {
        let request = self.character_request(sample, metadata);
        match self.collect_stream(&request).await {
            Ok(reply) => Ok(characters_from(&reply)),
            Err(e) => {
                warn!("Streaming character request failed, retrying without streaming: {}", e);
                self.identify_characters(sample, metadata).await
            }
        }
    }

    /// Extract themes, sentiment and key quotes with a single request
    pub async fn extract_themes(
        &self,
        sample: &str,
        metadata: &BookMetadata,
    ) -> Result<ThemeReport, ExtractorError> {
        let request = self.theme_request(sample, metadata);
        let reply = self.llm.complete(&request).await?;
        Ok(themes_from(&reply))
    }

    /// Extract themes, sentiment and key quotes over a streamed request
    ///
    /// Falls back to [`Extractor::extract_themes`] if streaming fails.
    pub async fn extract_themes_streaming(
        &self,
        sample: &str,
        metadata: &BookMetadata,
    ) -> Result<ThemeReport, ExtractorError> {
        let request = self.theme_request(sample, metadata);
        match self.collect_stream(&request).await {
            Ok(reply) => Ok(themes_from(&reply)),
            Err(e) => {
                warn!("Streaming theme request failed, retrying without streaming: {}", e);
                self.extract_themes(sample, metadata).await
            }
        }
    }

    /// Characters, streamed or not according to configuration
    pub async fn characters(
        &self,
        sample: &str,
        metadata: &BookMetadata,
    ) -> Result<Vec<Character>, ExtractorError> {
        if self.config.streaming {
            self.identify_characters_streaming(sample, metadata).await
        } else {
            self.identify_characters(sample, metadata).await
        }
    }

    /// Themes, streamed or not according to configuration
    pub async fn themes(
        &self,
        sample: &str,
        metadata: &BookMetadata,
    ) -> Result<ThemeReport, ExtractorError> {
        if self.config.streaming {
            self.extract_themes_streaming(sample, metadata).await
        } else {
            self.extract_themes(sample, metadata).await
        }
    }

    /// Concatenate every streamed fragment in delivery order
    async fn collect_stream(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let mut stream = self.llm.complete_stream(request).await?;
        let mut reply = String::new();
        let mut fragments = 0usize;

        while let Some(fragment) = stream.next().await {
            reply.push_str(&fragment?);
            fragments += 1;
        }

        debug!("Received {} fragments ({} chars)", fragments, reply.len());
        Ok(reply)
    }
}

fn characters_from(reply: &str) -> Vec<Character> {
    match parse_characters(reply) {
        Parsed::Value(characters) => {
            info!("Identified {} characters", characters.len());
            characters
        }
        Parsed::Empty => {
            warn!("Character reply was unusable; using empty result");
            Vec::new()
        }
    }
}

fn themes_from(reply: &str) -> ThemeReport {
    match parse_themes(reply) {
        Parsed::Value(report) => {
            info!(
                "Extracted {} themes and {} quotes",
                report.themes.len(),
                report.key_quotes.len()
            );
            report
        }
        Parsed::Empty => {
            warn!("Theme reply was unusable; using empty result");
            ThemeReport::default()
        }
    }
}
