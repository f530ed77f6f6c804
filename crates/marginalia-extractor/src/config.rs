//! Configuration for the Extractor

use crate::error::ExtractorError;
use crate::sampling::MAX_SAMPLE_CHARS;
use serde::{Deserialize, Serialize};

/// Configuration for the Extractor and the analysis pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Upper bound on the sampled text sent for analysis (characters)
    pub sample_budget: usize,

    /// Length of each beginning/middle/end excerpt embedded in a prompt (characters)
    pub excerpt_len: usize,

    /// Sampling temperature for character identification
    pub character_temperature: f32,

    /// Token limit for character identification
    pub character_max_tokens: u32,

    /// Sampling temperature for theme extraction
    pub theme_temperature: f32,

    /// Token limit for theme extraction
    pub theme_max_tokens: u32,

    /// Use streamed model calls, falling back to plain calls on failure
    pub streaming: bool,
}

impl ExtractorConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ExtractorError> {
        if self.sample_budget == 0 {
            return Err(ExtractorError::Config(
                "sample_budget must be greater than 0".to_string(),
            ));
        }
        if self.sample_budget > MAX_SAMPLE_CHARS {
            return Err(ExtractorError::Config(format!(
                "sample_budget must not exceed {}",
                MAX_SAMPLE_CHARS
            )));
        }
        if self.excerpt_len == 0 {
            return Err(ExtractorError::Config(
                "excerpt_len must be greater than 0".to_string(),
            ));
        }
        if self.character_max_tokens == 0 || self.theme_max_tokens == 0 {
            return Err(ExtractorError::Config(
                "max_tokens values must be greater than 0".to_string(),
            ));
        }
        for (name, temperature) in [
            ("character_temperature", self.character_temperature),
            ("theme_temperature", self.theme_temperature),
        ] {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ExtractorError::Config(format!(
                    "{} must be between 0.0 and 2.0",
                    name
                )));
            }
        }
        Ok(())
    }
}

impl Default for ExtractorConfig {
    /// Default configuration with balanced settings
    fn default() -> Self {
        Self {
            sample_budget: 30_000,
            excerpt_len: 5_000,
            character_temperature: 0.2,
            character_max_tokens: 4_000,
            theme_temperature: 0.3,
            theme_max_tokens: 2_000,
            streaming: true,
        }
    }
}

impl ExtractorConfig {
    /// Economical preset: smaller samples and replies for cheaper runs
    pub fn economical() -> Self {
        Self {
            sample_budget: 12_000,
            excerpt_len: 2_000,
            character_max_tokens: 2_000,
            theme_max_tokens: 1_000,
            ..Self::default()
        }
    }

    /// Thorough preset: full-sized sample, larger excerpts and longer replies
    pub fn thorough() -> Self {
        Self {
            sample_budget: MAX_SAMPLE_CHARS,
            excerpt_len: 10_000,
            character_max_tokens: 8_000,
            theme_max_tokens: 4_000,
            ..Self::default()
        }
    }

    /// Load and validate configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ExtractorError> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| ExtractorError::Config(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, ExtractorError> {
        toml::to_string_pretty(self)
            .map_err(|e| ExtractorError::Config(format!("Failed to serialize to TOML: {}", e)))
    }
}
