//! Configuration file parsing for the server.
//!
//! Loads settings from TOML files: bind address, content source, model
//! endpoint, task scheduling and extractor tuning. Every section has
//! defaults, so an empty file is a valid configuration.

use crate::orchestrator::{AnalysisMode, OrchestratorConfig};
use marginalia_extractor::ExtractorConfig;
use marginalia_llm::OpenAiConfig;
use marginalia_source::GutenbergConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on `llm.max_retries`
const MAX_LLM_RETRIES: u32 = 10;

/// Server configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Server configuration loaded from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub bind_address: String,

    /// Bind port (e.g., 8000)
    pub bind_port: u16,

    /// Remote library
    pub source: SourceSection,

    /// Model endpoint
    pub llm: LlmSection,

    /// Task scheduling
    pub tasks: TaskSection,

    /// Analysis tuning
    pub extractor: ExtractorConfig,
}

/// `[source]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSection {
    /// Library base URL
    pub base_url: String,
    /// Per-attempt request timeout
    pub request_timeout_secs: u64,
}

/// `[llm]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// OpenAI-compatible API base URL
    pub base_url: String,
    /// Model name
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Retries for non-streaming calls
    pub max_retries: u32,
}

/// `[tasks]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSection {
    /// Pause between stage transitions (0 only yields)
    pub stage_delay_ms: u64,
    /// Update stream poll interval
    pub stream_poll_ms: u64,
    /// Analysis worker mode
    pub analysis_mode: AnalysisMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            bind_port: 8000,
            source: SourceSection::default(),
            llm: LlmSection::default(),
            tasks: TaskSection::default(),
            extractor: ExtractorConfig::default(),
        }
    }
}

impl Default for SourceSection {
    fn default() -> Self {
        let defaults = GutenbergConfig::default();
        Self {
            base_url: defaults.base_url,
            request_timeout_secs: defaults.request_timeout.as_secs(),
        }
    }
}

impl Default for LlmSection {
    fn default() -> Self {
        let defaults = OpenAiConfig::default();
        Self {
            base_url: defaults.base_url,
            model: defaults.model,
            api_key_env: "GROQ_API_KEY".to_string(),
            max_retries: defaults.max_retries,
        }
    }
}

impl Default for TaskSection {
    fn default() -> Self {
        let defaults = OrchestratorConfig::default();
        Self {
            stage_delay_ms: defaults.stage_delay.as_millis() as u64,
            stream_poll_ms: defaults.stream_poll.as_millis() as u64,
            analysis_mode: defaults.analysis_mode,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.base_url.is_empty() {
            return Err(ConfigError::Invalid("source.base_url must not be empty".to_string()));
        }
        if self.source.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "source.request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.llm.base_url.is_empty() || self.llm.model.is_empty() {
            return Err(ConfigError::Invalid(
                "llm.base_url and llm.model must not be empty".to_string(),
            ));
        }
        if self.llm.max_retries > MAX_LLM_RETRIES {
            return Err(ConfigError::Invalid(format!(
                "llm.max_retries must not exceed {}",
                MAX_LLM_RETRIES
            )));
        }
        if self.tasks.stream_poll_ms == 0 {
            return Err(ConfigError::Invalid(
                "tasks.stream_poll_ms must be greater than 0".to_string(),
            ));
        }
        self.extractor
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Get the full bind address (address:port)
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.bind_port)
    }

    /// Content source settings
    pub fn gutenberg(&self) -> GutenbergConfig {
        GutenbergConfig {
            base_url: self.source.base_url.clone(),
            request_timeout: Duration::from_secs(self.source.request_timeout_secs),
        }
    }

    /// Model endpoint settings, with the key read from `api_key`
    pub fn openai(&self, api_key: Option<String>) -> OpenAiConfig {
        OpenAiConfig {
            base_url: self.llm.base_url.clone(),
            model: self.llm.model.clone(),
            api_key,
            max_retries: self.llm.max_retries,
            ..OpenAiConfig::default()
        }
    }

    /// Scheduling settings
    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            stage_delay: Duration::from_millis(self.tasks.stage_delay_ms),
            stream_poll: Duration::from_millis(self.tasks.stream_poll_ms),
            analysis_mode: self.tasks.analysis_mode,
        }
    }
}
