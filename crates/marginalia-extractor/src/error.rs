//! Error types for the Extractor

use marginalia_llm::LlmError;
use thiserror::Error;

/// Errors that can occur during analysis
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractorError {
    /// Both the streaming and the plain model call failed
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
