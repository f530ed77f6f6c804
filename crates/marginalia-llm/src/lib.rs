//! Marginalia LLM Provider Layer
//!
//! Pluggable chat-completion providers behind one async trait.
//!
//! # Providers
//!
//! - `MockProvider`: Deterministic mock for testing
//! - `OpenAiProvider`: OpenAI-compatible chat completion API (Groq by default)
//!
//! # Examples
//!
//! ```
//! use marginalia_llm::{CompletionRequest, LlmProvider, MockProvider};
//!
//! let provider = MockProvider::new("Hello from LLM!");
//! let request = CompletionRequest::new("test prompt", 0.2, 100);
//! let result = futures::executor::block_on(provider.complete(&request)).unwrap();
//! assert_eq!(result, "Hello from LLM!");
//! ```

#![warn(missing_docs)]

pub mod mock;
pub mod openai;
pub mod streaming;

use async_trait::async_trait;
use thiserror::Error;

pub use mock::{MockProvider, StreamFailure};
pub use openai::{OpenAiConfig, OpenAiProvider};
pub use streaming::TextStream;

/// Errors that can occur during LLM operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Invalid response from LLM
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

/// A single-turn chat completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// User message sent to the model
    pub prompt: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Upper bound on generated tokens
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Create a request
    pub fn new(prompt: impl Into<String>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            prompt: prompt.into(),
            temperature,
            max_tokens,
        }
    }
}

/// A chat-completion backend
///
/// Implementations must be shareable across worker tasks.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Request a full completion and return its text
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;

    /// Request a streamed completion
    ///
    /// Fragments are yielded in delivery order. An error may surface either
    /// from this call or from the returned stream.
    async fn complete_stream(&self, request: &CompletionRequest) -> Result<TextStream, LlmError>;

    /// Name of the model requests are sent to
    fn model_name(&self) -> &str;
}
