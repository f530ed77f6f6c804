//! OpenAI-compatible Provider Implementation
//!
//! Talks to any `/chat/completions` endpoint speaking the OpenAI wire format.
//! The defaults target Groq's hosted Llama 3 model.
//!
//! # Features
//!
//! - Async HTTP communication via `reqwest`
//! - Bearer-token authentication
//! - Retry logic with exponential backoff for non-streaming calls
//! - Server-sent event decoding for streaming calls
//!
//! Model calls have no request timeout.
//!
//! # Examples
//!
//! ```no_run
//! use marginalia_llm::{OpenAiConfig, OpenAiProvider};
//!
//! let config = OpenAiConfig {
//!     api_key: Some("gsk_...".to_string()),
//!     ..Default::default()
//! };
//! let provider = OpenAiProvider::new(config).unwrap();
//! ```

use crate::streaming::{decode_sse, TextStream};
use crate::{CompletionRequest, LlmError, LlmProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default model
pub const DEFAULT_MODEL: &str = "llama3-70b-8192";

/// Default number of attempts for non-streaming calls
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Configuration for [`OpenAiProvider`]
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Base URL, without the `/chat/completions` suffix
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Bearer token; omitted for local endpoints
    pub api_key: Option<String>,
    /// Attempts for non-streaming calls
    pub max_retries: u32,
    /// Delay before the first retry, doubled on each further attempt
    pub retry_base_delay: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

/// Chat completion provider for OpenAI-compatible APIs
pub struct OpenAiProvider {
    config: OpenAiConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiProvider {
    /// Create a provider from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| LlmError::Other(format!("Failed to create HTTP client: {}", e)))?;

        info!(base_url = %config.base_url, model = %config.model, "Initializing chat completion provider");

        Ok(Self { config, client })
    }

    /// Configuration in use
    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn body<'a>(&'a self, request: &'a CompletionRequest, stream: bool) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        }
    }

    fn post(&self, body: &ChatRequest<'_>) -> reqwest::RequestBuilder {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let builder = self.client.post(url).json(body);
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn status_error(&self, response: reqwest::Response) -> LlmError {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return LlmError::ModelNotAvailable(self.config.model.clone());
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return LlmError::RateLimitExceeded;
        }
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        LlmError::Communication(format!("HTTP {}: {}", status, error_text))
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = self.body(request, false);
        let attempts_allowed = self.config.max_retries.max(1);

        // Retry logic with exponential backoff
        let mut attempts = 0;
        let mut last_error = None;

        while attempts < attempts_allowed {
            match self.post(&body).send().await {
                Ok(response) if response.status().is_success() => {
                    let parsed: ChatResponse = response.json().await.map_err(|e| {
                        LlmError::InvalidResponse(format!("Failed to parse response: {}", e))
                    })?;
                    let content = parsed
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|choice| choice.message.content)
                        .ok_or_else(|| {
                            LlmError::InvalidResponse("Response contained no message".to_string())
                        })?;
                    debug!(chars = content.len(), "Completion received");
                    return Ok(content.trim().to_string());
                }
                Ok(response) => {
                    let error = self.status_error(response).await;
                    if matches!(error, LlmError::ModelNotAvailable(_)) {
                        return Err(error);
                    }
                    last_error = Some(error);
                }
                Err(e) => {
                    last_error = Some(LlmError::Communication(format!("Request failed: {}", e)));
                }
            }

            attempts += 1;
            if attempts < attempts_allowed {
                let delay = backoff_delay(self.config.retry_base_delay, attempts);
                warn!(attempt = attempts, ?delay, "Completion request failed, retrying");
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error
            .unwrap_or_else(|| LlmError::Communication("Max retries exceeded".to_string())))
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<TextStream, LlmError> {
        let body = self.body(request, true);
        let response = self
            .post(&body)
            .send()
            .await
            .map_err(|e| LlmError::Communication(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(self.status_error(response).await);
        }

        Ok(decode_sse(response.bytes_stream()))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Delay before retry `attempt` (1-based): base, 2x base, 4x base, ...
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32
        .checked_pow(attempt.saturating_sub(1))
        .unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> OpenAiProvider {
        OpenAiProvider::new(OpenAiConfig {
            base_url: server.uri(),
            api_key: Some("test-key".to_string()),
            retry_base_delay: Duration::from_millis(1),
            ..Default::default()
        })
        .unwrap()
    }

    fn request() -> CompletionRequest {
        CompletionRequest::new("Who is Juliet?", 0.2, 4000)
    }

    #[test]
    fn test_default_config() {
        let config = OpenAiConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_backoff_delay_doubles_and_saturates() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(4));
        assert_eq!(backoff_delay(base, 40), Duration::from_secs(u64::from(u32::MAX)));
        assert_eq!(backoff_delay(Duration::MAX, 5), Duration::MAX);
    }

    #[tokio::test]
    async fn test_complete_sends_parameters_and_trims_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": DEFAULT_MODEL,
                "max_tokens": 4000,
                "stream": false,
                "messages": [{"role": "user", "content": "Who is Juliet?"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-1",
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "  A Capulet.\n"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = provider_for(&server).complete(&request()).await.unwrap();
        assert_eq!(reply, "A Capulet.");
    }

    #[tokio::test]
    async fn test_complete_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
            .expect(3)
            .mount(&server)
            .await;

        let result = provider_for(&server).complete(&request()).await;
        assert!(matches!(result, Err(LlmError::Communication(msg)) if msg.contains("500")));
    }

    #[tokio::test]
    async fn test_complete_missing_model_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let result = provider_for(&server).complete(&request()).await;
        assert!(matches!(result, Err(LlmError::ModelNotAvailable(_))));
    }

    #[tokio::test]
    async fn test_complete_stream_decodes_fragments() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"{\\\"characters\\\"\"}}]}\n\n",
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\": []}\"}}]}\n\n",
            "data: [DONE]\n\n"
        );
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({"stream": true})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;

        let stream = provider_for(&server).complete_stream(&request()).await.unwrap();
        let fragments: Vec<String> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(fragments.concat(), r#"{"characters": []}"#);
    }

    #[tokio::test]
    async fn test_complete_stream_rejects_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let result = provider_for(&server).complete_stream(&request()).await;
        assert!(matches!(result, Err(LlmError::RateLimitExceeded)));
    }
}
