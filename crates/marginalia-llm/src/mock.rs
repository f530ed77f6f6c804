//! Mock provider for deterministic testing
//!
//! Returns pre-configured responses without making any network calls.

use crate::streaming::TextStream;
use crate::{CompletionRequest, LlmError, LlmProvider};
use async_trait::async_trait;
use futures::stream;
use std::sync::{Arc, Mutex, MutexGuard};

/// Size of the fragments a mocked stream is cut into, in characters
const STREAM_FRAGMENT_CHARS: usize = 16;

/// How streamed completions should misbehave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamFailure {
    /// Streams deliver the configured response
    #[default]
    None,
    /// `complete_stream` itself returns an error
    OnCreate,
    /// The stream yields one fragment, then an error
    MidStream,
}

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Error,
}

#[derive(Debug, Default)]
struct MockState {
    rules: Vec<(String, Reply)>,
    stream_failure: StreamFailure,
    call_count: usize,
    stream_call_count: usize,
    prompts: Vec<String>,
}

/// Mock LLM provider
///
/// Responses are chosen by the first registered pattern the prompt contains,
/// falling back to the default response. Clones share state.
///
/// # Examples
///
/// ```
/// use marginalia_llm::{CompletionRequest, LlmProvider, MockProvider};
///
/// let mut provider = MockProvider::default();
/// provider.add_response("characters", r#"{"characters": []}"#);
///
/// let request = CompletionRequest::new("list the characters", 0.2, 100);
/// let reply = futures::executor::block_on(provider.complete(&request)).unwrap();
/// assert_eq!(reply, r#"{"characters": []}"#);
/// assert_eq!(provider.call_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    default_response: String,
    state: Arc<Mutex<MockState>>,
}

impl MockProvider {
    /// Create a new MockProvider with a fixed response for all prompts
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reply with `response` to prompts containing `pattern`
    pub fn add_response(&mut self, pattern: impl Into<String>, response: impl Into<String>) {
        self.state()
            .rules
            .push((pattern.into(), Reply::Text(response.into())));
    }

    /// Fail every request whose prompt contains `pattern`
    pub fn add_error(&mut self, pattern: impl Into<String>) {
        self.state().rules.push((pattern.into(), Reply::Error));
    }

    /// Make streamed completions fail
    pub fn set_stream_failure(&mut self, failure: StreamFailure) {
        self.state().stream_failure = failure;
    }

    /// Number of non-streaming calls
    pub fn call_count(&self) -> usize {
        self.state().call_count
    }

    /// Number of streaming calls
    pub fn stream_call_count(&self) -> usize {
        self.state().stream_call_count
    }

    /// Reset both call counters
    pub fn reset_call_count(&self) {
        let mut state = self.state();
        state.call_count = 0;
        state.stream_call_count = 0;
    }

    /// Every prompt received, in order
    pub fn prompts(&self) -> Vec<String> {
        self.state().prompts.clone()
    }

    fn reply_for(&self, state: &MockState, prompt: &str) -> Result<String, LlmError> {
        let rule = state
            .rules
            .iter()
            .find(|(pattern, _)| prompt.contains(pattern.as_str()));

        match rule {
            Some((_, Reply::Text(text))) => Ok(text.clone()),
            Some((_, Reply::Error)) => Err(LlmError::Other("Mock error".to_string())),
            None => Ok(self.default_response.clone()),
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("Default mock response")
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let mut state = self.state();
        state.call_count += 1;
        state.prompts.push(request.prompt.clone());
        self.reply_for(&state, &request.prompt)
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<TextStream, LlmError> {
        let mut state = self.state();
        state.stream_call_count += 1;
        state.prompts.push(request.prompt.clone());

        if state.stream_failure == StreamFailure::OnCreate {
            return Err(LlmError::Communication("Mock stream refused".to_string()));
        }

        let text = self.reply_for(&state, &request.prompt)?;
        let chars: Vec<char> = text.chars().collect();
        let mut fragments: Vec<Result<String, LlmError>> = chars
            .chunks(STREAM_FRAGMENT_CHARS)
            .map(|piece| Ok(piece.iter().collect()))
            .collect();

        if state.stream_failure == StreamFailure::MidStream {
            fragments.truncate(1);
            fragments.push(Err(LlmError::Communication("Mock stream reset".to_string())));
        }

        Ok(Box::pin(stream::iter(fragments)))
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
