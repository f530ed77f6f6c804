//! SSE decoding for OpenAI-compatible streaming responses

use crate::LlmError;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use std::collections::VecDeque;
use std::pin::Pin;

/// Stream of generated text fragments
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

#[derive(Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Result of decoding one SSE line
#[derive(Debug, PartialEq)]
enum SseLine {
    Text(String),
    Done,
    Skip,
}

fn decode_line(line: &str) -> Result<SseLine, LlmError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return Ok(SseLine::Skip);
    }

    let Some(data) = line.strip_prefix("data:") else {
        return Ok(SseLine::Skip);
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return Ok(SseLine::Done);
    }

    let payload: ChunkPayload = serde_json::from_str(data)
        .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse SSE chunk: {}", e)))?;

    let text: String = payload
        .choices
        .into_iter()
        .filter_map(|choice| choice.delta.content)
        .collect();

    if text.is_empty() {
        Ok(SseLine::Skip)
    } else {
        Ok(SseLine::Text(text))
    }
}

struct DecoderState<S> {
    inner: Pin<Box<S>>,
    buffer: Vec<u8>,
    pending: VecDeque<Result<String, LlmError>>,
    finished: bool,
}

impl<S> DecoderState<S> {
    /// Decode every complete line in the buffer; `flush` also takes the tail
    fn drain_lines(&mut self, flush: bool) {
        while !self.finished {
            let line = match self.buffer.iter().position(|b| *b == b'\n') {
                Some(pos) => self.buffer.drain(..=pos).collect::<Vec<u8>>(),
                None if flush && !self.buffer.is_empty() => std::mem::take(&mut self.buffer),
                None => break,
            };

            match decode_line(&String::from_utf8_lossy(&line)) {
                Ok(SseLine::Text(text)) => self.pending.push_back(Ok(text)),
                Ok(SseLine::Skip) => {}
                Ok(SseLine::Done) => self.finished = true,
                Err(e) => {
                    self.pending.push_back(Err(e));
                    self.finished = true;
                }
            }
        }
    }
}

/// Decode an SSE byte stream into text fragments
///
/// Lines are reassembled across chunk boundaries. The stream ends at
/// `data: [DONE]`, at the end of input, or after the first error.
pub fn decode_sse<S, B, E>(bytes: S) -> TextStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = DecoderState {
        inner: Box::pin(bytes),
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.inner.next().await {
                Some(Ok(chunk)) => {
                    state.buffer.extend_from_slice(chunk.as_ref());
                    state.drain_lines(false);
                }
                Some(Err(e)) => {
                    state
                        .pending
                        .push_back(Err(LlmError::Communication(format!("Stream error: {}", e))));
                    state.finished = true;
                }
                None => {
                    state.drain_lines(true);
                    state.finished = true;
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"index": 0, "delta": {"content": content}}]})
        )
    }

    async fn collect(parts: Vec<String>) -> Vec<Result<String, LlmError>> {
        let input = stream::iter(parts.into_iter().map(Ok::<_, std::io::Error>));
        decode_sse(input).collect().await
    }

    #[test]
    fn test_decode_line_content() {
        let line = r#"data: {"id":"x","choices":[{"index":0,"delta":{"content":"Hello"}}]}"#;
        assert_eq!(decode_line(line).unwrap(), SseLine::Text("Hello".to_string()));
    }

    #[test]
    fn test_decode_line_role_only_is_skipped() {
        let line = r#"data: {"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#;
        assert_eq!(decode_line(line).unwrap(), SseLine::Skip);
    }

    #[test]
    fn test_decode_line_done_and_comments() {
        assert_eq!(decode_line("data: [DONE]").unwrap(), SseLine::Done);
        assert_eq!(decode_line(": keep-alive").unwrap(), SseLine::Skip);
        assert_eq!(decode_line("").unwrap(), SseLine::Skip);
    }

    #[test]
    fn test_decode_line_invalid_json() {
        assert!(matches!(
            decode_line("data: {invalid json}"),
            Err(LlmError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_lines_split_across_chunks() {
        let full = format!("{}{}data: [DONE]\n\n", chunk("Hel"), chunk("lo"));
        let (a, b) = full.split_at(17);

        let items = collect(vec![a.to_string(), b.to_string()]).await;
        let text: Vec<String> = items.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(text.concat(), "Hello");
    }

    #[tokio::test]
    async fn test_stops_at_done() {
        let body = format!("{}data: [DONE]\n\n{}", chunk("A"), chunk("ignored"));
        let items = collect(vec![body]).await;
        assert_eq!(items, vec![Ok("A".to_string())]);
    }

    #[tokio::test]
    async fn test_trailing_line_without_newline() {
        let body = format!("data: {}", serde_json::json!({"choices": [{"delta": {"content": "end"}}]}));
        let items = collect(vec![body]).await;
        assert_eq!(items, vec![Ok("end".to_string())]);
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let input = stream::iter(vec![
            Ok(chunk("partial")),
            Err(std::io::Error::new(std::io::ErrorKind::Other, "reset")),
            Ok(chunk("never")),
        ]);
        let items: Vec<_> = decode_sse(input).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], Ok("partial".to_string()));
        assert!(matches!(items[1], Err(LlmError::Communication(_))));
    }
}
