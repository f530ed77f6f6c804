//! Marginalia Extractor
//!
//! Turns book text into literary analysis with an LLM.
//!
//! # Architecture
//!
//! ```text
//! Text → sample → prompts → LLM → parse → characters, graph, themes
//! ```
//!
//! # Key Features
//!
//! - **Sampling**: Books of any length are reduced to a bounded sample
//! - **Lenient Parsing**: Prose around the JSON is tolerated, malformed
//!   replies become empty results
//! - **Streaming with Fallback**: A failed streamed request is retried once
//!   without streaming
//! - **Staged Runs**: [`AnalysisRun`] reports a snapshot per stage with the
//!   results gathered so far
//!
//! # Example Usage
//!
//! ```no_run
//! use marginalia_domain::{BookId, BookMetadata};
//! use marginalia_extractor::{AnalysisPipeline, Extractor, ExtractorConfig};
//! use marginalia_llm::MockProvider;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let llm = Arc::new(MockProvider::new(r#"{"characters": [], "themes": []}"#));
//! let pipeline = AnalysisPipeline::new(Extractor::new(llm, ExtractorConfig::default()));
//!
//! let metadata = BookMetadata::unknown(BookId::parse("1513")?);
//! let record = pipeline.analyze("Two households, both alike in dignity...", &metadata).await?;
//!
//! println!("Characters: {}", record.characters.len());
//! println!("Themes: {}", record.themes.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod extractor;
mod graph;
mod parser;
mod pipeline;
mod prompt;
mod sampling;

#[cfg(test)]
mod tests;

pub use config::ExtractorConfig;
pub use error::ExtractorError;
pub use extractor::Extractor;
pub use graph::{build_graph, DEFAULT_STRENGTH, UNKNOWN};
pub use parser::{parse_characters, parse_themes, Parsed, ThemeReport};
pub use pipeline::{AnalysisPipeline, AnalysisRun, AnalysisStage};
pub use prompt::PromptBuilder;
pub use sampling::{build_sample, excerpts, Excerpts, MAX_SAMPLE_CHARS};
