//! Per-book analysis pipeline
//!
//! Two modes with the same end result:
//!
//! - [`AnalysisPipeline::analyze`] runs everything and returns the record.
//! - [`AnalysisPipeline::start`] returns an [`AnalysisRun`], a state machine
//!   that is stepped to produce one progress snapshot per stage.
//!
//! Stage sequence of a run:
//!
//! ```text
//! initialization(5) → character_analysis_prep(10) → character_analysis_in_progress(20)
//!   → character_analysis_complete(40) → graph_generation_started(50) → graph_generation(60)
//!   → theme_analysis_started(70) → theme_analysis_in_progress(80)
//!   → theme_analysis_complete(90) → finalization(95) → complete(100)
//! ```

use crate::error::ExtractorError;
use crate::extractor::Extractor;
use crate::graph::build_graph;
use crate::sampling::build_sample;
use marginalia_domain::{AnalysisRecord, BookMetadata, PartialResults, TaskSnapshot, TaskStatus};
use std::time::Instant;
use tracing::{debug, info, warn};

/// A named checkpoint of an analysis run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnalysisStage {
    /// Sample prepared
    Initialization,
    /// About to ask for characters
    CharacterAnalysisPrep,
    /// Character request in flight
    CharacterAnalysisInProgress,
    /// Characters received
    CharacterAnalysisComplete,
    /// About to build the graph
    GraphGenerationStarted,
    /// Graph built
    GraphGeneration,
    /// About to ask for themes
    ThemeAnalysisStarted,
    /// Theme request in flight
    ThemeAnalysisInProgress,
    /// Themes, sentiment and quotes received
    ThemeAnalysisComplete,
    /// Assembling the record
    Finalization,
    /// Record complete
    Complete,
}

impl AnalysisStage {
    /// Every stage, in run order
    pub const ALL: [AnalysisStage; 11] = [
        AnalysisStage::Initialization,
        AnalysisStage::CharacterAnalysisPrep,
        AnalysisStage::CharacterAnalysisInProgress,
        AnalysisStage::CharacterAnalysisComplete,
        AnalysisStage::GraphGenerationStarted,
        AnalysisStage::GraphGeneration,
        AnalysisStage::ThemeAnalysisStarted,
        AnalysisStage::ThemeAnalysisInProgress,
        AnalysisStage::ThemeAnalysisComplete,
        AnalysisStage::Finalization,
        AnalysisStage::Complete,
    ];

    /// Stage tag as reported in snapshots
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStage::Initialization => "initialization",
            AnalysisStage::CharacterAnalysisPrep => "character_analysis_prep",
            AnalysisStage::CharacterAnalysisInProgress => "character_analysis_in_progress",
            AnalysisStage::CharacterAnalysisComplete => "character_analysis_complete",
            AnalysisStage::GraphGenerationStarted => "graph_generation_started",
            AnalysisStage::GraphGeneration => "graph_generation",
            AnalysisStage::ThemeAnalysisStarted => "theme_analysis_started",
            AnalysisStage::ThemeAnalysisInProgress => "theme_analysis_in_progress",
            AnalysisStage::ThemeAnalysisComplete => "theme_analysis_complete",
            AnalysisStage::Finalization => "finalization",
            AnalysisStage::Complete => "complete",
        }
    }

    /// Look a stage up by its tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|stage| stage.as_str() == tag)
    }

    /// Progress percentage reported at this stage
    pub fn progress(&self) -> u8 {
        match self {
            AnalysisStage::Initialization => 5,
            AnalysisStage::CharacterAnalysisPrep => 10,
            AnalysisStage::CharacterAnalysisInProgress => 20,
            AnalysisStage::CharacterAnalysisComplete => 40,
            AnalysisStage::GraphGenerationStarted => 50,
            AnalysisStage::GraphGeneration => 60,
            AnalysisStage::ThemeAnalysisStarted => 70,
            AnalysisStage::ThemeAnalysisInProgress => 80,
            AnalysisStage::ThemeAnalysisComplete => 90,
            AnalysisStage::Finalization => 95,
            AnalysisStage::Complete => 100,
        }
    }

    /// Minimum progress a relayed snapshot at this stage may report
    pub fn progress_floor(&self) -> Option<u8> {
        match self {
            AnalysisStage::CharacterAnalysisPrep => Some(10),
            AnalysisStage::CharacterAnalysisComplete => Some(40),
            AnalysisStage::GraphGeneration => Some(60),
            AnalysisStage::ThemeAnalysisComplete => Some(90),
            _ => None,
        }
    }

    /// The stage that follows this one, if any
    pub fn next(&self) -> Option<Self> {
        let idx = Self::ALL.iter().position(|stage| stage == self)?;
        Self::ALL.get(idx + 1).copied()
    }

    fn message(&self, partial: &PartialResults, elapsed_secs: f64) -> String {
        match self {
            AnalysisStage::Initialization => "Analyzing book structure...".to_string(),
            AnalysisStage::CharacterAnalysisPrep => {
                "Starting character identification...".to_string()
            }
            AnalysisStage::CharacterAnalysisInProgress => {
                "Identifying characters and relationships...".to_string()
            }
            AnalysisStage::CharacterAnalysisComplete => format!(
                "Characters identified ({} found)",
                partial.characters.as_ref().map_or(0, Vec::len)
            ),
            AnalysisStage::GraphGenerationStarted => "Building character network...".to_string(),
            AnalysisStage::GraphGeneration => "Character network visualization ready".to_string(),
            AnalysisStage::ThemeAnalysisStarted => {
                "Starting theme and sentiment analysis...".to_string()
            }
            AnalysisStage::ThemeAnalysisInProgress => {
                "Extracting themes, sentiment, and key quotes...".to_string()
            }
            AnalysisStage::ThemeAnalysisComplete => "Themes and quotes extracted".to_string(),
            AnalysisStage::Finalization => "Finalizing analysis...".to_string(),
            AnalysisStage::Complete => format!("Analysis complete ({:.1} seconds)", elapsed_secs),
        }
    }
}

/// Runs character extraction, graph building and theme extraction for a book
#[derive(Clone)]
pub struct AnalysisPipeline {
    extractor: Extractor,
}

impl AnalysisPipeline {
    /// Create a pipeline over an extractor
    pub fn new(extractor: Extractor) -> Self {
        Self { extractor }
    }

    /// The extractor used for model calls
    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    fn sample(&self, text: &str) -> String {
        let sample = build_sample(text, self.extractor.config().sample_budget);
        debug!(
            "Sampled {} of {} characters",
            sample.chars().count(),
            text.chars().count()
        );
        sample
    }

    /// Analyze a book in one go
    pub async fn analyze(
        &self,
        text: &str,
        metadata: &BookMetadata,
    ) -> Result<AnalysisRecord, ExtractorError> {
        let sample = self.sample(text);

        let characters = self.extractor.characters(&sample, metadata).await?;
        let graph = build_graph(&characters);
        let report = self.extractor.themes(&sample, metadata).await?;

        info!("Analysis of '{}' complete", metadata.title);
        Ok(AnalysisRecord {
            characters,
            graph,
            themes: report.themes,
            sentiment: report.sentiment,
            key_quotes: report.key_quotes,
        })
    }

    /// Begin an incremental analysis
    pub fn start(&self, text: &str, metadata: BookMetadata) -> AnalysisRun {
        AnalysisRun {
            sample: self.sample(text),
            metadata,
            pending: Some(AnalysisStage::Initialization),
            partial: PartialResults::default(),
            started: Instant::now(),
        }
    }
}

/// An incremental analysis in progress
///
/// Each [`AnalysisRun::step`] performs the work attached to the next stage and
/// returns its snapshot. After the `complete` or an `error` snapshot every
/// further step returns `None`. Snapshots already returned are never retracted.
pub struct AnalysisRun {
    sample: String,
    metadata: BookMetadata,
    pending: Option<AnalysisStage>,
    partial: PartialResults,
    started: Instant,
}

impl AnalysisRun {
    /// Advance one stage
    pub async fn step(&mut self, pipeline: &AnalysisPipeline) -> Option<TaskSnapshot> {
        let stage = self.pending?;

        if let Err(e) = self.enter(stage, pipeline).await {
            warn!("Analysis of '{}' failed at {}: {}", self.metadata.title, stage.as_str(), e);
            self.pending = None;
            return Some(TaskSnapshot::failed(format!("Error in book analysis: {}", e)));
        }

        let message = stage.message(&self.partial, self.started.elapsed().as_secs_f64());
        let mut snapshot = TaskSnapshot::processing(stage.progress(), stage.as_str(), message)
            .with_partial_results(self.partial.clone());
        if stage == AnalysisStage::Complete {
            snapshot.status = TaskStatus::Complete;
        }

        self.pending = stage.next();
        Some(snapshot)
    }

    /// Work performed on entering a stage
    async fn enter(
        &mut self,
        stage: AnalysisStage,
        pipeline: &AnalysisPipeline,
    ) -> Result<(), ExtractorError> {
        let extractor = pipeline.extractor();
        match stage {
            AnalysisStage::CharacterAnalysisComplete => {
                let characters = extractor.characters(&self.sample, &self.metadata).await?;
                self.partial.characters = Some(characters);
            }
            AnalysisStage::GraphGeneration => {
                let characters = self.partial.characters.as_deref().unwrap_or_default();
                self.partial.graph = Some(build_graph(characters));
            }
            AnalysisStage::ThemeAnalysisComplete => {
                let report = extractor.themes(&self.sample, &self.metadata).await?;
                self.partial.themes = Some(report.themes);
                self.partial.sentiment = Some(report.sentiment);
                self.partial.key_quotes = Some(report.key_quotes);
            }
            _ => {}
        }
        Ok(())
    }
}
