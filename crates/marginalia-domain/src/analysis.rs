//! Analysis module - themes, sentiment, quotes and the assembled record

use crate::character::{Character, Graph};
use serde::{Deserialize, Serialize};

/// A literary theme
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    /// Theme name
    pub name: String,
    /// What the theme covers in this book
    #[serde(default)]
    pub description: String,
}

/// Overall emotional tone of the text
///
/// Serializes as `{}` when the model gave no sentiment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentiment {
    /// One of positive / negative / neutral / mixed, as reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall: Option<String>,
    /// Short explanation of the tone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
}

/// A significant quote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// The quoted text
    pub quote: String,
    /// Who said it, if applicable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    /// Where it occurs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Why it matters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub significance: Option<String>,
}

/// Completed analysis of one book
///
/// Published once per book when its analysis completes; immutable afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Identified characters
    pub characters: Vec<Character>,
    /// Character relationship graph
    pub graph: Graph,
    /// Major themes
    pub themes: Vec<Theme>,
    /// Overall sentiment
    pub sentiment: Sentiment,
    /// Significant quotes
    pub key_quotes: Vec<Quote>,
}

/// Results accumulated by an analysis run so far
///
/// A field is present only once the stage producing it has completed, and is
/// never removed afterwards within a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialResults {
    /// Present from `character_analysis_complete`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub characters: Option<Vec<Character>>,
    /// Present from `graph_generation`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<Graph>,
    /// Present from `theme_analysis_complete`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub themes: Option<Vec<Theme>>,
    /// Present from `theme_analysis_complete`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
    /// Present from `theme_analysis_complete`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_quotes: Option<Vec<Quote>>,
}

impl PartialResults {
    /// Convert into a full record, or `None` if any field is still missing
    pub fn into_record(self) -> Option<AnalysisRecord> {
        Some(AnalysisRecord {
            characters: self.characters?,
            graph: self.graph?,
            themes: self.themes?,
            sentiment: self.sentiment?,
            key_quotes: self.key_quotes?,
        })
    }
}

impl From<AnalysisRecord> for PartialResults {
    fn from(record: AnalysisRecord) -> Self {
        Self {
            characters: Some(record.characters),
            graph: Some(record.graph),
            themes: Some(record.themes),
            sentiment: Some(record.sentiment),
            key_quotes: Some(record.key_quotes),
        }
    }
}
