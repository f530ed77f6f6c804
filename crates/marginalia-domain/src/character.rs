//! Character module - extracted characters and their relationship graph

use serde::{Deserialize, Deserializer, Serialize};

/// A character identified in a book
///
/// `name` is the identity key within a single analysis run. Optional fields
/// are omitted from JSON when the model did not supply them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    /// Character name
    pub name: String,

    /// Alternative names
    #[serde(default)]
    pub aliases: Vec<String>,

    /// Narrative role (e.g. "Main", "Supporting", "Minor")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Short description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Relationships to other characters, in the order the model listed them
    #[serde(default)]
    pub relationships: Vec<CharacterRelationship>,
}

/// A directed relationship reference from one character to another
///
/// `character` is a name reference and is not guaranteed to resolve to a
/// character in the same run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterRelationship {
    /// Name of the related character
    #[serde(default)]
    pub character: String,

    /// Relationship type (e.g. "Lover", "Friend")
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Connection strength, nominally 1-10
    #[serde(
        default,
        deserialize_with = "loose_integer",
        skip_serializing_if = "Option::is_none"
    )]
    pub strength: Option<i64>,
}

/// Node-link summary of the character network, ready for visualization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    /// One node per distinct character name
    pub nodes: Vec<GraphNode>,
    /// At most one link per unordered pair of nodes
    pub links: Vec<GraphLink>,
}

/// A character node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Character name
    pub id: String,
    /// Display size: 10 + 2 per listed relationship
    pub size: u32,
    /// Narrative role, "Unknown" if absent
    pub role: String,
    /// Description, empty if absent
    pub description: String,
}

/// An undirected relationship link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphLink {
    /// Name of the character that listed the relationship first
    pub source: String,
    /// Name of the related character
    pub target: String,
    /// Relationship strength
    pub value: i64,
    /// Relationship type
    #[serde(rename = "type")]
    pub kind: String,
}

/// Accepts integers, floats and numeric strings; anything else becomes `None`
fn loose_integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Int(i64),
        Float(f64),
        Text(String),
        Other(serde::de::IgnoredAny),
    }

    Ok(match Loose::deserialize(deserializer)? {
        Loose::Int(value) => Some(value),
        Loose::Float(value) if value.is_finite() => Some(value.round() as i64),
        Loose::Text(text) => text.trim().parse().ok(),
        Loose::Float(_) | Loose::Other(_) => None,
    })
}
