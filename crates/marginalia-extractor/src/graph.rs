//! Character relationship graph
//!
//! Builds the node/link summary used for visualization. Deterministic for a
//! given input order.

use marginalia_domain::{Character, Graph, GraphLink, GraphNode};
use std::collections::{HashMap, HashSet};

/// Strength used when a relationship gives none
pub const DEFAULT_STRENGTH: i64 = 5;

/// Label used for a missing role or relationship type
pub const UNKNOWN: &str = "Unknown";

/// Base node size before relationships are counted
const BASE_NODE_SIZE: u32 = 10;

/// Build the relationship graph for a character list
///
/// - One node per distinct name, in first-appearance order. A repeated name
///   keeps its first position and takes the later entry's attributes.
/// - Node size is `10 + 2 * relationships listed`.
/// - A link is added only when the target names a node and no link between
///   the unordered pair exists yet, so the first relationship listed wins.
/// - A character listing itself yields a self-loop.
pub fn build_graph(characters: &[Character]) -> Graph {
    let mut nodes: Vec<GraphNode> = Vec::with_capacity(characters.len());
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for character in characters {
        let relationship_count = u32::try_from(character.relationships.len()).unwrap_or(u32::MAX);
        let node = GraphNode {
            id: character.name.clone(),
            size: BASE_NODE_SIZE.saturating_add(relationship_count.saturating_mul(2)),
            role: character.role.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            description: character.description.clone().unwrap_or_default(),
        };

        let existing = positions.get(character.name.as_str()).copied();
        match existing {
            Some(pos) => nodes[pos] = node,
            None => {
                positions.insert(&character.name, nodes.len());
                nodes.push(node);
            }
        }
    }

    let mut links = Vec::new();
    let mut linked: HashSet<(&str, &str)> = HashSet::new();

    for character in characters {
        let source = character.name.as_str();
        for relationship in &character.relationships {
            let target = relationship.character.as_str();
            if !positions.contains_key(target) {
                continue;
            }

            let pair = if source <= target {
                (source, target)
            } else {
                (target, source)
            };
            if !linked.insert(pair) {
                continue;
            }

            links.push(GraphLink {
                source: source.to_string(),
                target: target.to_string(),
                value: relationship.strength.unwrap_or(DEFAULT_STRENGTH),
                kind: relationship
                    .kind
                    .clone()
                    .unwrap_or_else(|| UNKNOWN.to_string()),
            });
        }
    }

    Graph { nodes, links }
}
