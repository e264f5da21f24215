//! Relationships between prompt fragments.

use serde::{Deserialize, Serialize};

/// Relationship tag carried by an edge.
///
/// Informational to most of the engine. Connectivity metrics treat every
/// edge alike; only `ConflictsWith` is inspected by conflict detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RelationshipType {
    DependsOn,
    ConflictsWith,
    Extends,
    Overrides,
    #[default]
    References,
    Refines,
    Delegates,
    Invokes,
}

impl std::fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::DependsOn => "depends-on",
            Self::ConflictsWith => "conflicts-with",
            Self::Extends => "extends",
            Self::Overrides => "overrides",
            Self::References => "references",
            Self::Refines => "refines",
            Self::Delegates => "delegates",
            Self::Invokes => "invokes",
        };
        write!(f, "{label}")
    }
}

/// A directed edge between two node ids. Either end may dangle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub source: String,
    pub target: String,
    #[serde(default, rename = "type")]
    pub relationship: RelationshipType,
}

impl Edge {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relationship: RelationshipType,
    ) -> Self {
        Self {
            id: None,
            source: source.into(),
            target: target.into(),
            relationship,
        }
    }

    /// Whether this edge touches the given node.
    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}
