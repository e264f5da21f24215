//! Prompt fragment nodes and their hierarchy attributes.
//!
//! Nodes are owned by the external graph store. The engine only reads
//! them; every hierarchy field is optional and absent values fall back to
//! documented defaults instead of failing.

use serde::{Deserialize, Serialize};

// ── Altitude ──────────────────────────────────────────────────────────────

/// Abstraction level of a prompt fragment.
///
/// Declaration order is the ordered scale from most abstract to most
/// concrete, so `Ord` compares by concreteness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Altitude {
    Meta,
    Strategic,
    #[default]
    Tactical,
    Operational,
    Implementation,
}

impl Altitude {
    /// Every altitude, most abstract first.
    pub const ALL: [Altitude; 5] = [
        Altitude::Meta,
        Altitude::Strategic,
        Altitude::Tactical,
        Altitude::Operational,
        Altitude::Implementation,
    ];

    /// Position in the ordered scale (0 = META).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Share of the altitude reserve given to this level.
    pub fn budget_weight(self) -> f64 {
        match self {
            Self::Meta => 0.30,
            Self::Strategic => 0.25,
            Self::Tactical => 0.20,
            Self::Operational => 0.15,
            Self::Implementation => 0.10,
        }
    }

    /// Allocation priority assigned to nodes at this level.
    pub fn allocation_priority(self) -> u32 {
        match self {
            Self::Meta => 100,
            Self::Strategic => 80,
            Self::Tactical => 60,
            Self::Operational => 40,
            Self::Implementation => 20,
        }
    }

    /// Only the two most concrete levels may be compacted.
    pub fn is_compressible(self) -> bool {
        matches!(self, Self::Operational | Self::Implementation)
    }
}

impl std::fmt::Display for Altitude {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Meta => write!(f, "META"),
            Self::Strategic => write!(f, "STRATEGIC"),
            Self::Tactical => write!(f, "TACTICAL"),
            Self::Operational => write!(f, "OPERATIONAL"),
            Self::Implementation => write!(f, "IMPLEMENTATION"),
        }
    }
}

// ── Scope ─────────────────────────────────────────────────────────────────

/// Context-window residency class of a prompt fragment.
///
/// Declaration order runs from always-resident to conditionally loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scope {
    Global,
    Session,
    Task,
    Local,
    Conditional,
}

impl Scope {
    /// Every scope, broadest first.
    pub const ALL: [Scope; 5] = [
        Scope::Global,
        Scope::Session,
        Scope::Task,
        Scope::Local,
        Scope::Conditional,
    ];

    /// Rank on the parent/child breadth scale used for conflict checks:
    /// LOCAL < CONDITIONAL < TASK < SESSION < GLOBAL.
    ///
    /// A child must never rank higher than its parent.
    pub fn breadth(self) -> usize {
        match self {
            Self::Local => 0,
            Self::Conditional => 1,
            Self::Task => 2,
            Self::Session => 3,
            Self::Global => 4,
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Global => write!(f, "GLOBAL"),
            Self::Session => write!(f, "SESSION"),
            Self::Task => write!(f, "TASK"),
            Self::Local => write!(f, "LOCAL"),
            Self::Conditional => write!(f, "CONDITIONAL"),
        }
    }
}

// ── Compression hint ──────────────────────────────────────────────────────

/// How a fragment may be treated when the window runs short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionHint {
    /// Never compacted, whatever its priority.
    Preserve,
    Summarize,
    Optional,
    Defer,
}

// ── Category ──────────────────────────────────────────────────────────────

/// Kind of prompt fragment. Informational to the engine apart from the
/// cohesion score, which counts distinct categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    Role,
    Context,
    Instruction,
    Constraint,
    Example,
    Format,
    Persona,
    Tool,
    Orchestrator,
    SubAgent,
    Skill,
    #[default]
    Other,
}

// ── Node ──────────────────────────────────────────────────────────────────

/// A prompt fragment in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique identifier (uniqueness is a caller contract).
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: NodeCategory,

    /// Parent reference. The single source of truth for nesting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Declared children. A cached index that may drift from `parent_id`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub child_ids: Vec<String>,
    /// Nesting depth; expected to be `parent.depth + 1`, 0 for roots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<Altitude>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,

    /// Importance in 0–100, higher is more important.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_priority: Option<u32>,
    /// 0.0–1.0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specificity: Option<f64>,
    /// 0.0–1.0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flexibility: Option<f64>,
    /// Target token allowance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_budget: Option<usize>,
    /// Actual or approximate size in tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_tokens: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_hint: Option<CompressionHint>,

    #[serde(default)]
    pub is_template: bool,
}

/// Priority assumed for nodes that do not declare one.
pub const DEFAULT_CONTEXT_PRIORITY: u32 = 50;

impl Node {
    /// Create a flat node with no hierarchy attributes.
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            category: NodeCategory::default(),
            parent_id: None,
            child_ids: Vec::new(),
            depth: None,
            altitude: None,
            scope: None,
            context_priority: None,
            specificity: None,
            flexibility: None,
            token_budget: None,
            estimated_tokens: None,
            compression_hint: None,
            is_template: false,
        }
    }

    pub fn with_category(mut self, category: NodeCategory) -> Self {
        self.category = category;
        self
    }

    /// Set the parent reference.
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Set the declared child list.
    pub fn with_children<I, S>(mut self, child_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.child_ids = child_ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_altitude(mut self, altitude: Altitude) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.context_priority = Some(priority);
        self
    }

    pub fn with_specificity(mut self, specificity: f64) -> Self {
        self.specificity = Some(specificity);
        self
    }

    pub fn with_flexibility(mut self, flexibility: f64) -> Self {
        self.flexibility = Some(flexibility);
        self
    }

    pub fn with_token_budget(mut self, budget: usize) -> Self {
        self.token_budget = Some(budget);
        self
    }

    pub fn with_estimated_tokens(mut self, tokens: usize) -> Self {
        self.estimated_tokens = Some(tokens);
        self
    }

    pub fn with_compression_hint(mut self, hint: CompressionHint) -> Self {
        self.compression_hint = Some(hint);
        self
    }

    pub fn as_template(mut self) -> Self {
        self.is_template = true;
        self
    }

    /// Whether any hierarchy attribute is present.
    pub fn has_hierarchy_fields(&self) -> bool {
        self.parent_id.is_some() || self.altitude.is_some() || self.scope.is_some()
    }

    /// Declared priority, or the default of 50.
    pub fn priority_or_default(&self) -> u32 {
        self.context_priority.unwrap_or(DEFAULT_CONTEXT_PRIORITY)
    }

    /// Declared depth, or 0.
    pub fn depth_or_default(&self) -> u32 {
        self.depth.unwrap_or(0)
    }

    /// Declared altitude, or TACTICAL.
    pub fn altitude_or_default(&self) -> Altitude {
        self.altitude.unwrap_or_default()
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.child_ids.is_empty()
    }

    pub fn is_preserved(&self) -> bool {
        self.compression_hint == Some(CompressionHint::Preserve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn altitude_scale_is_ordered_abstract_to_concrete() {
        assert!(Altitude::Meta < Altitude::Strategic);
        assert!(Altitude::Operational < Altitude::Implementation);
        assert_eq!(Altitude::Meta.index(), 0);
        assert_eq!(Altitude::Implementation.index(), 4);
    }

    #[test]
    fn altitude_weights_sum_to_one() {
        let sum: f64 = Altitude::ALL.iter().map(|a| a.budget_weight()).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn only_concrete_altitudes_compress() {
        let compressible: Vec<_> = Altitude::ALL
            .iter()
            .filter(|a| a.is_compressible())
            .collect();
        assert_eq!(
            compressible,
            vec![&Altitude::Operational, &Altitude::Implementation]
        );
    }

    #[test]
    fn scope_breadth_puts_conditional_above_local() {
        assert!(Scope::Global.breadth() > Scope::Session.breadth());
        assert!(Scope::Task.breadth() > Scope::Conditional.breadth());
        assert!(Scope::Conditional.breadth() > Scope::Local.breadth());
    }

    #[test]
    fn defaults_for_missing_fields() {
        let node = Node::new("a", "A", "");
        assert_eq!(node.priority_or_default(), 50);
        assert_eq!(node.depth_or_default(), 0);
        assert_eq!(node.altitude_or_default(), Altitude::Tactical);
        assert!(!node.has_hierarchy_fields());
        assert!(node.is_root());
        assert!(node.is_leaf());
        assert_eq!(node.category, NodeCategory::Other);
        assert_eq!(Altitude::default(), Altitude::Tactical);
    }

    #[test]
    fn deserializes_store_field_names() {
        let json = r#"{
            "id": "n1",
            "title": "Role",
            "content": "You are a reviewer.",
            "category": "role",
            "parentId": "root",
            "childIds": ["c1", "c2"],
            "depth": 1,
            "altitude": "STRATEGIC",
            "scope": "SESSION",
            "contextPriority": 70,
            "compressionHint": "preserve",
            "isTemplate": true
        }"#;
        let node: Node = serde_json::from_str(json).unwrap();
        assert_eq!(node.parent_id.as_deref(), Some("root"));
        assert_eq!(node.child_ids, vec!["c1", "c2"]);
        assert_eq!(node.altitude, Some(Altitude::Strategic));
        assert_eq!(node.scope, Some(Scope::Session));
        assert_eq!(node.context_priority, Some(70));
        assert!(node.is_preserved());
        assert!(node.is_template);
    }

    #[test]
    fn minimal_node_deserializes() {
        let node: Node = serde_json::from_str(r#"{"id": "x", "title": "X"}"#).unwrap();
        assert_eq!(node.category, NodeCategory::Other);
        assert!(node.content.is_empty());
        assert!(node.altitude.is_none());
    }
}
