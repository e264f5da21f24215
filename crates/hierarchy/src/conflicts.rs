//! Conflict detection over parent/child relationships.
//!
//! Every check is an audit: the graph is never modified, and malformed
//! hierarchy data (dangling parents, depth drift, cycles) becomes a
//! [`Conflict`] instead of an error.
//!
//! | Check | Severity |
//! |-------|----------|
//! | Child priority above parent | medium |
//! | Child altitude more abstract than parent | high |
//! | Child scope broader than parent | medium |
//! | Circular parent chain | high |
//! | Depth not `parent.depth + 1` | low |
//! | `child_ids` disagrees with `parent_id` | low |
//! | `parent_id` names a missing node | low |
//! | `conflicts-with` edge | medium |

use promptgraph_core::{Edge, GraphView, Node, RelationshipType};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

// ── Types ─────────────────────────────────────────────────────────────────

/// How serious a detected problem is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Contribution to a node's hotspot score.
    pub fn weight(self) -> u32 {
        match self {
            Self::Low => 10,
            Self::Medium => 20,
            Self::High => 30,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// What kind of problem a conflict describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    PriorityMismatch,
    AltitudeInconsistency,
    ScopeConflict,
    CircularReference,
    DepthInconsistency,
    ChildIndexMismatch,
    DanglingParent,
    ExplicitConflict,
}

impl ConflictType {
    fn slug(self) -> &'static str {
        match self {
            Self::PriorityMismatch => "priority-mismatch",
            Self::AltitudeInconsistency => "altitude-inconsistency",
            Self::ScopeConflict => "scope-conflict",
            Self::CircularReference => "circular-reference",
            Self::DepthInconsistency => "depth-inconsistency",
            Self::ChildIndexMismatch => "child-index-mismatch",
            Self::DanglingParent => "dangling-parent",
            Self::ExplicitConflict => "explicit-conflict",
        }
    }

    fn suggestions(self) -> &'static [&'static str] {
        match self {
            Self::PriorityMismatch => &[
                "Lower the child's context priority to at most its parent's",
                "Raise the parent's priority if the child is genuinely more important",
                "Move the child under a parent of matching importance",
            ],
            Self::AltitudeInconsistency => &[
                "Move the child to the same or a more concrete altitude",
                "Promote the child to a sibling of its parent",
            ],
            Self::ScopeConflict => &[
                "Narrow the child's scope to at most its parent's",
                "Broaden the parent's scope if the child must stay resident",
            ],
            Self::CircularReference => &[
                "Break the cycle by clearing one parent reference",
                "Pick a single root for these nodes",
            ],
            Self::DepthInconsistency => &["Recompute depth from the parent chain"],
            Self::ChildIndexMismatch => &[
                "Rebuild child lists from parent references",
                "Update the parent reference to match the declared child list",
            ],
            Self::DanglingParent => &[
                "Clear the parent reference",
                "Restore the missing parent node",
            ],
            Self::ExplicitConflict => &[
                "Reword one fragment so both can hold",
                "Give the fragments different scopes so they never load together",
                "Remove the weaker fragment",
            ],
        }
    }
}

/// A detected problem. Pure output; nothing in the graph is changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    /// Stable id derived from the type and implicated nodes.
    pub id: String,
    #[serde(rename = "type")]
    pub conflict_type: ConflictType,
    pub severity: Severity,
    pub node_ids: Vec<String>,
    pub description: String,
    pub suggestions: Vec<String>,
}

impl Conflict {
    fn new(
        conflict_type: ConflictType,
        severity: Severity,
        node_ids: Vec<String>,
        description: String,
    ) -> Self {
        Self {
            id: format!("{}:{}", conflict_type.slug(), node_ids.join(",")),
            conflict_type,
            severity,
            node_ids,
            description,
            suggestions: conflict_type
                .suggestions()
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Whether this conflict names the given node.
    pub fn involves(&self, node_id: &str) -> bool {
        self.node_ids.iter().any(|id| id == node_id)
    }
}

// ── Detection ─────────────────────────────────────────────────────────────

/// Relationship conflicts followed by hierarchy conflicts.
pub fn detect_conflicts(nodes: &[Node], edges: &[Edge]) -> Vec<Conflict> {
    let mut conflicts = detect_relationship_conflicts(nodes, edges);
    conflicts.extend(detect_hierarchy_conflicts(nodes));
    conflicts
}

/// One conflict per `conflicts-with` edge whose endpoints both exist.
/// Reversed duplicates of the same pair are reported once.
pub fn detect_relationship_conflicts(nodes: &[Node], edges: &[Edge]) -> Vec<Conflict> {
    let view = GraphView::new(nodes);
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let mut conflicts = Vec::new();

    for edge in edges
        .iter()
        .filter(|e| e.relationship == RelationshipType::ConflictsWith)
    {
        let (Some(a), Some(b)) = (view.get(&edge.source), view.get(&edge.target)) else {
            continue;
        };
        let key = if a.id <= b.id {
            (a.id.as_str(), b.id.as_str())
        } else {
            (b.id.as_str(), a.id.as_str())
        };
        if !seen.insert(key) {
            continue;
        }
        conflicts.push(Conflict::new(
            ConflictType::ExplicitConflict,
            Severity::Medium,
            vec![a.id.clone(), b.id.clone()],
            format!("\"{}\" is marked as conflicting with \"{}\"", a.title, b.title),
        ));
    }

    conflicts
}

/// Audit parent/child relationships.
///
/// Returns nothing for a flat graph: the checks run only when at least
/// one node carries `parent_id`, `altitude` or `scope`.
pub fn detect_hierarchy_conflicts(nodes: &[Node]) -> Vec<Conflict> {
    let view = GraphView::new(nodes);
    if !view.unique_nodes().any(Node::has_hierarchy_fields) {
        return Vec::new();
    }

    let mut conflicts = Vec::new();

    conflicts.extend(priority_mismatches(&view));
    conflicts.extend(altitude_inconsistencies(&view));
    conflicts.extend(scope_conflicts(&view));
    conflicts.extend(circular_references(&view));
    conflicts.extend(depth_inconsistencies(&view));
    conflicts.extend(child_index_mismatches(&view));
    conflicts.extend(dangling_parents(&view));

    if conflicts.is_empty() {
        tracing::debug!(nodes = nodes.len(), "No hierarchy conflicts");
    } else {
        tracing::info!(
            nodes = nodes.len(),
            conflicts = conflicts.len(),
            high = conflicts.iter().filter(|c| c.severity == Severity::High).count(),
            "Hierarchy conflicts detected"
        );
    }

    conflicts
}

/// Each node with an existing parent, paired with that parent.
fn parent_pairs<'v, 'a>(view: &'v GraphView<'a>) -> impl Iterator<Item = (&'a Node, &'a Node)> + 'v {
    view.unique_nodes()
        .filter_map(move |child| view.parent_of(child).map(|parent| (child, parent)))
}

fn priority_mismatches(view: &GraphView<'_>) -> Vec<Conflict> {
    parent_pairs(view)
        .filter_map(|(child, parent)| {
            let child_priority = child.context_priority?;
            let parent_priority = parent.priority_or_default();
            (child_priority > parent_priority).then(|| {
                Conflict::new(
                    ConflictType::PriorityMismatch,
                    Severity::Medium,
                    vec![parent.id.clone(), child.id.clone()],
                    format!(
                        "Child \"{}\" has higher priority ({}) than its parent \"{}\" ({})",
                        child.title, child_priority, parent.title, parent_priority
                    ),
                )
            })
        })
        .collect()
}

fn altitude_inconsistencies(view: &GraphView<'_>) -> Vec<Conflict> {
    parent_pairs(view)
        .filter_map(|(child, parent)| {
            let (child_alt, parent_alt) = (child.altitude?, parent.altitude?);
            (child_alt.index() < parent_alt.index()).then(|| {
                Conflict::new(
                    ConflictType::AltitudeInconsistency,
                    Severity::High,
                    vec![parent.id.clone(), child.id.clone()],
                    format!(
                        "\"{}\" ({}) is more abstract than its parent \"{}\" ({})",
                        child.title, child_alt, parent.title, parent_alt
                    ),
                )
            })
        })
        .collect()
}

fn scope_conflicts(view: &GraphView<'_>) -> Vec<Conflict> {
    parent_pairs(view)
        .filter_map(|(child, parent)| {
            let (child_scope, parent_scope) = (child.scope?, parent.scope?);
            (child_scope.breadth() > parent_scope.breadth()).then(|| {
                Conflict::new(
                    ConflictType::ScopeConflict,
                    Severity::Medium,
                    vec![parent.id.clone(), child.id.clone()],
                    format!(
                        "\"{}\" has a broader scope ({}) than its parent \"{}\" ({})",
                        child.title, child_scope, parent.title, parent_scope
                    ),
                )
            })
        })
        .collect()
}

/// Walk each parent chain once. A node seen by any earlier walk is never
/// walked again, so a cycle is reported once whichever member the scan
/// reaches first.
fn circular_references(view: &GraphView<'_>) -> Vec<Conflict> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut conflicts = Vec::new();

    for start in view.unique_nodes() {
        if visited.contains(start.id.as_str()) {
            continue;
        }

        let mut path: Vec<&str> = Vec::new();
        let mut position: HashMap<&str, usize> = HashMap::new();
        let mut current = Some(start.id.as_str());

        while let Some(id) = current {
            if let Some(&at) = position.get(id) {
                let cycle = &path[at..];
                let titles: Vec<&str> = cycle
                    .iter()
                    .filter_map(|id| view.get(id).map(|n| n.title.as_str()))
                    .chain(std::iter::once(view.get(id).map_or(id, |n| n.title.as_str())))
                    .collect();
                conflicts.push(Conflict::new(
                    ConflictType::CircularReference,
                    Severity::High,
                    cycle.iter().map(|id| id.to_string()).collect(),
                    format!("Circular parent reference: {}", titles.join(" → ")),
                ));
                break;
            }
            if visited.contains(id) {
                break;
            }
            let Some(node) = view.get(id) else {
                break;
            };
            position.insert(id, path.len());
            path.push(id);
            current = node.parent_id.as_deref();
        }

        visited.extend(path);
    }

    conflicts
}

fn depth_inconsistencies(view: &GraphView<'_>) -> Vec<Conflict> {
    parent_pairs(view)
        .filter_map(|(child, parent)| {
            let (child_depth, parent_depth) = (child.depth?, parent.depth?);
            let expected = parent_depth + 1;
            (child_depth != expected).then(|| {
                Conflict::new(
                    ConflictType::DepthInconsistency,
                    Severity::Low,
                    vec![parent.id.clone(), child.id.clone()],
                    format!(
                        "\"{}\" has depth {} but its parent \"{}\" has depth {}; expected depth {}",
                        child.title, child_depth, parent.title, parent_depth, expected
                    ),
                )
            })
        })
        .collect()
}

fn child_index_mismatches(view: &GraphView<'_>) -> Vec<Conflict> {
    let mut reported: HashSet<(&str, &str)> = HashSet::new();
    let mut conflicts = Vec::new();

    // Declared children whose parent reference points elsewhere.
    for parent in view.unique_nodes() {
        for child_id in &parent.child_ids {
            let Some(child) = view.get(child_id) else {
                continue;
            };
            if child.parent_id.as_deref() == Some(parent.id.as_str()) {
                continue;
            }
            if !reported.insert((parent.id.as_str(), child.id.as_str())) {
                continue;
            }
            let actual = child
                .parent_id
                .as_deref()
                .map_or_else(|| "no parent".to_string(), |p| format!("parent \"{p}\""));
            conflicts.push(Conflict::new(
                ConflictType::ChildIndexMismatch,
                Severity::Low,
                vec![parent.id.clone(), child.id.clone()],
                format!(
                    "\"{}\" lists \"{}\" as a child, but \"{}\" has {}",
                    parent.title, child.title, child.title, actual
                ),
            ));
        }
    }

    // Children missing from a parent's non-empty declared list.
    for (child, parent) in parent_pairs(view) {
        if parent.child_ids.is_empty() || parent.child_ids.iter().any(|c| *c == child.id) {
            continue;
        }
        if !reported.insert((parent.id.as_str(), child.id.as_str())) {
            continue;
        }
        conflicts.push(Conflict::new(
            ConflictType::ChildIndexMismatch,
            Severity::Low,
            vec![parent.id.clone(), child.id.clone()],
            format!(
                "\"{}\" names \"{}\" as its parent, but \"{}\" does not list it as a child",
                child.title, parent.title, parent.title
            ),
        ));
    }

    conflicts
}

fn dangling_parents(view: &GraphView<'_>) -> Vec<Conflict> {
    view.unique_nodes()
        .filter_map(|node| {
            let parent_id = node.parent_id.as_deref()?;
            (!view.contains(parent_id)).then(|| {
                Conflict::new(
                    ConflictType::DanglingParent,
                    Severity::Low,
                    vec![node.id.clone()],
                    format!(
                        "\"{}\" references parent \"{}\", which does not exist",
                        node.title, parent_id
                    ),
                )
            })
        })
        .collect()
}
