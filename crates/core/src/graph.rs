//! Per-call lookup index over a node collection.
//!
//! The store hands the engine plain slices. `GraphView` builds the id map
//! and a children map derived from `parent_id` once per analysis call, so
//! no component trusts the cached `child_ids` lists for structural walks.

use crate::edge::Edge;
use crate::node::Node;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;

/// Read-only index over a borrowed node slice.
#[derive(Debug)]
pub struct GraphView<'a> {
    nodes: &'a [Node],
    unique: Vec<&'a Node>,
    by_id: HashMap<&'a str, &'a Node>,
    children: HashMap<&'a str, Vec<&'a str>>,
    duplicates: Vec<String>,
}

impl<'a> GraphView<'a> {
    /// Index a node slice. On duplicate ids the first occurrence wins.
    pub fn new(nodes: &'a [Node]) -> Self {
        let mut by_id: HashMap<&'a str, &'a Node> = HashMap::with_capacity(nodes.len());
        let mut unique = Vec::with_capacity(nodes.len());
        let mut duplicates = Vec::new();

        for node in nodes {
            if by_id.contains_key(node.id.as_str()) {
                duplicates.push(node.id.clone());
                continue;
            }
            by_id.insert(node.id.as_str(), node);
            unique.push(node);
        }

        if !duplicates.is_empty() {
            tracing::warn!(
                count = duplicates.len(),
                ids = ?duplicates,
                "Duplicate node ids; later occurrences are ignored by lookups"
            );
        }

        let mut children: HashMap<&'a str, Vec<&'a str>> = HashMap::new();
        for &node in &unique {
            if let Some(parent_id) = node.parent_id.as_deref() {
                children.entry(parent_id).or_default().push(node.id.as_str());
            }
        }

        Self {
            nodes,
            unique,
            by_id,
            children,
            duplicates,
        }
    }

    /// The underlying slice, in input order, duplicates included.
    pub fn nodes(&self) -> &'a [Node] {
        self.nodes
    }

    /// The first occurrence of each id, in input order.
    pub fn unique_nodes(&self) -> impl Iterator<Item = &'a Node> + '_ {
        self.unique.iter().copied()
    }

    /// The input with later duplicates dropped. Borrows when there are none.
    pub fn distinct(&self) -> Cow<'a, [Node]> {
        if self.duplicates.is_empty() {
            Cow::Borrowed(self.nodes)
        } else {
            Cow::Owned(self.unique_nodes().cloned().collect())
        }
    }

    /// Number of distinct ids.
    pub fn len(&self) -> usize {
        self.unique.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unique.is_empty()
    }

    /// Look up a node. Missing ids are simply absent.
    pub fn get(&self, id: &str) -> Option<&'a Node> {
        self.by_id.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// The node's parent, if it declares one that exists.
    pub fn parent_of(&self, node: &Node) -> Option<&'a Node> {
        node.parent_id.as_deref().and_then(|p| self.get(p))
    }

    /// Ids of nodes whose `parent_id` names `id`, in input order.
    pub fn children_of(&self, id: &str) -> &[&'a str] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Nodes with no `parent_id`.
    pub fn roots(&self) -> impl Iterator<Item = &'a Node> + '_ {
        self.unique_nodes().filter(|n| n.is_root())
    }

    /// Ids that appeared more than once in the input.
    pub fn duplicate_ids(&self) -> &[String] {
        &self.duplicates
    }
}

/// A node/edge collection as exported by the graph store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl GraphSnapshot {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    /// Parse a snapshot from JSON.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::RelationshipType;

    fn family() -> Vec<Node> {
        vec![
            Node::new("root", "Root", ""),
            Node::new("a", "A", "").with_parent("root"),
            Node::new("b", "B", "").with_parent("root"),
            Node::new("a1", "A1", "").with_parent("a"),
        ]
    }

    #[test]
    fn children_come_from_parent_ids() {
        let nodes = family();
        let view = GraphView::new(&nodes);
        assert_eq!(view.children_of("root"), &["a", "b"]);
        assert_eq!(view.children_of("a"), &["a1"]);
        assert!(view.children_of("b").is_empty());
        assert!(view.children_of("missing").is_empty());
    }

    #[test]
    fn stale_child_ids_are_ignored() {
        let nodes = vec![
            Node::new("p", "P", "").with_children(["ghost"]),
            Node::new("c", "C", "").with_parent("p"),
        ];
        let view = GraphView::new(&nodes);
        assert_eq!(view.children_of("p"), &["c"]);
    }

    #[test]
    fn dangling_parent_is_absent() {
        let nodes = vec![Node::new("orphan", "O", "").with_parent("gone")];
        let view = GraphView::new(&nodes);
        assert!(view.parent_of(&nodes[0]).is_none());
        assert_eq!(view.roots().count(), 0);
    }

    #[test]
    fn first_duplicate_wins() {
        let nodes = vec![
            Node::new("x", "First", ""),
            Node::new("x", "Second", ""),
        ];
        let view = GraphView::new(&nodes);
        assert_eq!(view.get("x").map(|n| n.title.as_str()), Some("First"));
        assert_eq!(view.duplicate_ids(), &["x".to_string()]);
        assert_eq!(view.len(), 1);
        assert_eq!(view.nodes().len(), 2);
    }

    #[test]
    fn unique_nodes_skip_later_duplicates() {
        let nodes = vec![
            Node::new("p", "P", ""),
            Node::new("c", "C first", "").with_parent("p"),
            Node::new("c", "C second", ""),
            Node::new("d", "D", "").with_parent("p"),
        ];
        let view = GraphView::new(&nodes);
        let titles: Vec<&str> = view.unique_nodes().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["P", "C first", "D"]);
        assert_eq!(view.roots().count(), 1);
        assert_eq!(view.children_of("p"), &["c", "d"]);
        assert_eq!(view.distinct().len(), 3);
        assert!(matches!(GraphView::new(&nodes[..2]).distinct(), Cow::Borrowed(_)));
    }

    #[test]
    fn snapshot_parses_store_export() {
        let json = r#"{
            "nodes": [{"id": "a", "title": "A"}, {"id": "b", "title": "B", "parentId": "a"}],
            "edges": [{"source": "a", "target": "b", "type": "extends"}]
        }"#;
        let snapshot = GraphSnapshot::from_json(json).unwrap();
        assert_eq!(snapshot.nodes.len(), 2);
        assert_eq!(snapshot.edges[0].relationship, RelationshipType::Extends);
    }

    #[test]
    fn snapshot_rejects_malformed_json() {
        assert!(GraphSnapshot::from_json("{\"nodes\": [").is_err());
    }
}
