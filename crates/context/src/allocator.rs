//! Budget allocation across nodes.
//!
//! Three independent passes each spend their own reserve of the budget:
//!
//! | Pass | Reserve | Split |
//! |------|---------|-------|
//! | Scope | 30% | equally among `GLOBAL` nodes |
//! | Altitude | 40% | by fixed altitude weight, then equally within a level |
//! | Priority | 30% | proportional to `context_priority` |
//!
//! The passes are merged by keeping, per node, the record with the largest
//! `allocated` value. Shares are floored, so each pass spends at most its
//! reserve.

use crate::window::Allocation;
use promptgraph_core::{Altitude, Node, Scope};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

// ── Settings ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetSettings {
    pub scope_reserve: f64,
    pub altitude_reserve: f64,
    pub priority_reserve: f64,
    /// `used = allocated * ratio` for nodes without a size estimate.
    /// A placeholder, not a measurement.
    pub default_used_ratio: f64,
}

impl Default for BudgetSettings {
    fn default() -> Self {
        Self {
            scope_reserve: 0.3,
            altitude_reserve: 0.4,
            priority_reserve: 0.3,
            default_used_ratio: 0.8,
        }
    }
}

// ── Allocation ────────────────────────────────────────────────────────────

/// Allocate with the default reserves.
pub fn allocate_budget(nodes: &[Node], total_budget: usize) -> Vec<Allocation> {
    BudgetAllocator::default().allocate(nodes, total_budget)
}

#[derive(Debug, Clone, Default)]
pub struct BudgetAllocator {
    settings: BudgetSettings,
}

impl BudgetAllocator {
    pub fn new(settings: BudgetSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &BudgetSettings {
        &self.settings
    }

    /// One allocation per distinct node id, in input order.
    pub fn allocate(&self, nodes: &[Node], total_budget: usize) -> Vec<Allocation> {
        let nodes = distinct(nodes);

        let passes = [
            self.scope_pass(&nodes, total_budget),
            self.altitude_pass(&nodes, total_budget),
            self.priority_pass(&nodes, total_budget),
        ];
        let mut merged = merge_allocations(&passes);

        let position: HashMap<&str, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id.as_str(), i))
            .collect();
        merged.sort_by_key(|a| position.get(a.node_id.as_str()).copied().unwrap_or(usize::MAX));

        for (allocation, node) in merged.iter_mut().zip(&nodes) {
            allocation.used = node
                .estimated_tokens
                .unwrap_or_else(|| floor_fraction(allocation.allocated, self.settings.default_used_ratio));
        }

        tracing::debug!(
            nodes = nodes.len(),
            total_budget,
            allocated = merged.iter().map(|a| a.allocated).sum::<usize>(),
            used = merged.iter().map(|a| a.used).sum::<usize>(),
            "Budget allocated"
        );

        merged
    }

    /// `GLOBAL` nodes split the scope reserve equally. Other nodes get no
    /// entry from this pass.
    pub fn scope_pass(&self, nodes: &[&Node], total_budget: usize) -> Vec<Allocation> {
        let reserve = floor_fraction(total_budget, self.settings.scope_reserve);
        let global: Vec<&Node> = nodes
            .iter()
            .copied()
            .filter(|node| node.scope == Some(Scope::Global))
            .collect();
        if global.is_empty() {
            return Vec::new();
        }

        let share = reserve / global.len();
        global.into_iter().map(|node| base(node, share)).collect()
    }

    /// Each altitude level receives its weight of the altitude reserve,
    /// split equally among the nodes at that level.
    pub fn altitude_pass(&self, nodes: &[&Node], total_budget: usize) -> Vec<Allocation> {
        let reserve = floor_fraction(total_budget, self.settings.altitude_reserve);

        let mut per_level: HashMap<Altitude, usize> = HashMap::new();
        for node in nodes {
            *per_level.entry(node.altitude_or_default()).or_default() += 1;
        }

        nodes
            .iter()
            .map(|node| {
                let altitude = node.altitude_or_default();
                let level_reserve = floor_fraction(reserve, altitude.budget_weight());
                let peers = per_level.get(&altitude).copied().unwrap_or(1);
                base(node, level_reserve / peers)
            })
            .collect()
    }

    /// Nodes split the priority reserve in proportion to their priority.
    pub fn priority_pass(&self, nodes: &[&Node], total_budget: usize) -> Vec<Allocation> {
        let reserve = floor_fraction(total_budget, self.settings.priority_reserve);
        let total_priority: u64 = nodes.iter().map(|n| u64::from(n.priority_or_default())).sum();

        nodes
            .iter()
            .map(|node| {
                let share = if total_priority == 0 {
                    0
                } else {
                    (reserve as u128 * u128::from(node.priority_or_default()) / u128::from(total_priority))
                        as usize
                };
                base(node, share)
            })
            .collect()
    }
}

/// Keep the largest `allocated` record per node id. Ties keep the record
/// from the earlier pass. Output follows first appearance.
pub fn merge_allocations(passes: &[Vec<Allocation>]) -> Vec<Allocation> {
    let mut merged: Vec<Allocation> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for allocation in passes.iter().flatten() {
        match index.get(&allocation.node_id) {
            Some(&i) => {
                if allocation.allocated > merged[i].allocated {
                    merged[i] = allocation.clone();
                }
            }
            None => {
                index.insert(allocation.node_id.clone(), merged.len());
                merged.push(allocation.clone());
            }
        }
    }

    merged
}

/// Record shared by every pass: priority and compressibility follow the
/// node's altitude, and preserve-hinted nodes are never compressible.
fn base(node: &Node, allocated: usize) -> Allocation {
    let altitude = node.altitude_or_default();
    Allocation::new(
        node.id.clone(),
        allocated,
        altitude.allocation_priority(),
        altitude.is_compressible() && !node.is_preserved(),
    )
}

fn floor_fraction(amount: usize, fraction: f64) -> usize {
    (amount as f64 * fraction).floor() as usize
}

fn distinct(nodes: &[Node]) -> Vec<&Node> {
    let mut seen = HashSet::new();
    nodes.iter().filter(|node| seen.insert(node.id.as_str())).collect()
}
