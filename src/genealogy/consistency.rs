//! Structural checks over a lot's subtree.
//!
//! Violations are returned as data. Nothing here fails on a malformed
//! lineage; only store errors and an unknown root propagate.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::arena::LineageArena;
use super::GenealogyEngine;
use crate::error::{Result, SeedError};
use crate::level::GenerationLevel;
use crate::store::LotStore;

/// Tolerance for the children-total comparison.
const QUANTITY_EPSILON: f64 = 1e-9;

/// A violated genealogy invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsistencyIssue {
    /// `lot_id` was reached again below itself through `parent_id`.
    Cycle {
        /// Lot reached twice on one branch.
        lot_id: String,
        /// Lot whose child edge closes the loop.
        parent_id: String,
    },
    /// A child level that does not come after its parent's level.
    Hierarchy {
        /// Parent lot.
        parent_id: String,
        /// Parent level.
        parent_level: GenerationLevel,
        /// Child lot.
        child_id: String,
        /// Child level.
        child_level: GenerationLevel,
    },
    /// Children hold more seed than the lot they came from.
    Quantity {
        /// Over-drawn lot.
        lot_id: String,
        /// Its recorded quantity.
        quantity: f64,
        /// Sum of its direct children's quantities.
        children_total: f64,
        /// `children_total - quantity`.
        excess: f64,
    },
}

impl fmt::Display for ConsistencyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyIssue::Cycle { lot_id, parent_id } => write!(
                f,
                "Cycle detected: lot {} is reached again through {}",
                lot_id, parent_id
            ),
            ConsistencyIssue::Hierarchy {
                parent_id,
                parent_level,
                child_id,
                child_level,
            } => write!(
                f,
                "Invalid hierarchy: {} ({}) -> {} ({})",
                parent_id, parent_level, child_id, child_level
            ),
            ConsistencyIssue::Quantity {
                lot_id,
                quantity,
                children_total,
                excess,
            } => write!(
                f,
                "Quantity exceeded for {}: children total {} kg > {} kg (excess {} kg)",
                lot_id, children_total, quantity, excess
            ),
        }
    }
}

/// Something unusual that does not break an invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsistencyWarning {
    /// The child skips one or more generation levels.
    #[allow(missing_docs)]
    LevelJump {
        parent_id: String,
        parent_level: GenerationLevel,
        child_id: String,
        child_level: GenerationLevel,
    },
}

impl fmt::Display for ConsistencyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyWarning::LevelJump {
                parent_id,
                parent_level,
                child_id,
                child_level,
            } => write!(
                f,
                "Level jump: {} ({}) -> {} ({})",
                parent_id, parent_level, child_id, child_level
            ),
        }
    }
}

/// Result of [`GenealogyEngine::check_genealogy_consistency`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    /// True when `issues` is empty. Warnings do not count.
    pub is_consistent: bool,
    /// Invariant violations.
    pub issues: Vec<ConsistencyIssue>,
    /// Non-blocking observations.
    #[serde(default)]
    pub warnings: Vec<ConsistencyWarning>,
}

impl ConsistencyReport {
    fn new(issues: Vec<ConsistencyIssue>, warnings: Vec<ConsistencyWarning>) -> Self {
        Self {
            is_consistent: issues.is_empty(),
            issues,
            warnings,
        }
    }

    /// Issues rendered as human-readable lines.
    pub fn messages(&self) -> Vec<String> {
        self.issues.iter().map(ToString::to_string).collect()
    }
}

impl<S: LotStore + ?Sized> GenealogyEngine<S> {
    /// Check the subtree under `lot_id` for cycles, level ordering and
    /// quantity conservation.
    ///
    /// The checks cover exactly the lots [`get_tree`](Self::get_tree) shows:
    /// the subtree is cut at the configured `max_depth`, so lots below the
    /// limit and their edges are not examined. Edges that lead back into the
    /// loaded subtree are kept, which is how cycles are reported even though
    /// the tree itself prunes them.
    ///
    /// # Errors
    ///
    /// [`SeedError::LotNotFound`] when the lot does not exist.
    pub fn check_genealogy_consistency(&self, lot_id: &str) -> Result<ConsistencyReport> {
        let max_depth = Some(self.config().max_depth);
        let arena = LineageArena::load(&**self.store(), lot_id, max_depth)?
            .ok_or_else(|| SeedError::LotNotFound(lot_id.to_string()))?;

        let mut issues = check_cycles(&arena);
        let (hierarchy, warnings) = check_hierarchy(&arena);
        issues.extend(hierarchy);
        issues.extend(check_quantities(&arena));

        let report = ConsistencyReport::new(issues, warnings);
        if report.is_consistent {
            info!(lot = %lot_id, lots = arena.lots.len(), "Genealogy consistent");
        } else {
            warn!(
                lot = %lot_id,
                issues = report.issues.len(),
                "Genealogy inconsistencies found"
            );
        }
        Ok(report)
    }
}

/// Depth-first walk keeping the current branch as the path; an edge into a
/// lot already on the path is a cycle. Sibling branches never see each
/// other's lots.
fn check_cycles(arena: &LineageArena) -> Vec<ConsistencyIssue> {
    let mut issues = Vec::new();
    let mut path: Vec<&str> = Vec::new();
    let mut on_path: HashSet<&str> = HashSet::new();
    let mut stack: Vec<(&str, usize)> = vec![(arena.root.as_str(), 0)];

    while let Some((id, depth)) = stack.pop() {
        while path.len() > depth {
            if let Some(left) = path.pop() {
                on_path.remove(left);
            }
        }
        path.push(id);
        on_path.insert(id);

        for child in arena.children_of(id).iter().rev() {
            if on_path.contains(child.as_str()) {
                issues.push(ConsistencyIssue::Cycle {
                    lot_id: child.clone(),
                    parent_id: id.to_string(),
                });
            } else {
                stack.push((child.as_str(), depth + 1));
            }
        }
    }

    issues
}

fn check_hierarchy(arena: &LineageArena) -> (Vec<ConsistencyIssue>, Vec<ConsistencyWarning>) {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    for (parent, child) in arena.edges() {
        if !parent.level.precedes(child.level) {
            issues.push(ConsistencyIssue::Hierarchy {
                parent_id: parent.id.clone(),
                parent_level: parent.level,
                child_id: child.id.clone(),
                child_level: child.level,
            });
        } else if parent.level.distance_to(child.level) > 1 {
            warnings.push(ConsistencyWarning::LevelJump {
                parent_id: parent.id.clone(),
                parent_level: parent.level,
                child_id: child.id.clone(),
                child_level: child.level,
            });
        }
    }

    (issues, warnings)
}

fn check_quantities(arena: &LineageArena) -> Vec<ConsistencyIssue> {
    let mut issues = Vec::new();
    let mut ids: Vec<&String> = arena.lots.keys().collect();
    ids.sort();

    for id in ids {
        let Some(lot) = arena.lot(id) else {
            continue;
        };
        let children = arena.children_of(id);
        if children.is_empty() {
            continue;
        }
        let children_total: f64 = children
            .iter()
            .filter_map(|c| arena.lot(c))
            .map(|c| c.quantity)
            .sum();
        if children_total > lot.quantity + QUANTITY_EPSILON {
            issues.push(ConsistencyIssue::Quantity {
                lot_id: lot.id.clone(),
                quantity: lot.quantity,
                children_total,
                excess: children_total - lot.quantity,
            });
        }
    }

    issues
}
