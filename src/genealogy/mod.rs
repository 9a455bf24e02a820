//! Seed-lot genealogy engine.
//!
//! Materializes lineage views over a [`LotStore`]: the descendant tree under a
//! lot, its ancestor chain up to the foundation lot, flat descendant lists
//! and direct relations. It also edits parent links, aggregates statistics,
//! checks structural invariants and exports trees as JSON, CSV or Graphviz.
//!
//! The engine keeps no state of its own beyond its configuration and the
//! per-lot locks that serialize relation edits. Read paths are best-effort:
//! cycles and depth overruns met while walking are logged and the offending
//! branch is dropped, so a damaged lineage still renders.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use seedtrace::{GenealogyEngine, GenerationLevel, MemoryLotStore, NewLot};
//!
//! let store = Arc::new(MemoryLotStore::in_memory());
//! let a = store.create_lot(NewLot::new(GenerationLevel::GO, "Sahel 108", 100.0))?;
//! let b = store.create_lot(NewLot::new(GenerationLevel::G1, "Sahel 108", 40.0).parent(a.id.clone()))?;
//!
//! let engine = GenealogyEngine::new(store);
//! let ancestors = engine.get_ancestors(&b.id)?;
//! assert_eq!(ancestors.len(), 2);
//! assert_eq!(ancestors[0].id, a.id);
//!
//! let tree = engine.get_tree(&a.id)?.unwrap();
//! assert_eq!(tree.children[0].id, b.id);
//! # Ok::<(), seedtrace::SeedError>(())
//! ```

mod arena;
mod config;
mod consistency;
mod export;
mod relations;
mod stats;
mod tree;

pub use config::{GenealogyConfig, DEFAULT_MAX_DEPTH};
pub use consistency::{ConsistencyIssue, ConsistencyReport, ConsistencyWarning};
pub use export::ExportFormat;
pub use relations::{RelationOptions, UpdateRelationOptions};
pub use stats::GenealogyStats;
pub use tree::TreeNode;

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{Result, SeedError};
use crate::locks::LotLocks;
use crate::lot::{LotRecord, LotSummary};
use crate::store::LotStore;
use arena::LineageArena;

/// A lot with its parent and direct children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectRelations {
    /// The lot itself.
    pub current: LotSummary,
    /// Its parent, if the link resolves.
    pub parent: Option<LotSummary>,
    /// Its direct children, in store order.
    pub children: Vec<LotSummary>,
}

/// Genealogy engine over a lot store.
pub struct GenealogyEngine<S: LotStore + ?Sized> {
    store: Arc<S>,
    config: GenealogyConfig,
    locks: LotLocks,
}

impl<S: LotStore + ?Sized> GenealogyEngine<S> {
    /// Create an engine with the default configuration.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            config: GenealogyConfig::default(),
            locks: LotLocks::new(),
        }
    }

    /// Create an engine with a validated configuration.
    pub fn with_config(store: Arc<S>, config: GenealogyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            locks: LotLocks::new(),
        })
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Active configuration.
    pub fn config(&self) -> &GenealogyConfig {
        &self.config
    }

    pub(crate) fn locks(&self) -> &LotLocks {
        &self.locks
    }

    pub(crate) fn require_lot(&self, id: &str) -> Result<LotRecord> {
        self.store
            .find_lot(id)?
            .ok_or_else(|| SeedError::LotNotFound(id.to_string()))
    }

    /// Descendant tree of `lot_id` using the configured depth limit.
    pub fn get_tree(&self, lot_id: &str) -> Result<Option<TreeNode>> {
        self.get_genealogy_tree(lot_id, self.config.max_depth)
    }

    /// Descendant tree of `lot_id`, depth-first with siblings in store order.
    ///
    /// The root is depth 0 and a lot at depth `d` is included only when
    /// `d < max_depth`. A lot that reappears on its own path is excluded and
    /// logged as an error. Returns `Ok(None)` when `lot_id` does not exist.
    pub fn get_genealogy_tree(&self, lot_id: &str, max_depth: usize) -> Result<Option<TreeNode>> {
        let Some(arena) = LineageArena::load(&*self.store, lot_id, Some(max_depth))? else {
            debug!(lot = %lot_id, "Tree requested for unknown lot");
            return Ok(None);
        };
        Ok(tree::build_tree(&arena))
    }

    /// Ancestor chain of `lot_id`, ordered root first and ending with the lot
    /// itself. A cycle in the parent links stops the walk and the chain
    /// collected so far is returned. Unknown lots yield an empty chain.
    pub fn get_ancestors(&self, lot_id: &str) -> Result<Vec<LotSummary>> {
        Ok(self
            .ancestor_records(lot_id)?
            .iter()
            .map(LotSummary::from)
            .collect())
    }

    /// Ancestor records of `lot_id`, self first and root last.
    pub(crate) fn ancestor_records(&self, lot_id: &str) -> Result<Vec<LotRecord>> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(lot_id.to_string());

        while let Some(id) = next.take() {
            if !visited.insert(id.clone()) {
                error!(
                    lot = %lot_id,
                    revisited = %id,
                    "Cycle detected in ancestor chain, returning partial chain"
                );
                break;
            }
            let Some(lot) = self.store.find_lot(&id)? else {
                if !chain.is_empty() {
                    warn!(lot = %id, "Dangling parent reference in ancestor chain");
                }
                break;
            };
            next = lot.parent_lot_id.clone();
            chain.push(lot);
        }

        chain.reverse();
        Ok(chain)
    }

    /// Every lot transitively produced from `lot_id`, in breadth-first
    /// discovery order. The lot itself is not included.
    pub fn get_descendants(&self, lot_id: &str) -> Result<Vec<LotSummary>> {
        Ok(self
            .descendant_records(lot_id)?
            .iter()
            .map(LotSummary::from)
            .collect())
    }

    pub(crate) fn descendant_records(&self, lot_id: &str) -> Result<Vec<LotRecord>> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();

        visited.insert(lot_id.to_string());
        queue.push_back(lot_id.to_string());

        while let Some(id) = queue.pop_front() {
            for child in self.store.find_children(&id)? {
                if !visited.insert(child.id.clone()) {
                    continue;
                }
                queue.push_back(child.id.clone());
                out.push(child);
            }
        }

        Ok(out)
    }

    /// The lot, its parent and its direct children.
    ///
    /// # Errors
    ///
    /// [`SeedError::LotNotFound`] when `lot_id` does not exist.
    pub fn get_direct_relations(&self, lot_id: &str) -> Result<DirectRelations> {
        let current = self.require_lot(lot_id)?;
        let parent = match &current.parent_lot_id {
            Some(parent_id) => self.store.find_lot(parent_id)?,
            None => None,
        };
        let children = self.store.find_children(lot_id)?;

        Ok(DirectRelations {
            current: current.summary(),
            parent: parent.as_ref().map(LotSummary::from),
            children: children.iter().map(LotSummary::from).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::GenerationLevel;
    use crate::lot::NewLot;
    use crate::store::MemoryLotStore;
    use chrono::NaiveDate;

    fn record(id: &str, level: GenerationLevel, parent: Option<&str>) -> LotRecord {
        let mut lot = NewLot::new(level, "Sahel 108", 10.0)
            .produced_on(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .into_record(id.to_string());
        lot.parent_lot_id = parent.map(str::to_string);
        lot
    }

    fn engine(lots: Vec<LotRecord>) -> GenealogyEngine<MemoryLotStore> {
        GenealogyEngine::new(Arc::new(MemoryLotStore::from_lots(lots).unwrap()))
    }

    #[test]
    fn test_root_ancestors_is_self() {
        let e = engine(vec![record("a", GenerationLevel::GO, None)]);
        let chain = e.get_ancestors("a").unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].id, "a");
        assert!(e.get_ancestors("missing").unwrap().is_empty());
    }

    #[test]
    fn test_ancestor_cycle_returns_partial_chain() {
        let e = engine(vec![
            record("a", GenerationLevel::GO, Some("b")),
            record("b", GenerationLevel::G1, Some("a")),
        ]);
        let ids: Vec<_> = e
            .get_ancestors("a")
            .unwrap()
            .into_iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_dangling_parent_ends_chain() {
        let e = engine(vec![record("a", GenerationLevel::G1, Some("ghost"))]);
        let chain = e.get_ancestors("a").unwrap();
        assert_eq!(chain.len(), 1);
        let rel = e.get_direct_relations("a").unwrap();
        assert!(rel.parent.is_none());
    }

    #[test]
    fn test_descendants_bfs_order() {
        let e = engine(vec![
            record("a", GenerationLevel::GO, None),
            record("b", GenerationLevel::G1, Some("a")),
            record("c", GenerationLevel::G1, Some("a")),
            record("d", GenerationLevel::G2, Some("b")),
            record("e", GenerationLevel::G2, Some("c")),
        ]);
        let ids: Vec<_> = e
            .get_descendants("a")
            .unwrap()
            .into_iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(ids, vec!["b", "c", "d", "e"]);
    }

    #[test]
    fn test_descendants_exclude_root_under_cycle() {
        let e = engine(vec![
            record("a", GenerationLevel::GO, Some("b")),
            record("b", GenerationLevel::G1, Some("a")),
        ]);
        let ids: Vec<_> = e
            .get_descendants("a")
            .unwrap()
            .into_iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn test_direct_relations_not_found() {
        let e = engine(vec![]);
        assert!(matches!(
            e.get_direct_relations("nope"),
            Err(SeedError::LotNotFound(id)) if id == "nope"
        ));
    }

    #[test]
    fn test_unknown_tree_is_none() {
        let e = engine(vec![]);
        assert!(e.get_tree("nope").unwrap().is_none());
    }

    #[test]
    fn test_with_config_validates() {
        let store = Arc::new(MemoryLotStore::in_memory());
        assert!(GenealogyEngine::with_config(store, GenealogyConfig::default().with_max_depth(0)).is_err());
    }
}
