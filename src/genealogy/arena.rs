//! Subtree snapshot used by tree building and consistency checks.
//!
//! Instead of one store round-trip per visited node, the subtree under a root
//! is loaded level by level with [`LotStore::find_children_of_many`] into an
//! arena of records keyed by id plus a parent -> children index. Every child
//! edge the store reports is kept, including edges that point back at a lot
//! already in the arena, so that later passes can see malformed links.

use std::collections::HashMap;

use tracing::warn;

use crate::error::Result;
use crate::lot::LotRecord;
use crate::store::LotStore;

#[derive(Debug, Clone)]
pub(crate) struct LineageArena {
    pub root: String,
    pub lots: HashMap<String, LotRecord>,
    /// parent id -> child ids, in store order
    pub children: HashMap<String, Vec<String>>,
    /// Set when the depth limit cut off lots that exist in the store.
    pub truncated: bool,
}

impl LineageArena {
    /// Load the subtree under `root_id`. With `max_depth = Some(n)` only lots
    /// at depth `< n` are loaded (the root is depth 0). Returns `None` when
    /// the root does not exist.
    pub fn load<S: LotStore + ?Sized>(
        store: &S,
        root_id: &str,
        max_depth: Option<usize>,
    ) -> Result<Option<Self>> {
        let Some(root) = store.find_lot(root_id)? else {
            return Ok(None);
        };

        let mut arena = Self {
            root: root.id.clone(),
            lots: HashMap::new(),
            children: HashMap::new(),
            truncated: false,
        };
        arena.lots.insert(root.id.clone(), root);

        let mut frontier = vec![root_id.to_string()];
        let mut depth = 0usize;

        while !frontier.is_empty() {
            let found = store.find_children_of_many(&frontier)?;
            if found.is_empty() {
                break;
            }

            if max_depth.is_some_and(|limit| depth + 1 >= limit) {
                // Edges back into the loaded subtree are still recorded so
                // the cycle check sees them; only new lots are cut off.
                let mut omitted = 0usize;
                for child in found {
                    if !arena.lots.contains_key(&child.id) {
                        omitted += 1;
                        continue;
                    }
                    if let Some(parent_id) = child.parent_lot_id {
                        arena.children.entry(parent_id).or_default().push(child.id);
                    }
                }
                if omitted > 0 {
                    warn!(
                        root = %root_id,
                        depth = depth + 1,
                        omitted,
                        "Maximum genealogy depth reached, omitting deeper lots"
                    );
                    arena.truncated = true;
                }
                break;
            }

            let mut next = Vec::new();
            for child in found {
                let Some(parent_id) = child.parent_lot_id.clone() else {
                    continue;
                };
                arena
                    .children
                    .entry(parent_id)
                    .or_default()
                    .push(child.id.clone());
                if !arena.lots.contains_key(&child.id) {
                    next.push(child.id.clone());
                    arena.lots.insert(child.id.clone(), child);
                }
            }

            frontier = next;
            depth += 1;
        }

        Ok(Some(arena))
    }

    pub fn lot(&self, id: &str) -> Option<&LotRecord> {
        self.lots.get(id)
    }

    pub fn children_of(&self, id: &str) -> &[String] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Parent -> child edges reachable from the root, depth-first in store
    /// order. Each edge is yielded once even when the data contains a cycle.
    pub fn edges(&self) -> Vec<(&LotRecord, &LotRecord)> {
        let mut out = Vec::new();
        let mut expanded = std::collections::HashSet::new();
        let mut stack = vec![self.root.as_str()];

        while let Some(id) = stack.pop() {
            if !expanded.insert(id) {
                continue;
            }
            let Some(parent) = self.lots.get(id) else {
                continue;
            };
            let children = self.children_of(id);
            for child_id in children {
                if let Some(child) = self.lots.get(child_id) {
                    out.push((parent, child));
                }
            }
            for child_id in children.iter().rev() {
                stack.push(child_id.as_str());
            }
        }
        out
    }
}
