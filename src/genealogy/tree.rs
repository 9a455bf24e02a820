use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::error;

use super::arena::LineageArena;
use crate::level::GenerationLevel;
use crate::lot::{LotRecord, LotStatus};

/// A lot and its descendants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Lot id.
    pub id: String,
    /// Generation level.
    pub level: GenerationLevel,
    /// Variety name.
    pub variety: String,
    /// Quantity in kilograms.
    pub quantity: f64,
    /// Production date.
    pub production_date: NaiveDate,
    /// Status.
    pub status: LotStatus,
    /// Multiplier name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<String>,
    /// Parent lot id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_lot_id: Option<String>,
    /// Child subtrees, in store order.
    #[serde(default)]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    fn leaf(lot: &LotRecord) -> Self {
        Self {
            id: lot.id.clone(),
            level: lot.level,
            variety: lot.variety.clone(),
            quantity: lot.quantity,
            production_date: lot.production_date,
            status: lot.status,
            multiplier: lot.multiplier.clone(),
            parent_lot_id: lot.parent_lot_id.clone(),
            children: Vec::new(),
        }
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(TreeNode::node_count).sum::<usize>()
    }

    /// Longest root-to-leaf path, counted in edges.
    pub fn height(&self) -> usize {
        self.children
            .iter()
            .map(|c| c.height() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Node ids in depth-first pre-order.
    pub fn ids(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.walk(&mut |node, _| out.push(node.id.as_str()));
        out
    }

    /// Parent -> child pairs in depth-first pre-order.
    pub fn edges(&self) -> Vec<(&TreeNode, &TreeNode)> {
        let mut out = Vec::new();
        self.walk(&mut |node, parent| {
            if let Some(parent) = parent {
                out.push((parent, node));
            }
        });
        out
    }

    /// Find a node by id.
    pub fn find(&self, id: &str) -> Option<&TreeNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    fn walk<'a, F>(&'a self, f: &mut F)
    where
        F: FnMut(&'a TreeNode, Option<&'a TreeNode>),
    {
        fn go<'a, F>(node: &'a TreeNode, parent: Option<&'a TreeNode>, f: &mut F)
        where
            F: FnMut(&'a TreeNode, Option<&'a TreeNode>),
        {
            f(node, parent);
            for child in &node.children {
                go(child, Some(node), f);
            }
        }
        go(self, None, f);
    }
}

/// Build the tree rooted at the arena's root. The depth cut is the one
/// [`LineageArena::load`] made; a lot that reappears on its own path is
/// logged and left out.
pub(crate) fn build_tree(arena: &LineageArena) -> Option<TreeNode> {
    let mut path = Vec::new();
    build_node(arena, &arena.root, &mut path)
}

fn build_node(arena: &LineageArena, id: &str, path: &mut Vec<String>) -> Option<TreeNode> {
    if path.iter().any(|p| p == id) {
        error!(
            lot = %id,
            path = %path.join(" -> "),
            "Cycle detected in genealogy, excluding branch"
        );
        return None;
    }
    let lot = arena.lot(id)?;

    let mut node = TreeNode::leaf(lot);
    path.push(id.to_string());
    for child_id in arena.children_of(id) {
        if let Some(child) = build_node(arena, child_id, path) {
            node.children.push(child);
        }
    }
    path.pop();

    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lot::NewLot;
    use crate::store::MemoryLotStore;

    fn record(id: &str, level: GenerationLevel, parent: Option<&str>) -> LotRecord {
        let mut lot = NewLot::new(level, "Sahel 108", 10.0)
            .produced_on(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .into_record(id.to_string());
        lot.parent_lot_id = parent.map(str::to_string);
        lot
    }

    fn tree(lots: Vec<LotRecord>, root: &str, depth: usize) -> Option<TreeNode> {
        let store = MemoryLotStore::from_lots(lots).unwrap();
        let arena = LineageArena::load(&store, root, Some(depth)).unwrap()?;
        build_tree(&arena)
    }

    #[test]
    fn test_tree_shape() {
        let t = tree(
            vec![
                record("a", GenerationLevel::GO, None),
                record("b", GenerationLevel::G1, Some("a")),
                record("c", GenerationLevel::G1, Some("a")),
                record("d", GenerationLevel::G2, Some("b")),
            ],
            "a",
            10,
        )
        .unwrap();

        assert_eq!(t.ids(), vec!["a", "b", "d", "c"]);
        assert_eq!(t.node_count(), 4);
        assert_eq!(t.height(), 2);
        let edges: Vec<_> = t
            .edges()
            .into_iter()
            .map(|(p, c)| (p.id.as_str(), c.id.as_str()))
            .collect();
        assert_eq!(edges, vec![("a", "b"), ("b", "d"), ("a", "c")]);
        assert_eq!(t.find("d").unwrap().parent_lot_id.as_deref(), Some("b"));
    }

    #[test]
    fn test_cycle_branch_excluded() {
        let t = tree(
            vec![
                record("a", GenerationLevel::GO, Some("b")),
                record("b", GenerationLevel::G1, Some("a")),
            ],
            "a",
            10,
        )
        .unwrap();
        assert_eq!(t.ids(), vec!["a", "b"]);
    }

    #[test]
    fn test_depth_cut_from_arena() {
        let t = tree(
            vec![
                record("a", GenerationLevel::GO, None),
                record("b", GenerationLevel::G1, Some("a")),
                record("c", GenerationLevel::G2, Some("b")),
            ],
            "a",
            2,
        )
        .unwrap();
        assert_eq!(t.ids(), vec!["a", "b"]);
    }

    #[test]
    fn test_multiplier_omitted_from_json_when_absent() {
        let t = tree(vec![record("a", GenerationLevel::GO, None)], "a", 10).unwrap();
        let json = serde_json::to_value(&t).unwrap();
        assert!(json.get("multiplier").is_none());
        assert_eq!(json["children"], serde_json::json!([]));
    }
}
