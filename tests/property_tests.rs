//! Property-based tests for lot ids and genealogy traversal

use chrono::NaiveDate;
use proptest::prelude::*;
use seedtrace::{
    ExportFormat, GenealogyEngine, GenerationLevel, LotId, LotRecord, LotStore, MemoryLotStore,
    NewLot, RelationOptions, SeedError, TreeNode,
};
use std::collections::BTreeSet;
use std::sync::Arc;

fn arb_level() -> impl Strategy<Value = GenerationLevel> {
    prop::sample::select(GenerationLevel::ALL.to_vec())
}

/// A random forest: each entry names an optional earlier lot as parent, and
/// the level is one step below the parent's (or random for roots).
fn arb_forest() -> impl Strategy<Value = Vec<(Option<usize>, u8)>> {
    prop::collection::vec((any::<prop::sample::Index>(), any::<bool>(), 0u8..7), 1..40)
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, (idx, attach, level))| {
                    let parent = (i > 0 && attach).then(|| idx.index(i));
                    (parent, level)
                })
                .collect()
        })
}

fn build(forest: &[(Option<usize>, u8)]) -> (Arc<MemoryLotStore>, Vec<LotRecord>) {
    let store = Arc::new(MemoryLotStore::in_memory());
    let mut lots: Vec<LotRecord> = Vec::new();

    for (i, (parent, level)) in forest.iter().enumerate() {
        let parent_lot = parent.and_then(|p| lots.get(p)).filter(|p| p.level.next().is_some());
        let level = match parent_lot {
            Some(p) => p.level.next().unwrap_or(p.level),
            None => GenerationLevel::ALL[*level as usize],
        };
        let mut record = NewLot::new(level, "Sahel 108", 100.0)
            .produced_on(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .into_record(format!("L{:03}", i));
        record.parent_lot_id = parent_lot.map(|p| p.id.clone());
        store.insert_lot(record.clone()).unwrap();
        lots.push(record);
    }
    (store, lots)
}

fn edge_set(tree: &TreeNode) -> BTreeSet<(String, String)> {
    tree.edges()
        .into_iter()
        .map(|(p, c)| (p.id.clone(), c.id.clone()))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: formatting and parsing a lot id are inverse
    #[test]
    fn prop_lot_id_roundtrip(level in arb_level(), year in 1000u16..=9999, seq in 1u32..100_000) {
        let id = LotId::new(level, year, seq);
        let parsed: LotId = id.to_string().parse().unwrap();
        prop_assert_eq!(parsed, id);
    }

    /// Property: arbitrary strings never panic the id parser
    #[test]
    fn prop_lot_id_parse_never_panics(s in ".{0,32}") {
        match s.parse::<LotId>() {
            Ok(id) => prop_assert!(s.starts_with("SL-") && id.to_string().len() >= 14),
            Err(e) => prop_assert!(matches!(e, SeedError::InvalidLotId(_))),
        }
    }

    /// Property: ancestors start at a root and end with the lot itself
    #[test]
    fn prop_ancestor_chain_shape(forest in arb_forest()) {
        let (store, lots) = build(&forest);
        let engine = GenealogyEngine::new(store);

        for lot in &lots {
            let chain = engine.get_ancestors(&lot.id).unwrap();
            prop_assert_eq!(&chain.last().unwrap().id, &lot.id);
            prop_assert!(chain[0].parent_lot_id.is_none());
            for pair in chain.windows(2) {
                prop_assert_eq!(pair[1].parent_lot_id.as_deref(), Some(pair[0].id.as_str()));
                prop_assert!(pair[0].level.precedes(pair[1].level));
            }
        }
    }

    /// Property: descendants never include the root and agree with the tree
    #[test]
    fn prop_descendants_match_unbounded_tree(forest in arb_forest()) {
        let (store, lots) = build(&forest);
        let engine = GenealogyEngine::new(store);

        for lot in &lots {
            let descendants: BTreeSet<_> = engine
                .get_descendants(&lot.id)
                .unwrap()
                .into_iter()
                .map(|d| d.id)
                .collect();
            prop_assert!(!descendants.contains(&lot.id));

            let tree = engine.get_genealogy_tree(&lot.id, usize::MAX).unwrap().unwrap();
            let in_tree: BTreeSet<_> = tree
                .ids()
                .into_iter()
                .filter(|id| *id != lot.id)
                .map(str::to_string)
                .collect();
            prop_assert_eq!(descendants, in_tree);
        }
    }

    /// Property: no tree node sits deeper than the requested limit
    #[test]
    fn prop_tree_respects_depth(forest in arb_forest(), depth in 1usize..8) {
        let (store, lots) = build(&forest);
        let engine = GenealogyEngine::new(store);

        for lot in &lots {
            let tree = engine.get_genealogy_tree(&lot.id, depth).unwrap().unwrap();
            prop_assert!(tree.height() < depth);
        }
    }

    /// Property: JSON export parses back to the same ids and edges
    #[test]
    fn prop_json_export_preserves_structure(forest in arb_forest()) {
        let (store, lots) = build(&forest);
        let engine = GenealogyEngine::new(store);
        let root = &lots[0].id;

        let json = engine.export_genealogy(root, ExportFormat::Json).unwrap();
        let parsed: TreeNode = serde_json::from_str(&json).unwrap();
        let tree = engine.get_tree(root).unwrap().unwrap();
        prop_assert_eq!(parsed.ids(), tree.ids());
        prop_assert_eq!(edge_set(&parsed), edge_set(&tree));
    }

    /// Property: linking a child to one of its own descendants is refused
    /// and leaves the store unchanged
    #[test]
    fn prop_link_never_creates_cycle(forest in arb_forest()) {
        let (store, lots) = build(&forest);
        let engine = GenealogyEngine::new(Arc::clone(&store));

        for lot in lots.iter().filter(|l| l.parent_lot_id.is_none()) {
            for descendant in engine.get_descendants(&lot.id).unwrap() {
                let result = engine.create_relation(&descendant.id, &lot.id, RelationOptions::new());
                prop_assert!(result.is_err());
                prop_assert!(store.find_lot(&lot.id).unwrap().unwrap().parent_lot_id.is_none());
            }
            let report = engine.check_genealogy_consistency(&lot.id).unwrap();
            let no_cycles = report
                .issues
                .iter()
                .all(|i| !matches!(i, seedtrace::ConsistencyIssue::Cycle { .. }));
            prop_assert!(no_cycles);
        }
    }
}
