use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::GenealogyEngine;
use crate::error::Result;
use crate::level::GenerationLevel;
use crate::store::LotStore;

/// Aggregate figures for one lot's lineage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenealogyStats {
    /// Lot the figures were computed for.
    pub lot_id: String,
    /// Lots above this one, not counting itself.
    pub total_ancestors: usize,
    /// Lots transitively produced from this one.
    pub total_descendants: usize,
    /// Direct children.
    pub direct_children: usize,
    /// Distance to the foundation lot (same as `total_ancestors`).
    pub tree_depth: usize,
    /// Width of the first descendant level (same as `direct_children`).
    pub tree_breadth: usize,
    /// Descendants per generation level.
    pub levels_distribution: BTreeMap<GenerationLevel, usize>,
    /// Sum of descendant quantities in kilograms.
    pub total_quantity: f64,
    /// Multipliers found in the ancestor chain (this lot included) and
    /// among the descendants, sorted and de-duplicated.
    pub multipliers: BTreeSet<String>,
}

impl<S: LotStore + ?Sized> GenealogyEngine<S> {
    /// Lineage statistics for `lot_id`.
    ///
    /// # Errors
    ///
    /// [`SeedError::LotNotFound`](crate::SeedError::LotNotFound) when the lot
    /// does not exist.
    pub fn get_genealogy_stats(&self, lot_id: &str) -> Result<GenealogyStats> {
        let relations = self.get_direct_relations(lot_id)?;
        let ancestors = self.ancestor_records(lot_id)?;
        let descendants = self.descendant_records(lot_id)?;

        let mut levels_distribution = BTreeMap::new();
        for lot in &descendants {
            *levels_distribution.entry(lot.level).or_insert(0) += 1;
        }

        let multipliers = ancestors
            .iter()
            .chain(descendants.iter())
            .filter_map(|lot| lot.multiplier.clone())
            .collect();

        let total_ancestors = ancestors.len().saturating_sub(1);
        let direct_children = relations.children.len();

        debug!(
            lot = %lot_id,
            ancestors = total_ancestors,
            descendants = descendants.len(),
            "Computed genealogy stats"
        );

        Ok(GenealogyStats {
            lot_id: lot_id.to_string(),
            total_ancestors,
            total_descendants: descendants.len(),
            direct_children,
            tree_depth: total_ancestors,
            tree_breadth: direct_children,
            levels_distribution,
            total_quantity: descendants.iter().map(|lot| lot.quantity).sum(),
            multipliers,
        })
    }
}
