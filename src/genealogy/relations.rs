use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::GenealogyEngine;
use crate::error::{Result, SeedError};
use crate::lot::{LotPatch, LotRecord};
use crate::store::LotStore;

/// Options for [`GenealogyEngine::create_relation`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationOptions {
    /// Kilograms drawn from the parent. Ignored unless positive.
    pub quantity: Option<f64>,
    /// Appended to the child's notes.
    pub notes: Option<String>,
}

impl RelationOptions {
    /// Empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw `quantity` kilograms from the parent.
    #[must_use]
    pub fn quantity(mut self, quantity: f64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    /// Append `notes` to the child's notes.
    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Options for [`GenealogyEngine::update_relation`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateRelationOptions {
    /// New parent. `None` keeps the current parent.
    pub new_parent_id: Option<String>,
    /// Replaces the child's notes.
    pub notes: Option<String>,
}

impl UpdateRelationOptions {
    /// Re-parent under `parent_id`.
    pub fn reparent(parent_id: impl Into<String>) -> Self {
        Self {
            new_parent_id: Some(parent_id.into()),
            notes: None,
        }
    }

    /// Overwrite the child's notes.
    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

fn append_notes(existing: Option<&str>, extra: &str) -> String {
    match existing {
        Some(existing) if !existing.is_empty() => format!("{}\n{}", existing, extra),
        _ => extra.to_string(),
    }
}

impl<S: LotStore + ?Sized> GenealogyEngine<S> {
    /// Link `child_id` under `parent_id`.
    ///
    /// Checks run in order and the first failure is returned:
    ///
    /// 1. [`SeedError::LotNotFound`] if either lot is missing
    /// 2. [`SeedError::AlreadyHasParent`] if the child is already linked
    /// 3. [`SeedError::InvalidHierarchy`] unless the parent level precedes
    ///    the child level
    /// 4. [`SeedError::CycleDetected`] if the child is an ancestor of the parent
    ///
    /// A positive `quantity` is drawn from the parent in the same atomic store
    /// update that links the child. The draw is relative to the parent's
    /// quantity at write time, and the link only lands if the child is still
    /// unlinked then, so writers outside this engine cannot be overwritten.
    /// The engine does not compare the draw with the parent's stock; a store
    /// that refuses negative quantities fails the whole edit.
    #[instrument(skip(self, options))]
    pub fn create_relation(
        &self,
        parent_id: &str,
        child_id: &str,
        options: RelationOptions,
    ) -> Result<LotRecord> {
        let _guard = self
            .locks()
            .acquire([parent_id, child_id], self.config().lock_timeout())?;

        let parent = self.require_lot(parent_id)?;
        let child = self.require_lot(child_id)?;

        if let Some(existing) = &child.parent_lot_id {
            return Err(SeedError::AlreadyHasParent {
                child: child.id,
                parent: existing.clone(),
            });
        }
        self.check_hierarchy(&parent, &child)?;
        self.check_no_cycle(&parent, &child)?;

        let mut child_patch = LotPatch::new()
            .expect_parent(None)
            .parent(Some(parent.id.clone()));
        if let Some(notes) = &options.notes {
            child_patch = child_patch.notes(Some(append_notes(child.notes.as_deref(), notes)));
        }

        let mut updates = Vec::with_capacity(2);
        if let Some(quantity) = options.quantity.filter(|q| *q > 0.0) {
            debug!(quantity, available = parent.quantity, "Drawing quantity from parent");
            updates.push((parent.id.clone(), LotPatch::new().draw(quantity)));
        }
        updates.push((child.id.clone(), child_patch));

        let mut updated = self.store().update_lots(&updates)?;
        let linked = updated
            .pop()
            .ok_or_else(|| SeedError::InvalidOperation("store returned no records".into()))?;

        info!(quantity = ?options.quantity, "Relation created");
        Ok(linked)
    }

    /// Detach `child_id` from its parent. Quantity drawn from the parent when
    /// the link was created is not returned.
    ///
    /// # Errors
    ///
    /// [`SeedError::LotNotFound`] or [`SeedError::NoParentRelation`].
    #[instrument(skip(self))]
    pub fn remove_relation(&self, child_id: &str) -> Result<LotRecord> {
        let _guard = self
            .locks()
            .acquire([child_id], self.config().lock_timeout())?;

        let child = self.require_lot(child_id)?;
        let Some(former) = child.parent_lot_id else {
            return Err(SeedError::NoParentRelation(child.id));
        };

        let updated = self
            .store()
            .update_lot(
                child_id,
                &LotPatch::new().expect_parent(Some(former.clone())).parent(None),
            )?;
        info!(former_parent = %former, "Relation removed");
        Ok(updated)
    }

    /// Re-parent `child_id` and/or overwrite its notes.
    ///
    /// The new parent must exist and its level must precede the child's.
    /// When [`check_cycles_on_reparent`](super::GenealogyConfig::check_cycles_on_reparent)
    /// is set, the same ancestor-chain check as
    /// [`create_relation`](Self::create_relation) runs against the new parent.
    /// Quantities are left untouched.
    #[instrument(skip(self, options), fields(new_parent = ?options.new_parent_id))]
    pub fn update_relation(
        &self,
        child_id: &str,
        options: UpdateRelationOptions,
    ) -> Result<LotRecord> {
        let mut ids = vec![child_id.to_string()];
        ids.extend(options.new_parent_id.iter().cloned());
        let _guard = self.locks().acquire(ids, self.config().lock_timeout())?;

        let child = self.require_lot(child_id)?;
        let mut patch = LotPatch::new();

        if let Some(new_parent_id) = &options.new_parent_id {
            let parent = self.require_lot(new_parent_id)?;
            self.check_hierarchy(&parent, &child)?;
            if self.config().check_cycles_on_reparent {
                self.check_no_cycle(&parent, &child)?;
            } else {
                debug!("Cycle check on re-parenting disabled");
            }
            patch = patch.parent(Some(parent.id));
        }
        if let Some(notes) = options.notes {
            patch = patch.notes(Some(notes));
        }

        if patch.is_empty() {
            warn!("Relation update with nothing to change");
            return Ok(child);
        }
        let patch = patch.expect_parent(child.parent_lot_id.clone());

        let updated = self.store().update_lot(child_id, &patch)?;
        info!(
            old_parent = ?child.parent_lot_id,
            parent = ?updated.parent_lot_id,
            "Relation updated"
        );
        Ok(updated)
    }

    fn check_hierarchy(&self, parent: &LotRecord, child: &LotRecord) -> Result<()> {
        if parent.level.precedes(child.level) {
            return Ok(());
        }
        Err(SeedError::InvalidHierarchy {
            parent: parent.id.clone(),
            parent_level: parent.level,
            child: child.id.clone(),
            child_level: child.level,
        })
    }

    fn check_no_cycle(&self, parent: &LotRecord, child: &LotRecord) -> Result<()> {
        let chain = self.ancestor_records(&parent.id)?;
        if chain.iter().any(|lot| lot.id == child.id) {
            warn!(parent = %parent.id, child = %child.id, "Relation would close a cycle");
            return Err(SeedError::CycleDetected {
                parent: parent.id.clone(),
                child: child.id.clone(),
            });
        }
        Ok(())
    }
}
