//! # seedtrace - Seed-lot genealogy engine
//!
//! seedtrace tracks seed lots through their generation levels, from the
//! foundation lot (GO) through certified generations (G1-G4) down to
//! commercial reproductions (R1, R2). Each lot records at most one parent,
//! and the engine materializes lineage views on top of those links.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use seedtrace::{
//!     ExportFormat, GenealogyEngine, GenerationLevel, MemoryLotStore, NewLot, RelationOptions,
//! };
//!
//! fn main() -> seedtrace::Result<()> {
//!     let store = Arc::new(MemoryLotStore::in_memory());
//!
//!     // Foundation lot and one G1 multiplication drawn from it
//!     let go = store.create_lot(NewLot::new(GenerationLevel::GO, "Sahel 108", 100.0))?;
//!     let g1 = store.create_lot(NewLot::new(GenerationLevel::G1, "Sahel 108", 40.0))?;
//!
//!     let engine = GenealogyEngine::new(store);
//!     engine.create_relation(&go.id, &g1.id, RelationOptions::new().quantity(40.0))?;
//!
//!     let tree = engine.get_tree(&go.id)?.expect("lot exists");
//!     assert_eq!(tree.children.len(), 1);
//!
//!     let report = engine.check_genealogy_consistency(&go.id)?;
//!     assert!(report.is_consistent);
//!
//!     let dot = engine.export_genealogy(&go.id, ExportFormat::Dot)?;
//!     assert!(dot.starts_with("digraph"));
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Lineage views**: descendant trees with depth limits, ancestor chains,
//!   flat descendant lists and direct relations
//! - **Relation edits**: link, unlink and re-parent lots with hierarchy and
//!   cycle checks, serialized per lot
//! - **Consistency checks**: cycles, level ordering and quantity conservation
//!   reported as typed issues
//! - **Export**: JSON, CSV and Graphviz DOT
//!
//! ## Persistence
//!
//! ```rust,no_run
//! use seedtrace::{GenerationLevel, MemoryLotStore, NewLot};
//!
//! fn main() -> seedtrace::Result<()> {
//!     let store = MemoryLotStore::open("lots.json")?;
//!     store.create_lot(NewLot::new(GenerationLevel::GO, "Sahel 108", 100.0))?;
//!
//!     // Changes stay in memory until saved
//!     store.save()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod genealogy;
pub mod level;
pub mod locks;
pub mod lot;
pub mod store;

pub use error::{ErrorCode, Recoverable, RecoveryHint, Result, SeedError};
pub use genealogy::{
    ConsistencyIssue, ConsistencyReport, ConsistencyWarning, DirectRelations, ExportFormat,
    GenealogyConfig, GenealogyEngine, GenealogyStats, RelationOptions, TreeNode,
    UpdateRelationOptions, DEFAULT_MAX_DEPTH,
};
pub use level::GenerationLevel;
pub use locks::{LotGuard, LotLocks};
pub use lot::{LotId, LotPatch, LotRecord, LotStatus, LotSummary, NewLot};
pub use store::{LotStore, MemoryLotStore, StoreConfig, STORE_FORMAT_VERSION};

/// Prelude module for convenient imports.
///
/// ```rust
/// use seedtrace::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Result, SeedError};
    pub use crate::genealogy::{
        ExportFormat, GenealogyConfig, GenealogyEngine, RelationOptions, TreeNode,
        UpdateRelationOptions,
    };
    pub use crate::level::GenerationLevel;
    pub use crate::lot::{LotRecord, LotSummary, NewLot};
    pub use crate::store::{LotStore, MemoryLotStore};
}
