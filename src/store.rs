//! Lot storage.
//!
//! The genealogy engine reads and writes lots only through the [`LotStore`]
//! trait. [`MemoryLotStore`] is the bundled implementation: an in-memory map
//! behind a `parking_lot::RwLock`, optionally backed by a JSON file that is
//! rewritten atomically on [`MemoryLotStore::save`].
//!
//! # Example
//!
//! ```
//! use seedtrace::{GenerationLevel, LotStore, MemoryLotStore, NewLot};
//!
//! let store = MemoryLotStore::in_memory();
//! let root = store.create_lot(NewLot::new(GenerationLevel::GO, "Sahel 108", 100.0))?;
//! let child = store.create_lot(
//!     NewLot::new(GenerationLevel::G1, "Sahel 108", 40.0).parent(root.id.clone()),
//! )?;
//!
//! // Creating a child draws its quantity from the parent.
//! assert_eq!(store.find_lot(&root.id)?.unwrap().quantity, 60.0);
//! assert_eq!(store.find_children(&root.id)?[0].id, child.id);
//! # Ok::<(), seedtrace::SeedError>(())
//! ```

use crate::error::{Result, SeedError};
use crate::level::GenerationLevel;
use crate::lot::{validate_quantity, LotId, LotPatch, LotRecord, NewLot};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, instrument, warn};

/// Current on-disk format version.
pub const STORE_FORMAT_VERSION: u32 = 1;

/// Storage collaborator used by the genealogy engine.
pub trait LotStore: Send + Sync {
    /// Look up a lot by id.
    fn find_lot(&self, id: &str) -> Result<Option<LotRecord>>;

    /// Direct children of `parent_id`, in store order.
    fn find_children(&self, parent_id: &str) -> Result<Vec<LotRecord>>;

    /// Direct children of every id in `parent_ids`, grouped by parent in the
    /// order given. Stores that can batch lookups should override this; the
    /// default issues one `find_children` call per parent.
    fn find_children_of_many(&self, parent_ids: &[String]) -> Result<Vec<LotRecord>> {
        let mut out = Vec::new();
        for id in parent_ids {
            out.extend(self.find_children(id)?);
        }
        Ok(out)
    }

    /// Apply a patch to one lot and return the updated record.
    fn update_lot(&self, id: &str, patch: &LotPatch) -> Result<LotRecord>;

    /// Apply several patches atomically: either every patch is applied or
    /// none is. Returns the updated records in input order.
    ///
    /// Implementations must evaluate [`LotPatch::check`] and apply the `draw`
    /// field against the record as stored at write time, inside
    /// the same critical section as the write.
    fn update_lots(&self, updates: &[(String, LotPatch)]) -> Result<Vec<LotRecord>>;
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the store file
    pub path: PathBuf,
    /// Whether to create if not exists
    pub create_if_missing: bool,
    /// Read-only mode
    pub read_only: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("lots.json"),
            create_if_missing: true,
            read_only: false,
        }
    }
}

impl StoreConfig {
    /// Create a new config with the given path
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Refuse to create the file when it is missing.
    #[must_use]
    pub fn must_exist(mut self) -> Self {
        self.create_if_missing = false;
        self
    }

    /// Open without write access.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

/// Serialized store document.
#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    lots: Vec<LotRecord>,
}

#[derive(Debug, Default)]
struct StoreState {
    lots: BTreeMap<String, LotRecord>,
    /// parent id -> child ids
    children: HashMap<String, BTreeSet<String>>,
}

impl StoreState {
    fn from_lots(lots: Vec<LotRecord>) -> Result<Self> {
        let mut state = Self::default();
        for lot in lots {
            if state.lots.contains_key(&lot.id) {
                return Err(SeedError::Corruption(format!(
                    "duplicate lot id '{}'",
                    lot.id
                )));
            }
            state.insert(lot);
        }
        Ok(state)
    }

    fn insert(&mut self, lot: LotRecord) {
        if let Some(parent) = &lot.parent_lot_id {
            self.children
                .entry(parent.clone())
                .or_default()
                .insert(lot.id.clone());
        }
        self.lots.insert(lot.id.clone(), lot);
    }

    fn replace(&mut self, updated: LotRecord) {
        let previous_parent = self
            .lots
            .get(&updated.id)
            .and_then(|lot| lot.parent_lot_id.clone());

        if previous_parent != updated.parent_lot_id {
            if let Some(old) = &previous_parent {
                if let Some(set) = self.children.get_mut(old) {
                    set.remove(&updated.id);
                    if set.is_empty() {
                        self.children.remove(old);
                    }
                }
            }
        }
        self.insert(updated);
    }

    fn children_of(&self, parent_id: &str) -> Vec<LotRecord> {
        self.children
            .get(parent_id)
            .map(|ids| ids.iter().filter_map(|id| self.lots.get(id)).cloned().collect())
            .unwrap_or_default()
    }

    fn next_sequence(&self, level: GenerationLevel, year: u16) -> u32 {
        self.lots
            .keys()
            .filter_map(|id| id.parse::<LotId>().ok())
            .filter(|id| id.level == level && id.year == year)
            .map(|id| id.sequence)
            .max()
            .unwrap_or(0)
            + 1
    }

    fn patched(&self, id: &str, patch: &LotPatch) -> Result<LotRecord> {
        let mut lot = self
            .lots
            .get(id)
            .cloned()
            .ok_or_else(|| SeedError::LotNotFound(id.to_string()))?;
        patch.check(&lot)?;
        lot.apply(patch);
        validate_quantity(lot.quantity)?;
        Ok(lot)
    }
}

/// In-memory lot store with optional JSON file persistence.
///
/// Changes are held in memory until [`save`](Self::save) is called. Saving
/// writes to a temporary file next to the target and renames it into place,
/// so a crash never leaves a half-written store behind.
pub struct MemoryLotStore {
    config: StoreConfig,
    file_backed: bool,
    state: RwLock<StoreState>,
    dirty: AtomicBool,
}

impl MemoryLotStore {
    /// Create an empty store that is never persisted.
    pub fn in_memory() -> Self {
        Self {
            config: StoreConfig::default(),
            file_backed: false,
            state: RwLock::new(StoreState::default()),
            dirty: AtomicBool::new(false),
        }
    }

    /// Build an in-memory store pre-populated with `lots`.
    pub fn from_lots(lots: Vec<LotRecord>) -> Result<Self> {
        let store = Self::in_memory();
        *store.state.write() = StoreState::from_lots(lots)?;
        Ok(store)
    }

    /// Open or create a file-backed store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(StoreConfig::new(path.as_ref()))
    }

    /// Open a file-backed store with explicit configuration.
    ///
    /// # Errors
    ///
    /// - [`SeedError::Io`] (`NotFound`) when the file is missing and
    ///   `create_if_missing` is false
    /// - [`SeedError::Corruption`] when the file is not a valid store document
    #[instrument(skip(config), fields(path = ?config.path))]
    pub fn open_with_config(config: StoreConfig) -> Result<Self> {
        let exists = config.path.exists();
        info!(exists, "Opening lot store");

        if !exists && !config.create_if_missing {
            warn!("Store not found and create_if_missing is false");
            return Err(SeedError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("store not found: {}", config.path.display()),
            )));
        }

        let state = if exists {
            let file = File::open(&config.path)?;
            let doc: StoreFile = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
                warn!(error = %e, "Failed to deserialize lot store");
                SeedError::Corruption(format!("failed to parse store: {}", e))
            })?;
            if doc.version > STORE_FORMAT_VERSION {
                return Err(SeedError::Corruption(format!(
                    "store format version {} is newer than supported version {}",
                    doc.version, STORE_FORMAT_VERSION
                )));
            }
            StoreState::from_lots(doc.lots)?
        } else {
            StoreState::default()
        };

        info!(lots = state.lots.len(), "Lot store opened");

        Ok(Self {
            config,
            file_backed: true,
            state: RwLock::new(state),
            dirty: AtomicBool::new(!exists),
        })
    }

    /// File path for file-backed stores.
    pub fn path(&self) -> Option<&Path> {
        self.file_backed.then_some(self.config.path.as_path())
    }

    /// Whether there are unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Persist the store. A no-op for in-memory stores.
    #[instrument(skip(self))]
    pub fn save(&self) -> Result<()> {
        if !self.file_backed {
            debug!("In-memory store, skipping save");
            return Ok(());
        }
        self.ensure_writable()?;

        let state = self.state.read();
        let doc = StoreFile {
            version: STORE_FORMAT_VERSION,
            lots: state.lots.values().cloned().collect(),
        };

        let temp_path = self.config.path.with_extension("tmp");
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &doc)?;
            std::io::Write::flush(&mut writer)?;
        }
        fs::rename(&temp_path, &self.config.path)?;

        self.dirty.store(false, Ordering::Release);
        info!(lots = doc.lots.len(), "Lot store saved");
        Ok(())
    }

    /// Number of lots, active or not.
    pub fn len(&self) -> usize {
        self.state.read().lots.len()
    }

    /// Whether the store holds no lots.
    pub fn is_empty(&self) -> bool {
        self.state.read().lots.is_empty()
    }

    /// All lots ordered by id.
    pub fn all_lots(&self) -> Vec<LotRecord> {
        self.state.read().lots.values().cloned().collect()
    }

    /// Next free id for `level` in `year`.
    pub fn next_id(&self, level: GenerationLevel, year: u16) -> String {
        let seq = self.state.read().next_sequence(level, year);
        LotId::new(level, year, seq).to_string()
    }

    /// Insert a record as-is (imports, fixtures). Relations are not validated.
    pub fn insert_lot(&self, lot: LotRecord) -> Result<()> {
        self.ensure_writable()?;
        validate_quantity(lot.quantity)?;
        let mut state = self.state.write();
        if state.lots.contains_key(&lot.id) {
            return Err(SeedError::LotAlreadyExists(lot.id));
        }
        debug!(lot = %lot.id, "Inserting lot");
        state.insert(lot);
        self.mark_modified();
        Ok(())
    }

    /// Create a lot, drawing its quantity from the parent when one is given.
    ///
    /// Validation and both writes happen under a single write lock, so the
    /// parent decrement and the child insert are applied together or not at all.
    ///
    /// # Errors
    ///
    /// - [`SeedError::InvalidQuantity`] for negative quantities or when the
    ///   parent holds less than the requested quantity
    /// - [`SeedError::LotNotFound`] when the parent does not exist
    /// - [`SeedError::InvalidHierarchy`] when the parent level does not precede
    ///   the new lot's level
    /// - [`SeedError::InvalidLotId`] / [`SeedError::LotAlreadyExists`] for a bad
    ///   explicit id
    #[instrument(skip(self, new_lot), fields(level = %new_lot.level, variety = %new_lot.variety))]
    pub fn create_lot(&self, new_lot: NewLot) -> Result<LotRecord> {
        self.ensure_writable()?;
        validate_quantity(new_lot.quantity)?;

        let mut state = self.state.write();

        let id = match &new_lot.id {
            Some(id) => {
                id.parse::<LotId>()?;
                if state.lots.contains_key(id) {
                    return Err(SeedError::LotAlreadyExists(id.clone()));
                }
                id.clone()
            }
            None => {
                let year = new_lot.year();
                let seq = state.next_sequence(new_lot.level, year);
                LotId::new(new_lot.level, year, seq).to_string()
            }
        };

        let parent_update = match &new_lot.parent_lot_id {
            Some(parent_id) => {
                let parent = state
                    .lots
                    .get(parent_id)
                    .ok_or_else(|| SeedError::LotNotFound(parent_id.clone()))?;
                if !parent.level.precedes(new_lot.level) {
                    return Err(SeedError::InvalidHierarchy {
                        parent: parent.id.clone(),
                        parent_level: parent.level,
                        child: id,
                        child_level: new_lot.level,
                    });
                }
                if parent.quantity < new_lot.quantity {
                    return Err(SeedError::InvalidQuantity(format!(
                        "parent '{}' holds {} kg, {} kg requested",
                        parent.id, parent.quantity, new_lot.quantity
                    )));
                }
                let mut parent = parent.clone();
                parent.quantity -= new_lot.quantity;
                Some(parent)
            }
            None => None,
        };

        let record = new_lot.into_record(id);
        if let Some(parent) = parent_update {
            debug!(parent = %parent.id, remaining = parent.quantity, "Drawing quantity from parent");
            state.replace(parent);
        }
        state.insert(record.clone());
        self.mark_modified();

        info!(lot = %record.id, "Lot created");
        Ok(record)
    }

    /// Soft-deactivate a lot. The record stays in the store and keeps its
    /// place in every genealogy.
    pub fn deactivate_lot(&self, id: &str) -> Result<LotRecord> {
        self.update_lot(id, &LotPatch::new().active(false))
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.file_backed && self.config.read_only {
            return Err(SeedError::ReadOnly(self.config.path.display().to_string()));
        }
        Ok(())
    }

    fn mark_modified(&self) {
        self.dirty.store(true, Ordering::Release);
    }
}

impl LotStore for MemoryLotStore {
    fn find_lot(&self, id: &str) -> Result<Option<LotRecord>> {
        Ok(self.state.read().lots.get(id).cloned())
    }

    fn find_children(&self, parent_id: &str) -> Result<Vec<LotRecord>> {
        Ok(self.state.read().children_of(parent_id))
    }

    fn find_children_of_many(&self, parent_ids: &[String]) -> Result<Vec<LotRecord>> {
        let state = self.state.read();
        Ok(parent_ids
            .iter()
            .flat_map(|id| state.children_of(id))
            .collect())
    }

    fn update_lot(&self, id: &str, patch: &LotPatch) -> Result<LotRecord> {
        self.ensure_writable()?;
        let mut state = self.state.write();
        let updated = state.patched(id, patch)?;
        debug!(lot = %id, "Updating lot");
        state.replace(updated.clone());
        self.mark_modified();
        Ok(updated)
    }

    fn update_lots(&self, updates: &[(String, LotPatch)]) -> Result<Vec<LotRecord>> {
        self.ensure_writable()?;
        let mut state = self.state.write();

        // Patches are applied to a scratch copy first so that later patches
        // see earlier ones and a failure leaves the store untouched.
        let mut staged: BTreeMap<String, LotRecord> = BTreeMap::new();
        let mut order = Vec::with_capacity(updates.len());
        for (id, patch) in updates {
            let mut lot = match staged.get(id) {
                Some(lot) => lot.clone(),
                None => state
                    .lots
                    .get(id)
                    .cloned()
                    .ok_or_else(|| SeedError::LotNotFound(id.clone()))?,
            };
            patch.check(&lot)?;
            lot.apply(patch);
            validate_quantity(lot.quantity)?;
            staged.insert(id.clone(), lot);
            order.push(id.clone());
        }

        for lot in staged.values() {
            state.replace(lot.clone());
        }
        self.mark_modified();
        debug!(count = updates.len(), "Applied batched lot update");

        Ok(order
            .iter()
            .filter_map(|id| staged.get(id).cloned())
            .collect())
    }
}
