//! Seed lot records.
//!
//! A lot is a traceable batch of seed at one generation level. Lots link to
//! at most one parent through `parent_lot_id`; children are implicit (every lot
//! whose `parent_lot_id` names this lot).
//!
//! # Example
//!
//! ```
//! use seedtrace::lot::{LotId, NewLot};
//! use seedtrace::GenerationLevel;
//! use chrono::NaiveDate;
//!
//! let id: LotId = "SL-G1-2024-007".parse()?;
//! assert_eq!(id.level, GenerationLevel::G1);
//!
//! let lot = NewLot::new(GenerationLevel::G1, "Sahel 108", 250.0)
//!     .produced_on(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
//!     .multiplier("Coopérative de Kaolack")
//!     .parent("SL-GO-2023-001");
//! assert_eq!(lot.parent_lot_id.as_deref(), Some("SL-GO-2023-001"));
//! # Ok::<(), seedtrace::SeedError>(())
//! ```

use crate::error::{Result, SeedError};
use crate::level::GenerationLevel;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Parsed form of a lot identifier, `SL-<LEVEL>-<YEAR>-<SEQ>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LotId {
    /// Generation level encoded in the id.
    pub level: GenerationLevel,
    /// Production year.
    pub year: u16,
    /// Sequence number within level and year.
    pub sequence: u32,
}

impl LotId {
    /// Prefix shared by all lot ids.
    pub const PREFIX: &'static str = "SL";

    /// Create an id from its parts.
    pub fn new(level: GenerationLevel, year: u16, sequence: u32) -> Self {
        Self {
            level,
            year,
            sequence,
        }
    }
}

impl fmt::Display for LotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{:04}-{:03}",
            Self::PREFIX,
            self.level,
            self.year,
            self.sequence
        )
    }
}

impl FromStr for LotId {
    type Err = SeedError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || SeedError::InvalidLotId(s.to_string());
        let mut parts = s.split('-');

        let (Some(prefix), Some(level), Some(year), Some(seq), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Err(invalid());
        };

        if prefix != Self::PREFIX {
            return Err(invalid());
        }
        let level = level.parse::<GenerationLevel>().map_err(|_| invalid())?;
        if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if seq.is_empty() || !seq.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let year = year.parse::<u16>().map_err(|_| invalid())?;
        let sequence = seq.parse::<u32>().map_err(|_| invalid())?;

        Ok(Self::new(level, year, sequence))
    }
}

/// Lifecycle status of a lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LotStatus {
    /// In stock, not yet through quality control.
    #[default]
    Active,
    /// Passed quality control.
    Certified,
    /// Failed quality control.
    Rejected,
    /// Handed over to a multiplier or customer.
    Distributed,
    /// No quantity left.
    Depleted,
}

impl LotStatus {
    /// Canonical snake_case name.
    pub fn as_str(self) -> &'static str {
        match self {
            LotStatus::Active => "active",
            LotStatus::Certified => "certified",
            LotStatus::Rejected => "rejected",
            LotStatus::Distributed => "distributed",
            LotStatus::Depleted => "depleted",
        }
    }
}

impl fmt::Display for LotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LotStatus {
    type Err = SeedError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(LotStatus::Active),
            "certified" => Ok(LotStatus::Certified),
            "rejected" => Ok(LotStatus::Rejected),
            "distributed" => Ok(LotStatus::Distributed),
            "depleted" => Ok(LotStatus::Depleted),
            other => Err(SeedError::InvalidOperation(format!(
                "unknown lot status '{}'",
                other
            ))),
        }
    }
}

fn default_true() -> bool {
    true
}

/// A stored seed lot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotRecord {
    /// Lot id, normally `SL-<LEVEL>-<YEAR>-<SEQ>`.
    pub id: String,
    /// Generation level.
    pub level: GenerationLevel,
    /// Variety name.
    pub variety: String,
    /// Quantity in kilograms.
    pub quantity: f64,
    /// Date the lot was harvested or produced.
    pub production_date: NaiveDate,
    /// Lifecycle status.
    #[serde(default)]
    pub status: LotStatus,
    /// Name of the multiplier that produced the lot.
    #[serde(default)]
    pub multiplier: Option<String>,
    /// Parent lot, if any.
    #[serde(default)]
    pub parent_lot_id: Option<String>,
    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Soft-deactivation flag; lots are never hard-deleted.
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl LotRecord {
    /// Apply a patch in place.
    pub fn apply(&mut self, patch: &LotPatch) {
        if let Some(parent) = &patch.parent_lot_id {
            self.parent_lot_id = parent.clone();
        }
        if let Some(quantity) = patch.quantity {
            self.quantity = quantity;
        }
        if let Some(draw) = patch.draw {
            self.quantity -= draw;
        }
        if let Some(notes) = &patch.notes {
            self.notes = notes.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(active) = patch.is_active {
            self.is_active = active;
        }
    }

    /// Non-structural projection of this lot.
    pub fn summary(&self) -> LotSummary {
        LotSummary::from(self)
    }
}

/// Partial update of a lot. `None` leaves a field unchanged; for the nullable
/// fields `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LotPatch {
    /// New parent (`Some(None)` detaches).
    pub parent_lot_id: Option<Option<String>>,
    /// New quantity.
    pub quantity: Option<f64>,
    /// Kilograms subtracted from the stored quantity, after `quantity`.
    #[serde(default)]
    pub draw: Option<f64>,
    /// New notes (`Some(None)` clears).
    pub notes: Option<Option<String>>,
    /// New status.
    pub status: Option<LotStatus>,
    /// New activity flag.
    pub is_active: Option<bool>,
    /// Parent the lot must still have when the patch is applied.
    #[serde(default)]
    pub expected_parent: Option<Option<String>>,
}

impl LotPatch {
    /// Empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the parent.
    pub fn parent(mut self, parent: Option<String>) -> Self {
        self.parent_lot_id = Some(parent);
        self
    }

    /// Set the quantity.
    pub fn quantity(mut self, quantity: f64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    /// Subtract `quantity` from whatever the store holds at write time.
    pub fn draw(mut self, quantity: f64) -> Self {
        self.draw = Some(quantity);
        self
    }

    /// Refuse the patch unless the lot's parent is still `parent`.
    pub fn expect_parent(mut self, parent: Option<String>) -> Self {
        self.expected_parent = Some(parent);
        self
    }

    /// Check preconditions against the record the patch is about to modify.
    ///
    /// # Errors
    ///
    /// [`SeedError::AlreadyHasParent`] when the lot was expected to be a root
    /// but has been linked since; [`SeedError::InvalidOperation`] for any other
    /// parent mismatch.
    pub fn check(&self, lot: &LotRecord) -> Result<()> {
        let Some(expected) = &self.expected_parent else {
            return Ok(());
        };
        if *expected == lot.parent_lot_id {
            return Ok(());
        }
        match (&lot.parent_lot_id, expected) {
            (Some(parent), None) => Err(SeedError::AlreadyHasParent {
                child: lot.id.clone(),
                parent: parent.clone(),
            }),
            (current, _) => Err(SeedError::InvalidOperation(format!(
                "parent of '{}' changed to {:?} while the update was prepared",
                lot.id, current
            ))),
        }
    }

    /// Set the notes.
    pub fn notes(mut self, notes: Option<String>) -> Self {
        self.notes = Some(notes);
        self
    }

    /// Set the status.
    pub fn status(mut self, status: LotStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the activity flag.
    pub fn active(mut self, active: bool) -> Self {
        self.is_active = Some(active);
        self
    }

    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Lot fields relevant to genealogy views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotSummary {
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
    pub multiplier: Option<String>,
    /// Parent lot id.
    pub parent_lot_id: Option<String>,
}

impl From<&LotRecord> for LotSummary {
    fn from(lot: &LotRecord) -> Self {
        Self {
            id: lot.id.clone(),
            level: lot.level,
            variety: lot.variety.clone(),
            quantity: lot.quantity,
            production_date: lot.production_date,
            status: lot.status,
            multiplier: lot.multiplier.clone(),
            parent_lot_id: lot.parent_lot_id.clone(),
        }
    }
}

/// Input to lot creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLot {
    /// Explicit id; generated from level, year and the next sequence when absent.
    pub id: Option<String>,
    /// Generation level.
    pub level: GenerationLevel,
    /// Variety name.
    pub variety: String,
    /// Quantity in kilograms.
    pub quantity: f64,
    /// Production date.
    pub production_date: NaiveDate,
    /// Initial status.
    pub status: LotStatus,
    /// Multiplier name.
    pub multiplier: Option<String>,
    /// Parent lot; its quantity is decremented by `quantity`.
    pub parent_lot_id: Option<String>,
    /// Notes.
    pub notes: Option<String>,
}

impl NewLot {
    /// Start a lot produced today.
    pub fn new(level: GenerationLevel, variety: impl Into<String>, quantity: f64) -> Self {
        Self {
            id: None,
            level,
            variety: variety.into(),
            quantity,
            production_date: chrono::Local::now().date_naive(),
            status: LotStatus::Active,
            multiplier: None,
            parent_lot_id: None,
            notes: None,
        }
    }

    /// Use an explicit id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set production date.
    pub fn produced_on(mut self, date: NaiveDate) -> Self {
        self.production_date = date;
        self
    }

    /// Set status.
    pub fn status(mut self, status: LotStatus) -> Self {
        self.status = status;
        self
    }

    /// Set multiplier.
    pub fn multiplier(mut self, multiplier: impl Into<String>) -> Self {
        self.multiplier = Some(multiplier.into());
        self
    }

    /// Set parent lot.
    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_lot_id = Some(parent.into());
        self
    }

    /// Set notes.
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Production year, as encoded in generated ids.
    pub fn year(&self) -> u16 {
        self.production_date.year().clamp(0, 9999) as u16
    }

    /// Materialize a record under `id`.
    pub fn into_record(self, id: String) -> LotRecord {
        LotRecord {
            id,
            level: self.level,
            variety: self.variety,
            quantity: self.quantity,
            production_date: self.production_date,
            status: self.status,
            multiplier: self.multiplier,
            parent_lot_id: self.parent_lot_id,
            notes: self.notes,
            is_active: true,
        }
    }
}

/// Check that a quantity is a finite, non-negative number of kilograms.
pub fn validate_quantity(quantity: f64) -> Result<()> {
    if !quantity.is_finite() {
        return Err(SeedError::InvalidQuantity(format!(
            "{} is not a finite number",
            quantity
        )));
    }
    if quantity < 0.0 {
        return Err(SeedError::InvalidQuantity(format!(
            "{} kg is negative",
            quantity
        )));
    }
    Ok(())
}
