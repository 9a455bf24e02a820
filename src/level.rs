//! Generation levels of seed multiplication.
//!
//! Levels are ordered by their distance from the foundation seed: `GO` is the
//! origin, `G1`..`G4` are successive multiplication generations and `R1`/`R2`
//! are commercial reproductions. A child lot must sit at a strictly later
//! level than its parent.

use crate::error::{Result, SeedError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Generation level of a seed lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GenerationLevel {
    /// Foundation seed.
    GO,
    /// First multiplication generation.
    G1,
    /// Second multiplication generation.
    G2,
    /// Third multiplication generation.
    G3,
    /// Fourth multiplication generation.
    G4,
    /// First commercial reproduction.
    R1,
    /// Second commercial reproduction.
    R2,
}

impl GenerationLevel {
    /// All levels in generation order.
    pub const ALL: [GenerationLevel; 7] = [
        GenerationLevel::GO,
        GenerationLevel::G1,
        GenerationLevel::G2,
        GenerationLevel::G3,
        GenerationLevel::G4,
        GenerationLevel::R1,
        GenerationLevel::R2,
    ];

    /// Position in the generation order, `GO` = 0 through `R2` = 6.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The level a direct child is normally produced at.
    pub fn next(self) -> Option<GenerationLevel> {
        Self::ALL.get(self.index() + 1).copied()
    }

    /// Whether a lot at this level may be the parent of one at `child`.
    pub fn precedes(self, child: GenerationLevel) -> bool {
        self.index() < child.index()
    }

    /// Number of generations between `self` and `child` (negative when
    /// `child` comes first).
    pub fn distance_to(self, child: GenerationLevel) -> isize {
        child.index() as isize - self.index() as isize
    }

    /// Canonical upper-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationLevel::GO => "GO",
            GenerationLevel::G1 => "G1",
            GenerationLevel::G2 => "G2",
            GenerationLevel::G3 => "G3",
            GenerationLevel::G4 => "G4",
            GenerationLevel::R1 => "R1",
            GenerationLevel::R2 => "R2",
        }
    }
}

impl fmt::Display for GenerationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationLevel {
    type Err = SeedError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            // G0 with a zero is a common misspelling of the foundation level
            "GO" | "G0" => Ok(GenerationLevel::GO),
            "G1" => Ok(GenerationLevel::G1),
            "G2" => Ok(GenerationLevel::G2),
            "G3" => Ok(GenerationLevel::G3),
            "G4" => Ok(GenerationLevel::G4),
            "R1" => Ok(GenerationLevel::R1),
            "R2" => Ok(GenerationLevel::R2),
            _ => Err(SeedError::InvalidLevel(s.to_string())),
        }
    }
}
