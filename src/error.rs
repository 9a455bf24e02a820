//! Error Types and Handling
//!
//! Structured error types for seedtrace with numeric error codes for
//! programmatic handling and recovery hints for people reading CLI output.
//!
//! # Error Categories
//!
//! | Range | Category | Examples |
//! |-------|----------|----------|
//! | 1xxx | I/O errors | Read, Write, Permission |
//! | 2xxx | Serialization | Serialize, Deserialize, Csv |
//! | 3xxx | Lot | NotFound, AlreadyExists, InvalidId |
//! | 4xxx | Genealogy | AlreadyHasParent, InvalidHierarchy, CycleDetected |
//! | 5xxx | Store | Corrupted, ReadOnly |
//! | 7xxx | Configuration | Invalid |
//! | 9xxx | Operational | LockTimeout |
//! | 13xxx | State | InvalidOperation |
//!
//! # Example
//!
//! ```rust
//! use seedtrace::error::{Recoverable, SeedError};
//!
//! let err = SeedError::LotNotFound("SL-G1-2024-001".to_string());
//! assert_eq!(err.error_code().code(), 3001);
//! assert_eq!(err.error_code().category(), "Lot");
//! ```

use crate::level::GenerationLevel;
use thiserror::Error;

/// Error code categories for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Failed to read from disk
    IoRead = 1001,
    /// Failed to write to disk
    IoWrite = 1002,
    /// Insufficient file system permissions
    IoPermission = 1003,

    /// Failed to serialize or deserialize JSON
    SerializationFailed = 2001,
    /// Failed to write CSV output
    CsvFailed = 2002,
    /// Requested export format is not supported
    UnsupportedFormat = 2003,

    /// Referenced lot does not exist
    LotNotFound = 3001,
    /// A lot with this id already exists
    LotAlreadyExists = 3002,
    /// Lot id does not follow the `SL-<LEVEL>-<YEAR>-<SEQ>` format
    InvalidLotId = 3003,
    /// Unknown generation level
    InvalidLevel = 3004,
    /// Quantity is negative, non-finite or insufficient
    InvalidQuantity = 3005,

    /// Child lot already has a parent
    AlreadyHasParent = 4001,
    /// Parent level does not precede child level
    InvalidHierarchy = 4002,
    /// Relation would close a cycle
    CycleDetected = 4003,
    /// Lot has no parent relation to remove
    NoParentRelation = 4004,

    /// Store file is corrupted or unreadable
    StoreCorrupted = 5001,
    /// Store was opened read-only
    StoreReadOnly = 5002,

    /// Configuration value is invalid
    InvalidConfig = 7001,

    /// Lock acquisition timed out
    LockTimeout = 9002,

    /// Operation is not valid in current context
    InvalidOperation = 13001,
}

impl ErrorCode {
    /// Get the numeric error code
    pub fn code(&self) -> u32 {
        *self as u32
    }

    /// Get a brief description of the error category
    pub fn category(&self) -> &'static str {
        match self {
            ErrorCode::IoRead | ErrorCode::IoWrite | ErrorCode::IoPermission => "I/O",
            ErrorCode::SerializationFailed | ErrorCode::CsvFailed | ErrorCode::UnsupportedFormat => {
                "Serialization"
            }
            ErrorCode::LotNotFound
            | ErrorCode::LotAlreadyExists
            | ErrorCode::InvalidLotId
            | ErrorCode::InvalidLevel
            | ErrorCode::InvalidQuantity => "Lot",
            ErrorCode::AlreadyHasParent
            | ErrorCode::InvalidHierarchy
            | ErrorCode::CycleDetected
            | ErrorCode::NoParentRelation => "Genealogy",
            ErrorCode::StoreCorrupted | ErrorCode::StoreReadOnly => "Store",
            ErrorCode::InvalidConfig => "Configuration",
            ErrorCode::LockTimeout => "Operational",
            ErrorCode::InvalidOperation => "State",
        }
    }
}

/// A recovery hint providing actionable guidance for resolving errors
#[derive(Debug, Clone)]
pub struct RecoveryHint {
    /// Short summary of the recovery action
    pub summary: String,
    /// Detailed steps or explanation
    pub details: Option<String>,
}

impl RecoveryHint {
    /// Create a new recovery hint with just a summary
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            details: None,
        }
    }

    /// Add detailed recovery steps
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl std::fmt::Display for RecoveryHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.summary)?;
        if let Some(details) = &self.details {
            write!(f, "\n  Details: {}", details)?;
        }
        Ok(())
    }
}

/// Trait for errors that can provide recovery hints
pub trait Recoverable {
    /// Get the error code for this error
    fn error_code(&self) -> ErrorCode;

    /// Get recovery hints for this error
    fn recovery_hints(&self) -> Vec<RecoveryHint>;

    /// Check if the error is retryable
    fn is_retryable(&self) -> bool;
}

/// Error types for seedtrace operations
#[must_use]
#[derive(Error, Debug)]
pub enum SeedError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Lot '{0}' not found")]
    LotNotFound(String),

    #[error("Lot '{0}' already exists")]
    LotAlreadyExists(String),

    #[error("Invalid lot id '{0}': expected SL-<LEVEL>-<YEAR>-<SEQ>")]
    InvalidLotId(String),

    #[error("Invalid generation level '{0}'")]
    InvalidLevel(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Lot '{child}' already has parent '{parent}'")]
    AlreadyHasParent { child: String, parent: String },

    #[error(
        "Invalid hierarchy: parent '{parent}' ({parent_level}) must precede child '{child}' ({child_level})"
    )]
    InvalidHierarchy {
        parent: String,
        parent_level: GenerationLevel,
        child: String,
        child_level: GenerationLevel,
    },

    #[error("Cycle detected: '{child}' is already an ancestor of '{parent}'")]
    CycleDetected { parent: String, child: String },

    #[error("Lot '{0}' has no parent relation")]
    NoParentRelation(String),

    #[error("Unsupported export format '{0}' (expected json, csv or dot)")]
    UnsupportedFormat(String),

    #[error("Store corruption detected: {0}")]
    Corruption(String),

    #[error("Store is read-only: {0}")]
    ReadOnly(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Lock acquisition for lot '{lot}' timed out after {timeout:?}")]
    LockTimeout {
        lot: String,
        timeout: std::time::Duration,
    },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl Recoverable for SeedError {
    fn error_code(&self) -> ErrorCode {
        match self {
            SeedError::Io(source) => match source.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoRead,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoWrite,
            },
            SeedError::Serialization(_) => ErrorCode::SerializationFailed,
            SeedError::Csv(_) => ErrorCode::CsvFailed,
            SeedError::LotNotFound(_) => ErrorCode::LotNotFound,
            SeedError::LotAlreadyExists(_) => ErrorCode::LotAlreadyExists,
            SeedError::InvalidLotId(_) => ErrorCode::InvalidLotId,
            SeedError::InvalidLevel(_) => ErrorCode::InvalidLevel,
            SeedError::InvalidQuantity(_) => ErrorCode::InvalidQuantity,
            SeedError::AlreadyHasParent { .. } => ErrorCode::AlreadyHasParent,
            SeedError::InvalidHierarchy { .. } => ErrorCode::InvalidHierarchy,
            SeedError::CycleDetected { .. } => ErrorCode::CycleDetected,
            SeedError::NoParentRelation(_) => ErrorCode::NoParentRelation,
            SeedError::UnsupportedFormat(_) => ErrorCode::UnsupportedFormat,
            SeedError::Corruption(_) => ErrorCode::StoreCorrupted,
            SeedError::ReadOnly(_) => ErrorCode::StoreReadOnly,
            SeedError::InvalidConfig(_) => ErrorCode::InvalidConfig,
            SeedError::LockTimeout { .. } => ErrorCode::LockTimeout,
            SeedError::InvalidOperation(_) => ErrorCode::InvalidOperation,
        }
    }

    fn recovery_hints(&self) -> Vec<RecoveryHint> {
        match self {
            SeedError::Io(source) => match source.kind() {
                std::io::ErrorKind::NotFound => vec![
                    RecoveryHint::new("Verify the store file exists")
                        .with_details("Run `seedtrace init <store>` to create an empty store"),
                ],
                std::io::ErrorKind::PermissionDenied => vec![RecoveryHint::new(
                    "Check file permissions",
                )
                .with_details("The process needs read/write access to the store file and its directory")],
                _ => vec![RecoveryHint::new("Check disk health and free space")],
            },

            SeedError::Serialization(_) => vec![
                RecoveryHint::new("Check the JSON document matches the lot schema"),
                RecoveryHint::new("Restore the store from a backup if it was edited by hand"),
            ],

            SeedError::Csv(_) => vec![RecoveryHint::new("Retry the export; CSV writing failed")],

            SeedError::LotNotFound(id) => vec![
                RecoveryHint::new(format!("Check the spelling of lot '{}'", id)),
                RecoveryHint::new("Lot ids look like SL-G1-2024-001"),
            ],

            SeedError::LotAlreadyExists(id) => vec![RecoveryHint::new(format!(
                "Lot '{}' exists; choose another sequence number",
                id
            ))],

            SeedError::InvalidLotId(id) => vec![RecoveryHint::new(format!(
                "Rewrite '{}' as SL-<LEVEL>-<YEAR>-<SEQ>, e.g. SL-G2-2024-014",
                id
            ))],

            SeedError::InvalidLevel(level) => vec![RecoveryHint::new(format!(
                "Replace '{}' with one of GO, G1, G2, G3, G4, R1, R2",
                level
            ))],

            SeedError::InvalidQuantity(reason) => vec![
                RecoveryHint::new(format!("Fix quantity: {}", reason)),
                RecoveryHint::new("Quantities are kilograms and must be finite and non-negative"),
            ],

            SeedError::AlreadyHasParent { child, parent } => vec![
                RecoveryHint::new(format!("Unlink '{}' from '{}' first", child, parent)),
                RecoveryHint::new("Or re-parent it with update_relation"),
            ],

            SeedError::InvalidHierarchy {
                parent_level,
                child_level,
                ..
            } => vec![RecoveryHint::new(format!(
                "A {} lot cannot be the parent of a {} lot",
                parent_level, child_level
            ))
            .with_details("Parent generation must come strictly before the child generation")],

            SeedError::CycleDetected { parent, child } => vec![RecoveryHint::new(format!(
                "'{}' descends from '{}'; pick a parent outside its lineage",
                parent, child
            ))],

            SeedError::NoParentRelation(id) => {
                vec![RecoveryHint::new(format!("Lot '{}' is already a root lot", id))]
            }

            SeedError::UnsupportedFormat(_) => {
                vec![RecoveryHint::new("Use one of: json, csv, dot")]
            }

            SeedError::Corruption(reason) => vec![
                RecoveryHint::new("Restore the store from the most recent backup")
                    .with_details(reason.clone()),
            ],

            SeedError::ReadOnly(_) => vec![RecoveryHint::new(
                "Reopen the store with read_only disabled to modify it",
            )],

            SeedError::InvalidConfig(reason) => vec![
                RecoveryHint::new(format!("Fix configuration: {}", reason)),
                RecoveryHint::new("Start from the default configuration"),
            ],

            SeedError::LockTimeout { lot, .. } => vec![
                RecoveryHint::new(format!("Another relation edit on '{}' is in progress", lot)),
                RecoveryHint::new("Retry after a short delay"),
            ],

            SeedError::InvalidOperation(msg) => {
                vec![RecoveryHint::new(format!("Invalid operation: {}", msg))]
            }
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, SeedError::LockTimeout { .. })
    }
}

impl SeedError {
    /// Get a formatted error message with recovery hints
    pub fn format_with_hints(&self) -> String {
        let hints = self.recovery_hints();
        let mut output = format!("Error [{}]: {}", self.error_code().code(), self);

        if !hints.is_empty() {
            output.push_str("\n\nRecovery suggestions:");
            for (i, hint) in hints.iter().enumerate() {
                output.push_str(&format!("\n  {}. {}", i + 1, hint));
            }
        }

        if self.is_retryable() {
            output.push_str("\n\nThis error is retryable.");
        }

        output
    }
}

/// Result type alias for seedtrace operations
pub type Result<T> = std::result::Result<T, SeedError>;
