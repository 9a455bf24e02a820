use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, SeedError};

/// Default depth limit for genealogy trees.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Configuration for a [`GenealogyEngine`](super::GenealogyEngine).
///
/// # Example
///
/// ```
/// use seedtrace::GenealogyConfig;
///
/// let config = GenealogyConfig::default()
///     .with_max_depth(6)
///     .with_lock_timeout_ms(250);
/// assert!(config.validate().is_ok());
///
/// let parsed = GenealogyConfig::from_json(r#"{"max_depth": 4}"#)?;
/// assert_eq!(parsed.max_depth, 4);
/// assert!(parsed.check_cycles_on_reparent);
/// # Ok::<(), seedtrace::SeedError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenealogyConfig {
    /// Depth limit used by [`get_tree`](super::GenealogyEngine::get_tree).
    /// The root is depth 0; nodes at depth `max_depth` and below are cut off.
    pub max_depth: usize,
    /// Run the ancestor-chain cycle check when re-parenting a lot, as
    /// `create_relation` always does.
    pub check_cycles_on_reparent: bool,
    /// How long a relation edit waits for other edits on the same lots.
    pub lock_timeout_ms: u64,
}

impl Default for GenealogyConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            check_cycles_on_reparent: true,
            lock_timeout_ms: 5_000,
        }
    }
}

impl GenealogyConfig {
    /// Parse and validate a JSON configuration document. Missing fields take
    /// their default values.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the default tree depth limit.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Enable or disable the cycle check on re-parenting.
    #[must_use]
    pub fn with_reparent_cycle_check(mut self, enabled: bool) -> Self {
        self.check_cycles_on_reparent = enabled;
        self
    }

    /// Set the lock wait timeout in milliseconds.
    #[must_use]
    pub fn with_lock_timeout_ms(mut self, ms: u64) -> Self {
        self.lock_timeout_ms = ms;
        self
    }

    /// Lock wait timeout as a [`Duration`].
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Check configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(SeedError::InvalidConfig(
                "max_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
