//! Standardizer configuration.

use fsd_core::{FsdError, Result};
use serde::{Deserialize, Serialize};

use crate::validation::ValidationThresholds;

/// Default number of passes over the column order.
pub const DEFAULT_MAX_ITERATIONS: usize = 3;

/// Settings of a [`crate::Standardizer`].
///
/// Filters are not part of the configuration; they are passed explicitly to
/// [`crate::Standardizer::process`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StandardizerConfig {
    /// Maximum number of passes over the column order. Passing stops early
    /// once a pass sets no new value.
    pub max_iterations: usize,
    /// Remove duplicate facts before pivoting.
    pub deduplicate: bool,
    /// Apply the rulebook's sign corrections before pivoting.
    pub correct_signs: bool,
    /// Validation error tiers.
    pub thresholds: ValidationThresholds,
}

impl Default for StandardizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            deduplicate: true,
            correct_signs: true,
            thresholds: ValidationThresholds::default(),
        }
    }
}

impl StandardizerConfig {
    /// Sets the maximum number of passes.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Enables or disables pre-pivot de-duplication.
    #[must_use]
    pub const fn with_deduplicate(mut self, deduplicate: bool) -> Self {
        self.deduplicate = deduplicate;
        self
    }

    /// Enables or disables pre-pivot sign correction.
    #[must_use]
    pub const fn with_correct_signs(mut self, correct_signs: bool) -> Self {
        self.correct_signs = correct_signs;
        self
    }

    /// Sets the validation thresholds.
    #[must_use]
    pub const fn with_thresholds(mut self, thresholds: ValidationThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    /// Returns [`FsdError::InvalidParameter`] for zero passes or unordered
    /// thresholds.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(FsdError::InvalidParameter(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !self.thresholds.is_valid() {
            return Err(FsdError::InvalidParameter(format!(
                "Validation thresholds must be ascending: {:?}",
                self.thresholds
            )));
        }
        Ok(())
    }
}
