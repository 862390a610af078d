//! Validation of standardized rows against accounting identities.
//!
//! Each [`Identity`] states that a total equals the signed sum of its terms.
//! Validation computes the relative error of that statement for a row and
//! buckets it into an ordinal [`ErrorCategory`]. It only reads canonical
//! columns; running it any number of times never changes them.

use fsd_core::Canonical;
use serde::{Deserialize, Serialize};

use crate::row::Row;

/// Relative errors at or below this are considered exact.
pub const EXACT_TOLERANCE: f64 = 1e-9;

/// Upper bounds (exclusive) of the 1%, 5% and 10% error tiers.
///
/// The tiers are empirical; they are kept as configuration rather than
/// derived from the data.
pub const DEFAULT_TIER_BOUNDS: [f64; 3] = [0.01, 0.05, 0.10];

/// Floor for the scale reference value, so a zero total does not divide by zero.
pub const SCALE_EPSILON: f64 = 1e-9;

/// One term of an identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    /// Column contributing to the sum.
    pub column: Canonical,
    /// Whether the column is subtracted instead of added.
    #[serde(default)]
    pub subtract: bool,
}

impl Term {
    /// An added term.
    #[must_use]
    pub const fn plus(column: Canonical) -> Self {
        Self {
            column,
            subtract: false,
        }
    }

    /// A subtracted term.
    #[must_use]
    pub const fn minus(column: Canonical) -> Self {
        Self {
            column,
            subtract: true,
        }
    }
}

/// An accounting identity `total = Σ terms`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Name used for the diagnostic columns (`<name>_error`, `<name>_cat`).
    pub name: String,
    /// Left-hand side of the identity; also the scale reference.
    pub total: Canonical,
    /// Right-hand side terms.
    pub terms: Vec<Term>,
}

impl Identity {
    /// Creates an identity.
    #[must_use]
    pub fn new(name: impl Into<String>, total: Canonical, terms: Vec<Term>) -> Self {
        Self {
            name: name.into(),
            total,
            terms,
        }
    }

    /// Name of the error column.
    #[must_use]
    pub fn error_column(&self) -> String {
        format!("{}_error", self.name)
    }

    /// Name of the category column.
    #[must_use]
    pub fn category_column(&self) -> String {
        format!("{}_cat", self.name)
    }

    /// Relative error of the identity for a row, if every operand is resolved.
    #[must_use]
    pub fn error(&self, row: &Row, epsilon: f64) -> Option<f64> {
        let total = row.get(self.total)?;
        let mut sum = 0.0;
        for term in &self.terms {
            let value = row.get(term.column)?;
            sum += if term.subtract { -value } else { value };
        }
        let error = (total - sum).abs() / total.abs().max(epsilon);
        error.is_finite().then_some(error)
    }

    /// Validates a row against this identity.
    #[must_use]
    pub fn evaluate(&self, row: &Row, thresholds: &ValidationThresholds) -> ValidationOutcome {
        let error = self.error(row, thresholds.epsilon);
        ValidationOutcome {
            identity: self.name.clone(),
            error,
            category: error.map_or(ErrorCategory::NotComputable, |e| thresholds.categorize(e)),
        }
    }
}

/// Ordinal error bucket of a validated identity.
///
/// Numeric categories are ordered from best to worst. `NotComputable` is a
/// separate outcome for rows missing an operand; it is not a severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Error within [`EXACT_TOLERANCE`].
    Exact,
    /// Error below 1%.
    Below1Pct,
    /// Error below 5%.
    Below5Pct,
    /// Error below 10%.
    Below10Pct,
    /// Error of 10% or more.
    Above10Pct,
    /// An operand of the identity is missing.
    NotComputable,
}

impl ErrorCategory {
    /// All categories in reporting order.
    pub const ALL: [Self; 6] = [
        Self::Exact,
        Self::Below1Pct,
        Self::Below5Pct,
        Self::Below10Pct,
        Self::Above10Pct,
        Self::NotComputable,
    ];

    /// Numeric code stored in result tables: 0, 1, 5, 10 and 100.
    ///
    /// `NotComputable` has no code and is stored as null.
    #[must_use]
    pub const fn code(&self) -> Option<i32> {
        match self {
            Self::Exact => Some(0),
            Self::Below1Pct => Some(1),
            Self::Below5Pct => Some(5),
            Self::Below10Pct => Some(10),
            Self::Above10Pct => Some(100),
            Self::NotComputable => None,
        }
    }

    /// Severity rank of numeric categories (0 is best).
    #[must_use]
    pub const fn severity(&self) -> Option<u8> {
        match self {
            Self::Exact => Some(0),
            Self::Below1Pct => Some(1),
            Self::Below5Pct => Some(2),
            Self::Below10Pct => Some(3),
            Self::Above10Pct => Some(4),
            Self::NotComputable => None,
        }
    }

    /// Label used in the validation summary.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Below1Pct => "below_1pct",
            Self::Below5Pct => "below_5pct",
            Self::Below10Pct => "below_10pct",
            Self::Above10Pct => "above_10pct",
            Self::NotComputable => "not_computable",
        }
    }
}

/// Tier boundaries for [`ErrorCategory`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationThresholds {
    /// Errors at or below this are exact.
    pub exact: f64,
    /// Exclusive upper bounds of the 1%, 5% and 10% tiers, ascending.
    pub bounds: [f64; 3],
    /// Floor for the scale reference value.
    pub epsilon: f64,
}

impl Default for ValidationThresholds {
    fn default() -> Self {
        Self {
            exact: EXACT_TOLERANCE,
            bounds: DEFAULT_TIER_BOUNDS,
            epsilon: SCALE_EPSILON,
        }
    }
}

impl ValidationThresholds {
    /// Returns true if the tiers are ascending and non-negative.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.exact >= 0.0
            && self.epsilon > 0.0
            && self.exact <= self.bounds[0]
            && self.bounds.windows(2).all(|w| w[0] <= w[1])
    }

    /// Buckets a relative error. Larger errors never map to a better category.
    #[must_use]
    pub fn categorize(&self, error: f64) -> ErrorCategory {
        if error.is_nan() {
            ErrorCategory::NotComputable
        } else if error <= self.exact {
            ErrorCategory::Exact
        } else if error < self.bounds[0] {
            ErrorCategory::Below1Pct
        } else if error < self.bounds[1] {
            ErrorCategory::Below5Pct
        } else if error < self.bounds[2] {
            ErrorCategory::Below10Pct
        } else {
            ErrorCategory::Above10Pct
        }
    }
}

/// Result of validating one identity on one row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    /// Identity name.
    pub identity: String,
    /// Relative error, `None` when not computable.
    pub error: Option<f64>,
    /// Error bucket.
    pub category: ErrorCategory,
}

/// Validates a row against every identity, in declaration order.
#[must_use]
pub fn validate_row(
    identities: &[Identity],
    row: &Row,
    thresholds: &ValidationThresholds,
) -> Vec<ValidationOutcome> {
    identities
        .iter()
        .map(|identity| identity.evaluate(row, thresholds))
        .collect()
}

/// Count of rows per identity and category.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryCount {
    /// Identity name.
    pub identity: String,
    /// Error bucket.
    pub category: ErrorCategory,
    /// Number of rows in the bucket.
    pub count: usize,
    /// Share of all validated rows in the bucket.
    pub share: f64,
}

/// Summarizes per-row outcomes into counts per identity and category.
///
/// Every category of every identity is listed, including empty ones.
#[must_use]
pub fn summarize<'a, I>(identities: &[Identity], outcomes: I) -> Vec<CategoryCount>
where
    I: IntoIterator<Item = &'a [ValidationOutcome]>,
{
    let mut counts = vec![[0usize; ErrorCategory::ALL.len()]; identities.len()];
    let mut rows = 0usize;
    for row in outcomes {
        rows += 1;
        for (i, outcome) in row.iter().enumerate().take(identities.len()) {
            if let Some(slot) = ErrorCategory::ALL.iter().position(|c| *c == outcome.category) {
                counts[i][slot] += 1;
            }
        }
    }

    let mut summary = Vec::with_capacity(identities.len() * ErrorCategory::ALL.len());
    for (identity, per_category) in identities.iter().zip(counts) {
        for (category, count) in ErrorCategory::ALL.iter().zip(per_category) {
            summary.push(CategoryCount {
                identity: identity.name.clone(),
                category: *category,
                count,
                share: if rows == 0 {
                    0.0
                } else {
                    count as f64 / rows as f64
                },
            });
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance_identity() -> Identity {
        Identity::new(
            "AssetsLiaEquCheck",
            Canonical::Assets,
            vec![Term::plus(Canonical::Liabilities), Term::plus(Canonical::Equity)],
        )
    }

    fn row(assets: Option<f64>, liabilities: Option<f64>, equity: Option<f64>) -> Row {
        let mut row = Row::new();
        if let Some(v) = assets {
            row.set(Canonical::Assets, v);
        }
        if let Some(v) = liabilities {
            row.set(Canonical::Liabilities, v);
        }
        if let Some(v) = equity {
            row.set(Canonical::Equity, v);
        }
        row
    }

    #[test]
    fn test_exact_identity() {
        let outcome = balance_identity().evaluate(
            &row(Some(100.0), Some(60.0), Some(40.0)),
            &ValidationThresholds::default(),
        );
        assert_eq!(outcome.error, Some(0.0));
        assert_eq!(outcome.category, ErrorCategory::Exact);
    }

    #[test]
    fn test_categories_are_monotonic() {
        let thresholds = ValidationThresholds::default();
        let identity = balance_identity();
        // errors of 0.1%, 6% and 50% against Assets = 1000
        let rows = [
            row(Some(1000.0), Some(599.0), Some(400.0)),
            row(Some(1000.0), Some(540.0), Some(400.0)),
            row(Some(1000.0), Some(100.0), Some(400.0)),
        ];
        let outcomes: Vec<_> = rows
            .iter()
            .map(|r| identity.evaluate(r, &thresholds))
            .collect();

        assert!((outcomes[0].error.unwrap() - 0.001).abs() < 1e-12);
        assert!((outcomes[1].error.unwrap() - 0.06).abs() < 1e-12);
        assert!((outcomes[2].error.unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(outcomes[0].category, ErrorCategory::Below1Pct);
        assert_eq!(outcomes[1].category, ErrorCategory::Below10Pct);
        assert_eq!(outcomes[2].category, ErrorCategory::Above10Pct);

        let severities: Vec<u8> = outcomes
            .iter()
            .map(|o| o.category.severity().unwrap())
            .collect();
        assert!(severities.windows(2).all(|w| w[0] <= w[1]));

        let missing = identity.evaluate(&row(None, None, None), &thresholds);
        assert_eq!(missing.category, ErrorCategory::NotComputable);
        assert_eq!(missing.error, None);
        assert_ne!(missing.category, outcomes[2].category);
        assert_eq!(missing.category.code(), None);
    }

    #[test]
    fn test_categorize_sweep_never_improves() {
        let thresholds = ValidationThresholds::default();
        let mut last = 0u8;
        for step in 0..=200 {
            let error = f64::from(step) * 0.001;
            let severity = thresholds.categorize(error).severity().unwrap();
            assert!(severity >= last);
            last = severity;
        }
    }

    #[test]
    fn test_partial_operands_not_computable() {
        let outcome = balance_identity().evaluate(
            &row(Some(100.0), Some(60.0), None),
            &ValidationThresholds::default(),
        );
        assert_eq!(outcome.category, ErrorCategory::NotComputable);
    }

    #[test]
    fn test_subtracted_term_and_zero_total() {
        let identity = Identity::new(
            "GrossProfitCheck",
            Canonical::GrossProfit,
            vec![Term::plus(Canonical::Revenues), Term::minus(Canonical::CostOfRevenue)],
        );
        let mut r = Row::new();
        r.set(Canonical::GrossProfit, 0.0);
        r.set(Canonical::Revenues, 50.0);
        r.set(Canonical::CostOfRevenue, 50.0);
        let outcome = identity.evaluate(&r, &ValidationThresholds::default());
        assert_eq!(outcome.category, ErrorCategory::Exact);
    }

    #[test]
    fn test_validation_does_not_mutate() {
        let r = row(Some(100.0), Some(60.0), Some(41.0));
        let before = r.clone();
        let identities = [balance_identity()];
        let first = validate_row(&identities, &r, &ValidationThresholds::default());
        let second = validate_row(&identities, &r, &ValidationThresholds::default());
        assert_eq!(first, second);
        assert_eq!(r, before);
    }

    #[test]
    fn test_summarize_counts_every_category() {
        let identities = [balance_identity()];
        let thresholds = ValidationThresholds::default();
        let rows = [
            row(Some(100.0), Some(60.0), Some(40.0)),
            row(Some(100.0), Some(60.0), Some(40.0)),
            row(None, None, None),
        ];
        let outcomes: Vec<Vec<ValidationOutcome>> = rows
            .iter()
            .map(|r| validate_row(&identities, r, &thresholds))
            .collect();

        let summary = summarize(&identities, outcomes.iter().map(Vec::as_slice));
        assert_eq!(summary.len(), ErrorCategory::ALL.len());
        let exact = summary
            .iter()
            .find(|c| c.category == ErrorCategory::Exact)
            .unwrap();
        assert_eq!(exact.count, 2);
        let missing = summary
            .iter()
            .find(|c| c.category == ErrorCategory::NotComputable)
            .unwrap();
        assert_eq!(missing.count, 1);
        assert!((missing.share - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_threshold_validation() {
        assert!(ValidationThresholds::default().is_valid());
        let bad = ValidationThresholds {
            bounds: [0.1, 0.05, 0.01],
            ..Default::default()
        };
        assert!(!bad.is_valid());
    }
}
