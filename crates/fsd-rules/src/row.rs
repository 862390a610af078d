//! Typed row abstraction the rules operate on.
//!
//! A [`Row`] is one reporting context after pivoting: the raw tag values the
//! filer reported, plus the canonical columns resolved so far. Raw tags and
//! canonical columns live in separate maps so rules never confuse a filer's
//! tag with a derived line item of the same name.

use fsd_core::Canonical;
use std::collections::{BTreeMap, HashMap};

/// Tolerance used when comparing two values for equality.
pub const EQUALITY_TOLERANCE: f64 = 1e-6;

/// A raw tag value together with its presentation sign flag.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawValue {
    /// Reported value.
    pub value: f64,
    /// Whether the presentation line negates the value.
    pub negating: bool,
}

impl RawValue {
    /// Creates a raw value that is not negated in presentation.
    #[must_use]
    pub const fn new(value: f64) -> Self {
        Self {
            value,
            negating: false,
        }
    }

    /// Creates a raw value with an explicit negating flag.
    #[must_use]
    pub const fn with_negating(value: f64, negating: bool) -> Self {
        Self { value, negating }
    }
}

/// One pivoted reporting context.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    raw: HashMap<String, RawValue>,
    values: BTreeMap<Canonical, f64>,
}

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a row from raw tag values.
    ///
    /// When a tag appears more than once, the first occurrence wins.
    pub fn from_raw<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = (S, RawValue)>,
        S: Into<String>,
    {
        let mut row = Self::new();
        for (tag, value) in raw {
            row.insert_raw(tag, value);
        }
        row
    }

    /// Adds a raw tag value unless the tag is already present.
    ///
    /// Returns false if the tag was already present.
    pub fn insert_raw(&mut self, tag: impl Into<String>, value: RawValue) -> bool {
        match self.raw.entry(tag.into()) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(value);
                true
            }
        }
    }

    /// Raw value reported for a tag.
    #[must_use]
    pub fn raw(&self, tag: &str) -> Option<RawValue> {
        self.raw.get(tag).copied()
    }

    /// Resolved value of a canonical column.
    #[must_use]
    pub fn get(&self, column: Canonical) -> Option<f64> {
        self.values.get(&column).copied()
    }

    /// Returns true if the canonical column has been resolved.
    #[must_use]
    pub fn is_set(&self, column: Canonical) -> bool {
        self.values.contains_key(&column)
    }

    /// Sets a canonical column unless it is already resolved.
    ///
    /// Returns false, leaving the row unchanged, if the column was already set.
    pub fn set(&mut self, column: Canonical, value: f64) -> bool {
        if self.is_set(column) {
            return false;
        }
        self.values.insert(column, value);
        true
    }

    /// All resolved canonical columns.
    #[must_use]
    pub const fn values(&self) -> &BTreeMap<Canonical, f64> {
        &self.values
    }

    /// Consumes the row, keeping only the resolved canonical columns.
    #[must_use]
    pub fn into_values(self) -> BTreeMap<Canonical, f64> {
        self.values
    }
}

/// Returns true if two values are equal within [`EQUALITY_TOLERANCE`].
#[must_use]
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= EQUALITY_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_raw_value_wins() {
        let row = Row::from_raw([
            ("Assets", RawValue::new(10.0)),
            ("Assets", RawValue::new(20.0)),
        ]);
        assert_eq!(row.raw("Assets"), Some(RawValue::new(10.0)));
    }

    #[test]
    fn test_set_is_first_writer_wins() {
        let mut row = Row::new();
        assert!(row.set(Canonical::Assets, 1.0));
        assert!(!row.set(Canonical::Assets, 2.0));
        assert_eq!(row.get(Canonical::Assets), Some(1.0));
        assert!(row.get(Canonical::Liabilities).is_none());
    }

    #[test]
    fn test_raw_and_canonical_are_separate() {
        let row = Row::from_raw([("Assets", RawValue::new(5.0))]);
        assert!(row.raw("Assets").is_some());
        assert!(!row.is_set(Canonical::Assets));
    }
}
