//! The standardized bag: the persistable output of one standardization run.
//!
//! A [`StandardizedBag`] bundles five tables:
//!
//! - `result` - one row per reporting context with metadata, canonical
//!   columns and per-identity validation columns
//! - `applied_rules_log` - one row per successful rule firing
//! - `rule_usage` - number of rows each rule fired on
//! - `validation_summary` - row counts per identity and error category
//! - `prepivot_log` - de-duplication, conflict and sign correction events
//!
//! Bags from independent partitions are combined with
//! [`StandardizedBag::concat`] and persisted as a directory holding one
//! parquet file per table plus a `bag.json` manifest.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::path::Path;
use tracing::{debug, instrument};

use crate::error::{FsdError, Result};
use crate::types::StatementType;

/// Column holding the report id in every bag table.
pub const REPORT_ID_COLUMN: &str = "adsh";

/// Version of the on-disk bag layout.
pub const BAG_FORMAT_VERSION: u32 = 1;

const MANIFEST_FILE: &str = "bag.json";

/// Name of the standardized result table.
pub const RESULT_TABLE: &str = "result";
/// Name of the rule application log table.
pub const APPLIED_RULES_TABLE: &str = "applied_rules_log";
/// Name of the rule usage summary table.
pub const RULE_USAGE_TABLE: &str = "rule_usage";
/// Name of the validation summary table.
pub const VALIDATION_SUMMARY_TABLE: &str = "validation_summary";
/// Name of the pre-pivot event log table.
pub const PREPIVOT_LOG_TABLE: &str = "prepivot_log";

/// Controls how [`StandardizedBag::concat`] treats repeated report ids.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcatPolicy {
    /// Accept bags that share report ids instead of failing.
    pub allow_duplicate_reports: bool,
}

impl ConcatPolicy {
    /// Policy that rejects duplicate report ids.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            allow_duplicate_reports: false,
        }
    }

    /// Policy that accepts duplicate report ids.
    #[must_use]
    pub const fn allow_duplicates() -> Self {
        Self {
            allow_duplicate_reports: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct BagManifest {
    format_version: u32,
    statement: StatementType,
    rows: BTreeMap<String, usize>,
}

/// Output of a standardization run.
///
/// The bag is immutable; combining bags produces a new one.
#[derive(Clone, Debug)]
pub struct StandardizedBag {
    statement: StatementType,
    result: DataFrame,
    applied_rules_log: DataFrame,
    rule_usage: DataFrame,
    validation_summary: DataFrame,
    prepivot_log: DataFrame,
}

impl StandardizedBag {
    /// Creates a bag from its tables.
    ///
    /// # Errors
    /// Returns an error if the result or rule log table lacks the report id column.
    pub fn new(
        statement: StatementType,
        result: DataFrame,
        applied_rules_log: DataFrame,
        rule_usage: DataFrame,
        validation_summary: DataFrame,
        prepivot_log: DataFrame,
    ) -> Result<Self> {
        for (table, df) in [
            (RESULT_TABLE, &result),
            (APPLIED_RULES_TABLE, &applied_rules_log),
            (PREPIVOT_LOG_TABLE, &prepivot_log),
        ] {
            if df.column(REPORT_ID_COLUMN).is_err() {
                return Err(FsdError::MissingColumn {
                    table,
                    column: REPORT_ID_COLUMN,
                });
            }
        }

        Ok(Self {
            statement,
            result,
            applied_rules_log,
            rule_usage,
            validation_summary,
            prepivot_log,
        })
    }

    /// Statement type the bag was standardized for.
    #[must_use]
    pub const fn statement(&self) -> StatementType {
        self.statement
    }

    /// The standardized result table.
    #[must_use]
    pub const fn result(&self) -> &DataFrame {
        &self.result
    }

    /// One row per rule firing.
    #[must_use]
    pub const fn applied_rules_log(&self) -> &DataFrame {
        &self.applied_rules_log
    }

    /// Rule id to number of rows it fired on.
    #[must_use]
    pub const fn rule_usage(&self) -> &DataFrame {
        &self.rule_usage
    }

    /// Row counts per validation identity and error category.
    #[must_use]
    pub const fn validation_summary(&self) -> &DataFrame {
        &self.validation_summary
    }

    /// De-duplication, conflict and sign correction events.
    #[must_use]
    pub const fn prepivot_log(&self) -> &DataFrame {
        &self.prepivot_log
    }

    fn tables(&self) -> [(&'static str, &DataFrame); 5] {
        [
            (RESULT_TABLE, &self.result),
            (APPLIED_RULES_TABLE, &self.applied_rules_log),
            (RULE_USAGE_TABLE, &self.rule_usage),
            (VALIDATION_SUMMARY_TABLE, &self.validation_summary),
            (PREPIVOT_LOG_TABLE, &self.prepivot_log),
        ]
    }

    /// Distinct report ids in the result table.
    ///
    /// # Errors
    /// Returns an error if the report id column is not a string column.
    pub fn report_ids(&self) -> Result<BTreeSet<String>> {
        let ids = self.result.column(REPORT_ID_COLUMN)?.str()?;
        Ok(ids.into_iter().flatten().map(str::to_string).collect())
    }

    /// Row-wise union of all tables of the given bags.
    ///
    /// All bags must come from the same statement type. Report ids present in
    /// more than one bag are rejected unless the policy allows them.
    ///
    /// # Errors
    /// Returns an error for an empty input, mixed statement types, duplicate
    /// report ids under a strict policy, or mismatching table schemas.
    #[instrument(skip(bags), fields(bags = bags.len()))]
    pub fn concat(bags: &[Self], policy: ConcatPolicy) -> Result<Self> {
        let (first, rest) = bags
            .split_first()
            .ok_or_else(|| FsdError::InvalidParameter("No bags to concatenate".to_string()))?;

        if let Some(other) = rest.iter().find(|b| b.statement != first.statement) {
            return Err(FsdError::InvalidParameter(format!(
                "Cannot concatenate {} bag with {} bag",
                first.statement, other.statement
            )));
        }

        if !policy.allow_duplicate_reports {
            let mut seen: BTreeSet<String> = BTreeSet::new();
            let mut duplicates: BTreeSet<String> = BTreeSet::new();
            for bag in bags {
                for id in bag.report_ids()? {
                    if !seen.insert(id.clone()) {
                        duplicates.insert(id);
                    }
                }
            }
            if !duplicates.is_empty() {
                return Err(FsdError::DuplicateReports(duplicates.into_iter().collect()));
            }
        }

        let mut combined = first.clone();
        for bag in rest {
            combined.result.vstack_mut(&bag.result)?;
            combined.applied_rules_log.vstack_mut(&bag.applied_rules_log)?;
            combined.rule_usage.vstack_mut(&bag.rule_usage)?;
            combined
                .validation_summary
                .vstack_mut(&bag.validation_summary)?;
            combined.prepivot_log.vstack_mut(&bag.prepivot_log)?;
        }

        debug!(rows = combined.result.height(), "Concatenated bags");
        Ok(combined)
    }

    /// Persists the bag into a directory, one parquet file per table.
    ///
    /// The directory is created if it does not exist; existing bag files in it
    /// are overwritten.
    ///
    /// # Errors
    /// Returns an error if the directory or any file cannot be written.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let dir = path.as_ref();
        fs::create_dir_all(dir)?;

        let mut rows = BTreeMap::new();
        for (name, df) in self.tables() {
            let file = File::create(dir.join(format!("{name}.parquet")))?;
            let mut df = df.clone();
            ParquetWriter::new(file).finish(&mut df)?;
            rows.insert(name.to_string(), df.height());
        }

        let manifest = BagManifest {
            format_version: BAG_FORMAT_VERSION,
            statement: self.statement,
            rows,
        };
        fs::write(
            dir.join(MANIFEST_FILE),
            serde_json::to_string_pretty(&manifest)?,
        )?;

        debug!(rows = self.result.height(), "Saved bag");
        Ok(())
    }

    /// Loads a bag previously written by [`StandardizedBag::save`].
    ///
    /// # Errors
    /// Returns an error if the manifest is missing or has an unknown format
    /// version, a table file cannot be read, or a table's row count differs
    /// from the manifest.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let dir = path.as_ref();
        let manifest: BagManifest = serde_json::from_str(&fs::read_to_string(
            dir.join(MANIFEST_FILE),
        )?)?;

        if manifest.format_version != BAG_FORMAT_VERSION {
            return Err(FsdError::InvalidParameter(format!(
                "Unsupported bag format version {} (expected {})",
                manifest.format_version, BAG_FORMAT_VERSION
            )));
        }

        let read = |name: &str| -> Result<DataFrame> {
            let file = File::open(dir.join(format!("{name}.parquet")))?;
            let df = ParquetReader::new(file).finish()?;
            let expected = manifest.rows.get(name).copied().unwrap_or_default();
            if df.height() != expected {
                return Err(FsdError::Other(format!(
                    "Table {name} has {} rows, manifest records {expected}",
                    df.height()
                )));
            }
            Ok(df)
        };

        let bag = Self::new(
            manifest.statement,
            read(RESULT_TABLE)?,
            read(APPLIED_RULES_TABLE)?,
            read(RULE_USAGE_TABLE)?,
            read(VALIDATION_SUMMARY_TABLE)?,
            read(PREPIVOT_LOG_TABLE)?,
        )?;

        debug!(rows = bag.result.height(), "Loaded bag");
        Ok(bag)
    }
}

impl PartialEq for StandardizedBag {
    fn eq(&self, other: &Self) -> bool {
        self.statement == other.statement
            && self
                .tables()
                .iter()
                .zip(other.tables().iter())
                .all(|((_, a), (_, b))| a.equals_missing(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bag(ids: &[&str], assets: &[Option<f64>]) -> StandardizedBag {
        let result = DataFrame::new(vec![
            Column::new(REPORT_ID_COLUMN.into(), ids.to_vec()),
            Column::new("Assets".into(), assets.to_vec()),
        ])
        .unwrap();
        let log = DataFrame::new(vec![
            Column::new(REPORT_ID_COLUMN.into(), ids.to_vec()),
            Column::new("column".into(), vec!["Assets"; ids.len()]),
            Column::new("rule_id".into(), vec!["BS_Assets_Copy[Assets]"; ids.len()]),
        ])
        .unwrap();
        let usage = DataFrame::new(vec![
            Column::new("rule_id".into(), vec!["BS_Assets_Copy[Assets]"]),
            Column::new("count".into(), vec![ids.len() as u32]),
        ])
        .unwrap();
        let summary = DataFrame::new(vec![
            Column::new("identity".into(), vec!["AssetsCheck"]),
            Column::new("category".into(), vec!["exact"]),
            Column::new("count".into(), vec![ids.len() as u32]),
        ])
        .unwrap();
        let prepivot = DataFrame::new(vec![
            Column::new(REPORT_ID_COLUMN.into(), Vec::<String>::new()),
            Column::new("tag".into(), Vec::<String>::new()),
        ])
        .unwrap();
        StandardizedBag::new(StatementType::BS, result, log, usage, summary, prepivot).unwrap()
    }

    #[test]
    fn test_new_requires_report_id() {
        let result = DataFrame::new(vec![Column::new("Assets".into(), vec![1.0])]).unwrap();
        let err = StandardizedBag::new(
            StatementType::BS,
            result,
            DataFrame::empty(),
            DataFrame::empty(),
            DataFrame::empty(),
            DataFrame::empty(),
        )
        .unwrap_err();
        assert!(matches!(err, FsdError::MissingColumn { .. }));
    }

    #[test]
    fn test_concat_unions_all_tables() {
        let a = bag(&["a1", "a2"], &[Some(1.0), None]);
        let b = bag(&["b1"], &[Some(0.0)]);

        let combined = StandardizedBag::concat(&[a, b], ConcatPolicy::strict()).unwrap();
        assert_eq!(combined.result().height(), 3);
        assert_eq!(combined.applied_rules_log().height(), 3);
        assert_eq!(combined.rule_usage().height(), 2);
        assert_eq!(combined.validation_summary().height(), 2);
        assert_eq!(combined.report_ids().unwrap().len(), 3);
    }

    #[test]
    fn test_concat_rejects_duplicate_reports() {
        let a = bag(&["a1"], &[Some(1.0)]);
        let b = bag(&["a1"], &[Some(2.0)]);

        let err = StandardizedBag::concat(&[a.clone(), b.clone()], ConcatPolicy::strict())
            .unwrap_err();
        assert!(matches!(err, FsdError::DuplicateReports(ids) if ids == vec!["a1".to_string()]));

        let combined =
            StandardizedBag::concat(&[a, b], ConcatPolicy::allow_duplicates()).unwrap();
        assert_eq!(combined.result().height(), 2);
    }

    #[test]
    fn test_concat_empty_input() {
        assert!(StandardizedBag::concat(&[], ConcatPolicy::default()).is_err());
    }

    #[test]
    fn test_save_load_roundtrip_keeps_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let original = bag(&["a1", "a2", "a3"], &[Some(1.5), None, Some(0.0)]);

        original.save(dir.path().join("bag")).unwrap();
        let loaded = StandardizedBag::load(dir.path().join("bag")).unwrap();

        assert_eq!(loaded, original);
        let assets = loaded.result().column("Assets").unwrap().f64().unwrap();
        assert_eq!(assets.get(1), None);
        assert_eq!(assets.get(2), Some(0.0));
    }

    #[test]
    fn test_concatenated_bag_survives_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let combined = StandardizedBag::concat(
            &[
                bag(&["a1", "a2"], &[Some(1.0), None]),
                bag(&[], &[]),
                bag(&["b1"], &[Some(-2.5)]),
            ],
            ConcatPolicy::strict(),
        )
        .unwrap();

        combined.save(dir.path().join("all")).unwrap();
        let loaded = StandardizedBag::load(dir.path().join("all")).unwrap();

        assert_eq!(loaded, combined);
        assert_eq!(loaded.result().height(), 3);
        assert_eq!(loaded.rule_usage().height(), 3);
        assert_eq!(
            loaded.report_ids().unwrap().into_iter().collect::<Vec<_>>(),
            vec!["a1", "a2", "b1"]
        );
    }

    #[test]
    fn test_load_rejects_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        bag(&["a1"], &[Some(1.0)]).save(dir.path()).unwrap();
        fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"{"format_version": 99, "statement": "BS", "rows": {}}"#,
        )
        .unwrap();

        assert!(StandardizedBag::load(dir.path()).is_err());
    }
}
