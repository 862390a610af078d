//! The rule engine.
//!
//! A [`Standardizer`] resolves the canonical columns of one statement type.
//! Per row, each column's rule list is tried in order and the first rule that
//! yields a value sets the column. Columns are visited in the rulebook's
//! declared order; because a rule may read a column declared later, the
//! column order is traversed up to `max_iterations` times until a pass sets
//! nothing new. Post-processing rules then run once.
//!
//! Every successful firing is recorded in a [`RuleLog`] threaded through the
//! pass, so each non-null canonical value has exactly one log entry.

use fsd_core::{
    Canonical, ContextKey, Fact, FsdError, Result, StandardizedBag, StatementType,
};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, instrument};

use crate::config::StandardizerConfig;
use crate::filter::FilterPipeline;
use crate::frames::build_bag;
use crate::input::JoinedTable;
use crate::pivot::pivot;
use crate::prepivot::{PrePivotEvent, correct_signs, deduplicate};
use crate::row::Row;
use crate::rulebook::Rulebook;
use crate::rules::Rule;
use crate::validation::{CategoryCount, ValidationOutcome, summarize, validate_row};

/// Stage in which a rule fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// The iterated main passes.
    Main,
    /// The single post-processing pass.
    Post,
}

impl Stage {
    /// Lowercase name stored in the log table.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Post => "post",
        }
    }
}

/// One successful rule firing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleApplication {
    /// Row the rule fired on.
    pub context: ContextKey,
    /// Column the rule set.
    pub column: Canonical,
    /// Id of the rule.
    pub rule_id: String,
    /// Stage of the firing.
    pub stage: Stage,
    /// Pass number, starting at 1. Post rules run in pass 1 of their stage.
    pub pass: u32,
}

/// Accumulator of rule firings for one standardization run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RuleLog {
    applications: Vec<RuleApplication>,
    usage: BTreeMap<String, usize>,
}

impl RuleLog {
    /// Creates a log that reports every given rule in its usage, fired or not.
    pub fn new<I>(rule_ids: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            applications: Vec::new(),
            usage: rule_ids.into_iter().map(|id| (id, 0)).collect(),
        }
    }

    fn record(&mut self, context: &ContextKey, rule: &Rule, stage: Stage, pass: u32) {
        *self.usage.entry(rule.id().to_string()).or_default() += 1;
        self.applications.push(RuleApplication {
            context: context.clone(),
            column: rule.target(),
            rule_id: rule.id().to_string(),
            stage,
            pass,
        });
    }

    /// All firings in the order they happened.
    #[must_use]
    pub fn applications(&self) -> &[RuleApplication] {
        &self.applications
    }

    /// Rule id to number of rows it fired on.
    #[must_use]
    pub const fn usage(&self) -> &BTreeMap<String, usize> {
        &self.usage
    }

    /// Number of rows a rule fired on.
    #[must_use]
    pub fn count(&self, rule_id: &str) -> usize {
        self.usage.get(rule_id).copied().unwrap_or(0)
    }

    /// Firings that set a column.
    pub fn for_column(&self, column: Canonical) -> impl Iterator<Item = &RuleApplication> {
        self.applications.iter().filter(move |a| a.column == column)
    }
}

/// One standardized reporting context.
#[derive(Clone, Debug, PartialEq)]
pub struct StandardizedRow {
    /// Context the row is keyed by.
    pub context: ContextKey,
    /// Resolved canonical columns; absent columns are null.
    pub values: BTreeMap<Canonical, f64>,
    /// Outcome per identity, in rulebook order.
    pub validations: Vec<ValidationOutcome>,
}

/// Typed output of [`Standardizer::standardize`].
#[derive(Clone, Debug, PartialEq)]
pub struct Standardized {
    /// Rows in context order.
    pub rows: Vec<StandardizedRow>,
    /// Rule firings and usage.
    pub log: RuleLog,
    /// Pre-pivot events.
    pub prepivot: Vec<PrePivotEvent>,
    /// Per identity and category row counts.
    pub summary: Vec<CategoryCount>,
    /// Facts excluded because they belong to another statement.
    pub excluded: usize,
    /// Facts of the statement whose tag no rule reads.
    pub unmapped: usize,
}

/// Rule engine for one statement type.
#[derive(Clone, Debug)]
pub struct Standardizer {
    rulebook: Rulebook,
    config: StandardizerConfig,
    main: Vec<(Canonical, Vec<Rule>)>,
    post: Vec<(Canonical, Vec<Rule>)>,
    tags: BTreeSet<String>,
}

impl Standardizer {
    /// Creates a standardizer from a rulebook and configuration.
    ///
    /// # Errors
    /// Returns an error if the rulebook or the configuration is invalid.
    pub fn new(rulebook: Rulebook, config: StandardizerConfig) -> Result<Self> {
        rulebook.validate()?;
        config.validate()?;
        let main = rulebook.main_rules();
        let post = rulebook.bound_post_rules();
        let tags = rulebook.referenced_tags();
        Ok(Self {
            rulebook,
            config,
            main,
            post,
            tags,
        })
    }

    /// Creates a standardizer with the builtin rulebook of a statement type
    /// and the default configuration.
    ///
    /// # Errors
    /// Returns [`FsdError::InvalidParameter`] if no builtin rulebook exists
    /// for the statement type.
    pub fn for_statement(statement: StatementType) -> Result<Self> {
        let rulebook = Rulebook::for_statement(statement).ok_or_else(|| {
            FsdError::InvalidParameter(format!("No builtin rulebook for statement {statement}"))
        })?;
        Self::new(rulebook, StandardizerConfig::default())
    }

    /// The rulebook in use.
    #[must_use]
    pub const fn rulebook(&self) -> &Rulebook {
        &self.rulebook
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &StandardizerConfig {
        &self.config
    }

    /// Statement type this standardizer resolves.
    #[must_use]
    pub const fn statement(&self) -> StatementType {
        self.rulebook.statement
    }

    fn fire(
        rules: &[(Canonical, Vec<Rule>)],
        context: &ContextKey,
        row: &mut Row,
        log: &mut RuleLog,
        stage: Stage,
        pass: u32,
    ) -> bool {
        let mut changed = false;
        for (column, rules) in rules {
            if row.is_set(*column) {
                continue;
            }
            for rule in rules {
                if let Some(value) = rule.evaluate(row) {
                    row.set(*column, value);
                    log.record(context, rule, stage, pass);
                    changed = true;
                    break;
                }
            }
        }
        changed
    }

    /// Resolves the canonical columns of one row.
    pub fn resolve(&self, context: &ContextKey, row: &mut Row, log: &mut RuleLog) {
        let mut pass = 0;
        while pass < self.config.max_iterations {
            pass += 1;
            if !Self::fire(&self.main, context, row, log, Stage::Main, pass as u32) {
                break;
            }
        }
        Self::fire(&self.post, context, row, log, Stage::Post, 1);
    }

    /// Standardizes facts that already passed the caller's filters.
    ///
    /// Facts of other statement types are excluded from resolution.
    #[must_use]
    pub fn standardize(&self, facts: Vec<Fact>) -> Standardized {
        let statement = self.statement();
        let total = facts.len();
        let mut facts: Vec<Fact> = facts.into_iter().filter(|f| f.stmt == statement).collect();
        let excluded = total - facts.len();
        let unmapped = facts
            .iter()
            .filter(|f| !self.tags.contains(&f.tag))
            .count();

        let mut prepivot = Vec::new();
        if self.config.correct_signs {
            let (corrected, events) = correct_signs(facts, &self.rulebook);
            facts = corrected;
            prepivot.extend(events);
        }
        if self.config.deduplicate {
            let (kept, events) = deduplicate(facts, &self.rulebook);
            facts = kept;
            prepivot.extend(events);
        }

        let mut log = RuleLog::new(self.rulebook.rule_ids());
        let rows: Vec<StandardizedRow> = pivot(&facts)
            .into_iter()
            .map(|(context, mut row)| {
                self.resolve(&context, &mut row, &mut log);
                let validations =
                    validate_row(&self.rulebook.identities, &row, &self.config.thresholds);
                StandardizedRow {
                    context,
                    values: row.into_values(),
                    validations,
                }
            })
            .collect();

        let summary = summarize(
            &self.rulebook.identities,
            rows.iter().map(|r| r.validations.as_slice()),
        );

        debug!(
            statement = %statement,
            rows = rows.len(),
            firings = log.applications().len(),
            excluded,
            unmapped,
            "Standardized facts"
        );

        Standardized {
            rows,
            log,
            prepivot,
            summary,
            excluded,
            unmapped,
        }
    }

    /// Filters, standardizes and validates a joined table into a bag.
    ///
    /// # Errors
    /// Returns an error if a bag table cannot be built.
    #[instrument(skip(self, input, filters), fields(statement = %self.statement(), facts = input.len()))]
    pub fn process(&self, input: &JoinedTable, filters: &FilterPipeline) -> Result<StandardizedBag> {
        let facts = filters.apply(input.facts().to_vec(), input.reports(), self.statement());
        let standardized = self.standardize(facts);
        let bag = build_bag(
            self.statement(),
            &standardized,
            input.reports(),
            &self.rulebook.output_columns(),
            &self.rulebook.identities,
        )?;
        info!(
            rows = standardized.rows.len(),
            prepivot_events = standardized.prepivot.len(),
            "Standardization complete"
        );
        Ok(bag)
    }

    /// Decodes the facts and submissions frames, then runs [`Self::process`].
    ///
    /// The input schema is checked before any row is processed.
    ///
    /// # Errors
    /// Returns an error if a required column is missing or malformed, or a
    /// bag table cannot be built.
    pub fn process_frames(
        &self,
        facts: &DataFrame,
        submissions: &DataFrame,
        filters: &FilterPipeline,
    ) -> Result<StandardizedBag> {
        let input = JoinedTable::from_frames(facts, submissions)?;
        self.process(&input, filters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{RuleKind, Source};
    use crate::validation::ErrorCategory;
    use chrono::NaiveDate;
    use fsd_core::{FiscalPeriod, ReportId, ReportMeta};
    use polars::prelude::*;

    fn period() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()
    }

    fn fact(report: &str, tag: &str, line: u32, value: f64) -> Fact {
        Fact {
            report_id: ReportId::new(report),
            coreg: String::new(),
            tag: tag.to_string(),
            version: "us-gaap/2024".to_string(),
            stmt: StatementType::BS,
            report: 2,
            line,
            uom: "USD".to_string(),
            negating: false,
            inpth: false,
            ddate: period(),
            qtrs: 0,
            value,
        }
    }

    fn meta(report: &str) -> ReportMeta {
        ReportMeta {
            report_id: ReportId::new(report),
            cik: 320_193,
            name: "ACME CORP".to_string(),
            form: "10-Q".to_string(),
            fye: "1231".to_string(),
            fy: Some(2024),
            fp: FiscalPeriod::Q1,
            filed: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            period: period(),
        }
    }

    fn balance_sheet() -> Standardizer {
        Standardizer::for_statement(StatementType::BS).unwrap()
    }

    #[test]
    fn test_triangle_end_to_end() {
        let facts = vec![
            fact("r1", "AssetsCurrent", 1, 100.0),
            fact("r1", "AssetsNoncurrent", 2, 50.0),
        ];
        let out = balance_sheet().standardize(facts);

        assert_eq!(out.rows.len(), 1);
        let row = &out.rows[0];
        assert_eq!(row.values.get(&Canonical::Assets), Some(&150.0));

        let assets: Vec<_> = out.log.for_column(Canonical::Assets).collect();
        assert_eq!(assets.len(), 1);
        assert_eq!(
            assets[0].rule_id,
            "BS_Assets_Triangle[Assets=AssetsCurrent+AssetsNoncurrent]"
        );

        let check = row
            .validations
            .iter()
            .find(|v| v.identity == "AssetsLiaEquCheck")
            .unwrap();
        assert_eq!(check.category, ErrorCategory::NotComputable);

        let assets_check = row
            .validations
            .iter()
            .find(|v| v.identity == "AssetsCheck")
            .unwrap();
        assert_eq!(assets_check.category, ErrorCategory::Exact);
    }

    #[test]
    fn test_every_value_has_one_log_entry() {
        let facts = vec![
            fact("r1", "Assets", 1, 500.0),
            fact("r1", "AssetsCurrent", 2, 200.0),
            fact("r1", "Liabilities", 3, 300.0),
            fact("r1", "StockholdersEquity", 4, 200.0),
            fact("r1", "LiabilitiesAndStockholdersEquity", 5, 500.0),
        ];
        let out = balance_sheet().standardize(facts);
        let row = &out.rows[0];

        assert_eq!(row.values.len(), out.log.applications().len());
        for column in row.values.keys() {
            assert_eq!(out.log.for_column(*column).count(), 1);
        }
        assert_eq!(row.values.get(&Canonical::AssetsNoncurrent), Some(&300.0));
        assert_eq!(row.values.get(&Canonical::Equity), Some(&200.0));
        assert_eq!(row.values.get(&Canonical::MinorityInterest), Some(&0.0));
        assert_eq!(row.values.get(&Canonical::TemporaryEquity), Some(&0.0));

        let post: Vec<_> = out
            .log
            .applications()
            .iter()
            .filter(|a| a.stage == Stage::Post)
            .collect();
        // MinorityInterest resolves through the equity triangle in pass 2.
        assert_eq!(post.len(), 1);
        assert_eq!(post[0].column, Canonical::TemporaryEquity);
        assert!(post[0].rule_id.starts_with("BS_Post_"));
        let minority = out
            .log
            .for_column(Canonical::MinorityInterest)
            .next()
            .unwrap();
        assert_eq!((minority.stage, minority.pass), (Stage::Main, 2));

        let balance = row
            .validations
            .iter()
            .find(|v| v.identity == "AssetsLiaEquCheck")
            .unwrap();
        assert_eq!(balance.category, ErrorCategory::Exact);
    }

    #[test]
    fn test_first_match_wins() {
        let book = Rulebook::new(StatementType::BS, "T").with_column(
            Canonical::Cash,
            vec![
                RuleKind::Copy {
                    source: Source::Tag("A".into()),
                },
                RuleKind::Copy {
                    source: Source::Tag("B".into()),
                },
            ],
        );
        let engine = Standardizer::new(
            book,
            StandardizerConfig::default().with_deduplicate(false),
        )
        .unwrap();

        let out = engine.standardize(vec![fact("r1", "B", 1, 2.0), fact("r1", "A", 2, 1.0)]);
        assert_eq!(out.rows[0].values.get(&Canonical::Cash), Some(&1.0));
        assert_eq!(out.log.applications()[0].rule_id, "T_Cash_Copy[A]");
        assert_eq!(out.log.count("T_Cash_Copy[A]"), 1);
        assert_eq!(out.log.count("T_Cash_Copy[B]"), 0);
        assert!(out.log.usage().contains_key("T_Cash_Copy[B]"));
    }

    #[test]
    fn test_missing_tags_leave_columns_null() {
        let out = balance_sheet().standardize(vec![fact("r1", "Goodwill", 1, 10.0)]);
        assert_eq!(out.unmapped, 1);
        assert_eq!(out.rows.len(), 1);
        assert!(out.rows[0].values.is_empty());
        assert!(out.log.applications().is_empty());
    }

    #[test]
    fn test_other_statements_excluded() {
        let mut income = fact("r1", "Revenues", 1, 10.0);
        income.stmt = StatementType::IS;
        let mut unknown = fact("r1", "Assets", 2, 10.0);
        unknown.stmt = StatementType::Unrecognized;

        let out = balance_sheet().standardize(vec![income, unknown, fact("r1", "Cash", 3, 1.0)]);
        assert_eq!(out.excluded, 2);
        assert_eq!(out.unmapped, 0);
        assert_eq!(out.rows.len(), 1);
        assert!(!out.rows[0].values.contains_key(&Canonical::Assets));
    }

    #[test]
    fn test_dedup_preference_end_to_end() {
        let facts = vec![
            fact("r1", "Cash", 3, 42.0),
            fact("r1", "CashAndCashEquivalentsAtCarryingValue", 4, 42.0),
        ];
        let out = balance_sheet().standardize(facts);
        assert_eq!(out.prepivot.len(), 1);
        assert_eq!(out.prepivot[0].tag, "Cash");
        assert_eq!(
            out.log.applications()[0].rule_id,
            "BS_Cash_Alias[CashAndCashEquivalentsAtCarryingValue|CashCashEquivalentsRestrictedCashAndRestrictedCashEquivalents|Cash|CashAndDueFromBanks]"
        );
    }

    #[test]
    fn test_single_pass_limit() {
        // AssetsNoncurrent needs Assets, which is declared after it.
        let facts = vec![
            fact("r1", "Assets", 1, 500.0),
            fact("r1", "AssetsCurrent", 2, 200.0),
        ];
        let single = Standardizer::new(
            Rulebook::for_statement(StatementType::BS).unwrap(),
            StandardizerConfig::default().with_max_iterations(1),
        )
        .unwrap()
        .standardize(facts.clone());
        assert!(!single.rows[0].values.contains_key(&Canonical::AssetsNoncurrent));

        let multi = balance_sheet().standardize(facts);
        assert_eq!(
            multi.rows[0].values.get(&Canonical::AssetsNoncurrent),
            Some(&300.0)
        );
        let entry = multi
            .log
            .for_column(Canonical::AssetsNoncurrent)
            .next()
            .unwrap();
        assert_eq!(entry.pass, 2);
    }

    #[test]
    fn test_idempotent_on_own_output() {
        let facts = vec![
            fact("r1", "AssetsCurrent", 1, 100.0),
            fact("r1", "AssetsNoncurrent", 2, 50.0),
            fact("r1", "Liabilities", 3, 90.0),
            fact("r1", "StockholdersEquity", 4, 60.0),
            fact("r2", "Assets", 1, 10.0),
            fact("r2", "LiabilitiesCurrent", 2, 4.0),
        ];
        let first = balance_sheet().standardize(facts);

        let restated: Vec<Fact> = first
            .rows
            .iter()
            .flat_map(|row| {
                row.values.iter().enumerate().map(|(line, (column, value))| {
                    let mut f = fact(
                        row.context.report_id.as_str(),
                        column.as_str(),
                        line as u32,
                        *value,
                    );
                    f.report = row.context.report;
                    f
                })
            })
            .collect();

        let columns = balance_sheet().rulebook().output_columns();
        let identity = Standardizer::new(
            Rulebook::identity(StatementType::BS, &columns),
            StandardizerConfig::default(),
        )
        .unwrap();
        let second = identity.standardize(restated);

        assert_eq!(first.rows.len(), second.rows.len());
        for (a, b) in first.rows.iter().zip(&second.rows) {
            assert_eq!(a.context, b.context);
            assert_eq!(a.values, b.values);
        }
    }

    #[test]
    fn test_deterministic() {
        let facts = vec![
            fact("r2", "Assets", 1, 10.0),
            fact("r1", "AssetsCurrent", 1, 100.0),
            fact("r1", "AssetsNoncurrent", 2, 50.0),
        ];
        let a = balance_sheet().standardize(facts.clone());
        let b = balance_sheet().standardize(facts);
        assert_eq!(a, b);
    }

    #[test]
    fn test_process_builds_bag() {
        let input = JoinedTable::new(
            vec![
                fact("r1", "AssetsCurrent", 1, 100.0),
                fact("r1", "AssetsNoncurrent", 2, 50.0),
                fact("orphan", "Assets", 1, 1.0),
            ],
            vec![meta("r1")],
        );
        let engine = balance_sheet();
        let bag = engine.process(&input, &FilterPipeline::standard()).unwrap();

        let result = bag.result();
        assert_eq!(result.height(), 1);
        assert_eq!(
            result.column("Assets").unwrap().f64().unwrap().get(0),
            Some(150.0)
        );
        assert_eq!(result.column("Liabilities").unwrap().null_count(), 1);
        assert_eq!(
            result.column("AssetsLiaEquCheck_cat").unwrap().null_count(),
            1
        );
        assert_eq!(
            result.column("AssetsCheck_cat").unwrap().i32().unwrap().get(0),
            Some(0)
        );
        assert_eq!(bag.rule_usage().height(), engine.rulebook().rule_ids().len());
        assert_eq!(
            bag.validation_summary().height(),
            engine.rulebook().identities.len() * ErrorCategory::ALL.len()
        );
        assert_eq!(
            bag.applied_rules_log().height(),
            result
                .get_columns()
                .iter()
                .filter(|c| Canonical::ALL.iter().any(|k| k.as_str() == c.name().as_str()))
                .map(|c| c.len() - c.null_count())
                .sum::<usize>()
        );
    }

    #[test]
    fn test_process_frames_fails_fast() {
        let facts = DataFrame::new(vec![Column::new("adsh".into(), vec!["r1"])]).unwrap();
        let subs = DataFrame::new(vec![Column::new("adsh".into(), vec!["r1"])]).unwrap();
        let err = balance_sheet()
            .process_frames(&facts, &subs, &FilterPipeline::new())
            .unwrap_err();
        assert!(matches!(err, FsdError::MissingColumn { table: "facts", .. }));
    }
}
