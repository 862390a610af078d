//! Fact filters applied before standardization.
//!
//! A [`FilterPipeline`] is an explicit, ordered list of [`Filter`]s passed to
//! the engine's entry point. There is no implicit default chain; callers that
//! want the usual selection use [`FilterPipeline::standard`].

use fsd_core::{Fact, ReportId, ReportMeta, StatementType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// A single fact filter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// Keep facts dated at the report's balance sheet date.
    ReportPeriodOnly,
    /// Keep facts of the consolidated entity (empty coregistrant).
    MainCoregOnly,
    /// Keep facts reported in one of the units.
    Units(Vec<String>),
    /// Drop filer-specific extension tags.
    StandardTagsOnly,
    /// Keep facts covering one of the quarter counts.
    QuartersCovered(Vec<u8>),
    /// Per report, keep the report section with the most lines of the
    /// statement being standardized.
    MainStatementOnly,
}

impl Filter {
    /// Short name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ReportPeriodOnly => "report_period_only",
            Self::MainCoregOnly => "main_coreg_only",
            Self::Units(_) => "units",
            Self::StandardTagsOnly => "standard_tags_only",
            Self::QuartersCovered(_) => "quarters_covered",
            Self::MainStatementOnly => "main_statement_only",
        }
    }

    /// Applies the filter.
    ///
    /// Facts of reports without metadata never pass the period filter.
    #[must_use]
    pub fn apply(
        &self,
        facts: Vec<Fact>,
        reports: &HashMap<ReportId, ReportMeta>,
        statement: StatementType,
    ) -> Vec<Fact> {
        match self {
            Self::ReportPeriodOnly => facts
                .into_iter()
                .filter(|f| {
                    reports
                        .get(&f.report_id)
                        .is_some_and(|meta| meta.period == f.ddate)
                })
                .collect(),
            Self::MainCoregOnly => facts.into_iter().filter(|f| f.coreg.is_empty()).collect(),
            Self::Units(units) => facts
                .into_iter()
                .filter(|f| units.iter().any(|u| *u == f.uom))
                .collect(),
            Self::StandardTagsOnly => facts.into_iter().filter(|f| !f.is_custom_tag()).collect(),
            Self::QuartersCovered(quarters) => facts
                .into_iter()
                .filter(|f| quarters.contains(&f.qtrs))
                .collect(),
            Self::MainStatementOnly => main_statement_only(facts, statement),
        }
    }
}

fn main_statement_only(facts: Vec<Fact>, statement: StatementType) -> Vec<Fact> {
    let mut lines: HashMap<&ReportId, BTreeMap<u32, usize>> = HashMap::new();
    for fact in facts.iter().filter(|f| f.stmt == statement) {
        *lines
            .entry(&fact.report_id)
            .or_default()
            .entry(fact.report)
            .or_default() += 1;
    }

    // Ties go to the lowest section number.
    let main: HashMap<ReportId, u32> = lines
        .into_iter()
        .filter_map(|(id, sections)| {
            let mut best: Option<(u32, usize)> = None;
            for (section, count) in sections {
                if best.is_none_or(|(_, c)| count > c) {
                    best = Some((section, count));
                }
            }
            best.map(|(section, _)| (id.clone(), section))
        })
        .collect();

    facts
        .into_iter()
        .filter(|f| f.stmt != statement || main.get(&f.report_id) == Some(&f.report))
        .collect()
}

/// Ordered, composable list of filters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterPipeline {
    filters: Vec<Filter>,
}

impl FilterPipeline {
    /// Creates an empty pipeline that keeps every fact.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report period, consolidated entity and standard tags only.
    #[must_use]
    pub fn standard() -> Self {
        Self::new()
            .with(Filter::ReportPeriodOnly)
            .with(Filter::MainCoregOnly)
            .with(Filter::StandardTagsOnly)
    }

    /// Appends a filter.
    #[must_use]
    pub fn with(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Filters in application order.
    #[must_use]
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Returns true if the pipeline has no filters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Applies every filter in order.
    #[must_use]
    pub fn apply(
        &self,
        facts: Vec<Fact>,
        reports: &HashMap<ReportId, ReportMeta>,
        statement: StatementType,
    ) -> Vec<Fact> {
        self.filters.iter().fold(facts, |facts, filter| {
            let before = facts.len();
            let kept = filter.apply(facts, reports, statement);
            debug!(
                filter = filter.name(),
                before,
                after = kept.len(),
                "Applied filter"
            );
            kept
        })
    }
}
