//! Input boundary of the standardizer.
//!
//! [`JoinedTable`] turns the numeric facts (joined with their presentation
//! lines) and the submissions table into typed [`Fact`] and [`ReportMeta`]
//! rows. The schema is checked before any row is decoded, so a malformed
//! input fails before processing starts.

use chrono::NaiveDate;
use fsd_core::{
    Fact, FiscalPeriod, FsdError, REPORT_ID_COLUMN, ReportId, ReportMeta, Result, StatementType,
};
use polars::prelude::*;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, instrument, warn};

use crate::frames::date_from_days;

/// Columns required in the facts table.
pub const FACT_COLUMNS: [&str; 13] = [
    REPORT_ID_COLUMN,
    "coreg",
    "tag",
    "version",
    "stmt",
    "report",
    "line",
    "uom",
    "negating",
    "inpth",
    "ddate",
    "qtrs",
    "value",
];

/// Columns required in the submissions table.
pub const SUBMISSION_COLUMNS: [&str; 9] = [
    REPORT_ID_COLUMN,
    "cik",
    "name",
    "form",
    "fye",
    "fy",
    "fp",
    "filed",
    "period",
];

/// Typed facts of one partition together with their report metadata.
///
/// Every fact references a report present in the metadata.
#[derive(Clone, Debug, Default)]
pub struct JoinedTable {
    facts: Vec<Fact>,
    reports: HashMap<ReportId, ReportMeta>,
    orphans: usize,
}

impl JoinedTable {
    /// Creates a table from typed rows.
    ///
    /// Facts without a matching report are dropped. When a report id appears
    /// twice in the metadata, the first row wins.
    #[must_use]
    pub fn new(facts: Vec<Fact>, reports: Vec<ReportMeta>) -> Self {
        let mut by_id = HashMap::with_capacity(reports.len());
        for meta in reports {
            if by_id.contains_key(&meta.report_id) {
                warn!(report = %meta.report_id, "Duplicate submission row ignored");
                continue;
            }
            by_id.insert(meta.report_id.clone(), meta);
        }

        let total = facts.len();
        let facts: Vec<Fact> = facts
            .into_iter()
            .filter(|f| by_id.contains_key(&f.report_id))
            .collect();
        let orphans = total - facts.len();
        if orphans > 0 {
            warn!(orphans, "Dropped facts without a submission row");
        }

        Self {
            facts,
            reports: by_id,
            orphans,
        }
    }

    /// Decodes the facts and submissions frames.
    ///
    /// Facts without a value are skipped; they carry nothing to standardize.
    ///
    /// # Errors
    /// Returns [`FsdError::MissingColumn`] if a required column is absent and
    /// [`FsdError::ColumnType`] if a column cannot be read as its type.
    #[instrument(skip_all, fields(facts = facts.height(), submissions = submissions.height()))]
    pub fn from_frames(facts: &DataFrame, submissions: &DataFrame) -> Result<Self> {
        require_columns(facts, "facts", &FACT_COLUMNS)?;
        require_columns(submissions, "submissions", &SUBMISSION_COLUMNS)?;

        let reports = decode_submissions(submissions)?;
        let facts = decode_facts(facts)?;
        debug!(
            facts = facts.len(),
            reports = reports.len(),
            "Decoded joined table"
        );
        Ok(Self::new(facts, reports))
    }

    /// All facts.
    #[must_use]
    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    /// Report metadata by report id.
    #[must_use]
    pub const fn reports(&self) -> &HashMap<ReportId, ReportMeta> {
        &self.reports
    }

    /// Number of facts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    /// Returns true if the table holds no facts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Number of facts dropped because their report had no metadata.
    #[must_use]
    pub const fn orphans(&self) -> usize {
        self.orphans
    }

    /// Splits the table into `n` partitions by report id.
    ///
    /// All facts of a report land in the same partition, so partitions can be
    /// standardized independently. Reports are assigned round-robin in id
    /// order; some partitions may be empty.
    ///
    /// # Errors
    /// Returns [`FsdError::InvalidParameter`] if `n` is zero.
    pub fn shard_by_report(&self, n: usize) -> Result<Vec<Self>> {
        if n == 0 {
            return Err(FsdError::InvalidParameter(
                "Number of shards must be at least 1".to_string(),
            ));
        }

        let mut ids: Vec<&ReportId> = self.reports.keys().collect();
        ids.sort();
        let shard_of: HashMap<&ReportId, usize> =
            ids.into_iter().enumerate().map(|(i, id)| (id, i % n)).collect();

        let mut shards = vec![Self::default(); n];
        for (id, meta) in &self.reports {
            if let Some(&shard) = shard_of.get(id) {
                shards[shard].reports.insert(id.clone(), meta.clone());
            }
        }
        for fact in &self.facts {
            if let Some(&shard) = shard_of.get(&fact.report_id) {
                shards[shard].facts.push(fact.clone());
            }
        }
        Ok(shards)
    }
}

fn require_columns(df: &DataFrame, table: &'static str, columns: &[&'static str]) -> Result<()> {
    for &column in columns {
        if df.column(column).is_err() {
            return Err(FsdError::MissingColumn { table, column });
        }
    }
    Ok(())
}

fn type_error<'a>(
    column: &'a str,
    expected: &'static str,
) -> impl Fn(PolarsError) -> FsdError + 'a {
    move |e| FsdError::ColumnType {
        column: column.to_string(),
        expected,
        reason: e.to_string(),
    }
}

fn strings(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)?
        .cast(&DataType::String)
        .map_err(type_error(name, "string"))?;
    let values = column.str().map_err(type_error(name, "string"))?;
    Ok(values
        .into_iter()
        .map(|v| v.map(|s| s.trim().to_string()))
        .collect())
}

fn floats(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)?
        .cast(&DataType::Float64)
        .map_err(type_error(name, "float"))?;
    let values = column.f64().map_err(type_error(name, "float"))?;
    Ok(values.into_iter().collect())
}

fn integers(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let column = df
        .column(name)?
        .cast(&DataType::Int64)
        .map_err(type_error(name, "integer"))?;
    let values = column.i64().map_err(type_error(name, "integer"))?;
    Ok(values.into_iter().collect())
}

fn flags(df: &DataFrame, name: &str) -> Result<Vec<bool>> {
    let column = df.column(name)?;
    match column.dtype() {
        DataType::Boolean => {
            let values = column.bool().map_err(type_error(name, "flag"))?;
            Ok(values.into_iter().map(|v| v.unwrap_or(false)).collect())
        }
        DataType::String => Ok(strings(df, name)?
            .into_iter()
            .map(|v| matches!(v.as_deref(), Some("1" | "true" | "TRUE" | "True")))
            .collect()),
        _ => Ok(integers(df, name)?
            .into_iter()
            .map(|v| v.is_some_and(|v| v != 0))
            .collect()),
    }
}

/// Reads a date column stored as a date, a datetime, a `YYYYMMDD` integer,
/// or a `YYYYMMDD` / `YYYY-MM-DD` string. Any other type is an error.
fn dates(df: &DataFrame, name: &str) -> Result<Vec<Option<NaiveDate>>> {
    let column = df.column(name)?;
    match column.dtype() {
        DataType::Date => calendar_days(column, name),
        DataType::Datetime(..) => {
            let column = column
                .cast(&DataType::Date)
                .map_err(type_error(name, "date"))?;
            calendar_days(&column, name)
        }
        DataType::String => Ok(strings(df, name)?
            .into_iter()
            .map(|v| v.as_deref().and_then(parse_date_str))
            .collect()),
        dtype if dtype.is_integer() => Ok(integers(df, name)?
            .into_iter()
            .map(|v| v.and_then(parse_date_int))
            .collect()),
        dtype => Err(FsdError::ColumnType {
            column: name.to_string(),
            expected: "date",
            reason: format!("unsupported type {dtype}"),
        }),
    }
}

fn calendar_days(column: &Column, name: &str) -> Result<Vec<Option<NaiveDate>>> {
    let values = column.date().map_err(type_error(name, "date"))?;
    Ok(values
        .0
        .clone()
        .into_iter()
        .map(|v| v.and_then(date_from_days))
        .collect())
}

fn parse_date_int(v: i64) -> Option<NaiveDate> {
    let year = i32::try_from(v / 10_000).ok()?;
    let month = u32::try_from((v / 100) % 100).ok()?;
    let day = u32::try_from(v % 100).ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_date_str(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .ok()
}

fn decode_facts(df: &DataFrame) -> Result<Vec<Fact>> {
    let adsh = strings(df, REPORT_ID_COLUMN)?;
    let coreg = strings(df, "coreg")?;
    let tag = strings(df, "tag")?;
    let version = strings(df, "version")?;
    let stmt = strings(df, "stmt")?;
    let report = integers(df, "report")?;
    let line = integers(df, "line")?;
    let uom = strings(df, "uom")?;
    let negating = flags(df, "negating")?;
    let inpth = flags(df, "inpth")?;
    let ddate = dates(df, "ddate")?;
    let qtrs = integers(df, "qtrs")?;
    let value = floats(df, "value")?;

    let mut facts = Vec::with_capacity(df.height());
    let mut skipped = 0usize;
    for i in 0..df.height() {
        let (Some(id), Some(tag), Some(ddate), Some(qtrs), Some(value)) = (
            adsh[i].as_deref(),
            tag[i].as_deref(),
            ddate[i],
            qtrs[i].and_then(|q| u8::try_from(q).ok()),
            value[i],
        ) else {
            skipped += 1;
            continue;
        };

        facts.push(Fact {
            report_id: ReportId::new(id),
            coreg: coreg[i].clone().unwrap_or_default(),
            tag: tag.to_string(),
            version: version[i].clone().unwrap_or_default(),
            stmt: stmt[i]
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or(StatementType::Unrecognized),
            report: report[i].and_then(|r| u32::try_from(r).ok()).unwrap_or(0),
            line: line[i].and_then(|l| u32::try_from(l).ok()).unwrap_or(0),
            uom: uom[i].clone().unwrap_or_default(),
            negating: negating[i],
            inpth: inpth[i],
            ddate,
            qtrs,
            value,
        });
    }

    if skipped > 0 {
        debug!(skipped, "Skipped facts without value or key");
    }
    Ok(facts)
}

fn decode_submissions(df: &DataFrame) -> Result<Vec<ReportMeta>> {
    let adsh = strings(df, REPORT_ID_COLUMN)?;
    let cik = integers(df, "cik")?;
    let name = strings(df, "name")?;
    let form = strings(df, "form")?;
    let fye = strings(df, "fye")?;
    let fy = floats(df, "fy")?;
    let fp = strings(df, "fp")?;
    let filed = dates(df, "filed")?;
    let period = dates(df, "period")?;

    let mut reports = Vec::with_capacity(df.height());
    let mut skipped = BTreeMap::new();
    for i in 0..df.height() {
        let Some(id) = adsh[i].as_deref() else {
            *skipped.entry("adsh").or_insert(0usize) += 1;
            continue;
        };
        let (Some(filed), Some(period)) = (filed[i], period[i]) else {
            *skipped.entry("dates").or_insert(0usize) += 1;
            continue;
        };

        reports.push(ReportMeta {
            report_id: ReportId::new(id),
            cik: cik[i].and_then(|c| u64::try_from(c).ok()).unwrap_or(0),
            name: name[i].clone().unwrap_or_default(),
            form: form[i].clone().unwrap_or_default(),
            fye: fye[i].as_deref().map(normalize_fye).unwrap_or_default(),
            fy: fy[i].filter(|v| v.is_finite()).map(|v| v as i32),
            fp: fp[i]
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or(FiscalPeriod::Other),
            filed,
            period,
        });
    }

    if !skipped.is_empty() {
        warn!(?skipped, "Skipped submission rows with missing keys");
    }
    Ok(reports)
}

/// Fiscal year ends stored as integers lose their leading zero (`930`).
fn normalize_fye(s: &str) -> String {
    let s = s.split('.').next().unwrap_or(s);
    if !s.is_empty() && s.len() < 4 && s.bytes().all(|b| b.is_ascii_digit()) {
        format!("{s:0>4}")
    } else {
        s.to_string()
    }
}
