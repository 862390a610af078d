//! Core data types for financial statement data sets.
//!
//! This module defines the typed rows the standardizer works on:
//!
//! - [`ReportId`] - Accession number identifying one filing
//! - [`StatementType`] - Statement a presentation line belongs to
//! - [`Fact`] - One numeric fact joined with its presentation line
//! - [`ReportMeta`] - Submission metadata of one report
//! - [`ContextKey`] - Reporting context a standardized row is keyed by

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::period::FiscalPeriod;

/// Accession number of a report (`adsh`).
///
/// Leading and trailing whitespace is removed on creation.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReportId(String);

impl ReportId {
    /// Creates a new report id from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        let s: String = s.into();
        Self(s.trim().to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ReportId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ReportId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Financial statement a presentation line belongs to (`stmt`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StatementType {
    /// Balance sheet.
    BS,
    /// Income statement.
    IS,
    /// Cash flow statement.
    CF,
    /// Statement of equity.
    EQ,
    /// Comprehensive income.
    CI,
    /// Cover page.
    CP,
    /// Schedule of investments.
    SI,
    /// Unclassifiable statement.
    UN,
    /// Any code not known to this crate.
    Unrecognized,
}

impl StatementType {
    /// Returns the two-letter code used in the presentation table.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BS => "BS",
            Self::IS => "IS",
            Self::CF => "CF",
            Self::EQ => "EQ",
            Self::CI => "CI",
            Self::CP => "CP",
            Self::SI => "SI",
            Self::UN => "UN",
            Self::Unrecognized => "??",
        }
    }
}

impl FromStr for StatementType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "BS" => Self::BS,
            "IS" => Self::IS,
            "CF" => Self::CF,
            "EQ" => Self::EQ,
            "CI" => Self::CI,
            "CP" => Self::CP,
            "SI" => Self::SI,
            "UN" => Self::UN,
            _ => Self::Unrecognized,
        })
    }
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A numeric fact joined with the presentation line it appears on.
///
/// Facts are immutable once loaded. Several facts may share every key and
/// differ only in the filing context they came from; resolving those is the
/// job of the pre-pivot stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// Report the fact belongs to.
    pub report_id: ReportId,
    /// Coregistrant; empty for the consolidated entity.
    pub coreg: String,
    /// Tag the filer used for the value.
    pub tag: String,
    /// Taxonomy version, or the report id for filer-specific tags.
    pub version: String,
    /// Statement the presentation line belongs to.
    pub stmt: StatementType,
    /// Report section number within the filing.
    pub report: u32,
    /// Line number within the report section.
    pub line: u32,
    /// Unit of measure.
    pub uom: String,
    /// Whether the presentation negates the value.
    pub negating: bool,
    /// Whether the value is shown in parenthesis.
    pub inpth: bool,
    /// End date of the period the value covers.
    pub ddate: NaiveDate,
    /// Number of quarters covered (0 for point-in-time values).
    pub qtrs: u8,
    /// Reported value.
    pub value: f64,
}

impl Fact {
    /// Returns the reporting context this fact is pivoted into.
    #[must_use]
    pub fn context(&self) -> ContextKey {
        ContextKey {
            report_id: self.report_id.clone(),
            coreg: self.coreg.clone(),
            report: self.report,
            ddate: self.ddate,
            qtrs: self.qtrs,
        }
    }

    /// Returns true if the tag is a filer-specific extension tag.
    #[must_use]
    pub fn is_custom_tag(&self) -> bool {
        self.version == self.report_id.as_str()
    }
}

/// Submission metadata of one report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMeta {
    /// Accession number.
    pub report_id: ReportId,
    /// Central Index Key of the filer.
    pub cik: u64,
    /// Filer name.
    pub name: String,
    /// Form type (10-K, 10-Q, ...).
    pub form: String,
    /// Fiscal year end as `MMDD`.
    pub fye: String,
    /// Fiscal year.
    pub fy: Option<i32>,
    /// Fiscal period.
    pub fp: FiscalPeriod,
    /// Filing date.
    pub filed: NaiveDate,
    /// Balance sheet date of the report.
    pub period: NaiveDate,
}

/// Key of one standardized row: a distinct reporting context within a report.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContextKey {
    /// Report the context belongs to.
    pub report_id: ReportId,
    /// Coregistrant; empty for the consolidated entity.
    pub coreg: String,
    /// Report section number.
    pub report: u32,
    /// Period end date.
    pub ddate: NaiveDate,
    /// Number of quarters covered.
    pub qtrs: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(version: &str) -> Fact {
        Fact {
            report_id: ReportId::new("0000320193-24-000123"),
            coreg: String::new(),
            tag: "Assets".to_string(),
            version: version.to_string(),
            stmt: StatementType::BS,
            report: 2,
            line: 10,
            uom: "USD".to_string(),
            negating: false,
            inpth: false,
            ddate: NaiveDate::from_ymd_opt(2024, 9, 30).unwrap(),
            qtrs: 0,
            value: 100.0,
        }
    }

    #[test]
    fn test_report_id_trims() {
        let id = ReportId::new("  0000320193-24-000123 ");
        assert_eq!(id.as_str(), "0000320193-24-000123");
    }

    #[test]
    fn test_statement_type_parse() {
        assert_eq!("BS".parse::<StatementType>().unwrap(), StatementType::BS);
        assert_eq!(" CF ".parse::<StatementType>().unwrap(), StatementType::CF);
        assert_eq!(
            "XX".parse::<StatementType>().unwrap(),
            StatementType::Unrecognized
        );
    }

    #[test]
    fn test_custom_tag_detection() {
        assert!(!fact("us-gaap/2024").is_custom_tag());
        assert!(fact("0000320193-24-000123").is_custom_tag());
    }

    #[test]
    fn test_context_ordering() {
        let a = fact("us-gaap/2024").context();
        let mut b = a.clone();
        b.report = 3;
        assert!(a < b);
    }
}
