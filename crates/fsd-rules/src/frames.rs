//! Conversion of standardization output into bag tables.

use chrono::{Datelike, NaiveDate};
use fsd_core::{
    Canonical, ContextKey, REPORT_ID_COLUMN, ReportId, ReportMeta, Result, StandardizedBag,
    StatementType,
};
use polars::prelude::*;
use std::collections::HashMap;

use crate::engine::{RuleLog, Standardized, StandardizedRow};
use crate::prepivot::PrePivotEvent;
use crate::validation::{CategoryCount, Identity};

/// Days between 0001-01-01 and the Unix epoch, the origin of polars dates.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Converts a polars date (days since the Unix epoch) into a calendar date.
#[must_use]
pub fn date_from_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(EPOCH_DAYS_FROM_CE)?)
}

/// Converts a calendar date into a polars date.
#[must_use]
pub fn days_from_date(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - EPOCH_DAYS_FROM_CE
}

fn date_column(name: &str, dates: impl IntoIterator<Item = Option<NaiveDate>>) -> Result<Column> {
    let days: Vec<Option<i32>> = dates.into_iter().map(|d| d.map(days_from_date)).collect();
    Ok(Column::new(name.into(), days).cast(&DataType::Date)?)
}

fn context_columns(contexts: &[&ContextKey]) -> Result<Vec<Column>> {
    Ok(vec![
        Column::new(
            REPORT_ID_COLUMN.into(),
            contexts
                .iter()
                .map(|c| c.report_id.as_str())
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "coreg".into(),
            contexts.iter().map(|c| c.coreg.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            "report".into(),
            contexts.iter().map(|c| c.report).collect::<Vec<_>>(),
        ),
        date_column("ddate", contexts.iter().map(|c| Some(c.ddate)))?,
        Column::new(
            "qtrs".into(),
            contexts
                .iter()
                .map(|c| u32::from(c.qtrs))
                .collect::<Vec<_>>(),
        ),
    ])
}

/// Builds the result table: report metadata, context, canonical columns in
/// rulebook order, then an error and category column per identity.
///
/// # Errors
/// Returns an error if a column cannot be built.
pub fn result_frame(
    rows: &[StandardizedRow],
    reports: &HashMap<ReportId, ReportMeta>,
    columns: &[Canonical],
    identities: &[Identity],
) -> Result<DataFrame> {
    let metas: Vec<Option<&ReportMeta>> = rows
        .iter()
        .map(|r| reports.get(&r.context.report_id))
        .collect();
    let meta_str = |f: fn(&ReportMeta) -> &str| -> Vec<Option<&str>> {
        metas.iter().map(|m| m.map(f)).collect()
    };

    let contexts: Vec<&ContextKey> = rows.iter().map(|r| &r.context).collect();
    let mut context = context_columns(&contexts)?;
    let mut out = vec![context.remove(0)];
    out.push(Column::new(
        "cik".into(),
        metas.iter().map(|m| m.map(|m| m.cik)).collect::<Vec<_>>(),
    ));
    out.push(Column::new("name".into(), meta_str(|m| m.name.as_str())));
    out.push(Column::new("form".into(), meta_str(|m| m.form.as_str())));
    out.push(Column::new("fye".into(), meta_str(|m| m.fye.as_str())));
    out.push(Column::new(
        "fy".into(),
        metas.iter().map(|m| m.and_then(|m| m.fy)).collect::<Vec<_>>(),
    ));
    out.push(Column::new("fp".into(), meta_str(|m| m.fp.as_str())));
    out.push(date_column("filed", metas.iter().map(|m| m.map(|m| m.filed)))?);
    out.push(date_column("period", metas.iter().map(|m| m.map(|m| m.period)))?);
    out.extend(context);

    for column in columns {
        let values: Vec<Option<f64>> = rows.iter().map(|r| r.values.get(column).copied()).collect();
        out.push(Column::new(column.as_str().into(), values));
    }

    for (i, identity) in identities.iter().enumerate() {
        let outcomes: Vec<_> = rows.iter().map(|r| r.validations.get(i)).collect();
        out.push(Column::new(
            identity.error_column().into(),
            outcomes
                .iter()
                .map(|o| o.and_then(|o| o.error))
                .collect::<Vec<_>>(),
        ));
        out.push(Column::new(
            identity.category_column().into(),
            outcomes
                .iter()
                .map(|o| o.and_then(|o| o.category.code()))
                .collect::<Vec<_>>(),
        ));
    }

    Ok(DataFrame::new(out)?)
}

/// One row per rule firing.
///
/// # Errors
/// Returns an error if a column cannot be built.
pub fn applied_rules_frame(log: &RuleLog) -> Result<DataFrame> {
    let applications = log.applications();
    let contexts: Vec<&ContextKey> = applications.iter().map(|a| &a.context).collect();
    let mut out = context_columns(&contexts)?;
    out.push(Column::new(
        "column".into(),
        applications
            .iter()
            .map(|a| a.column.as_str())
            .collect::<Vec<_>>(),
    ));
    out.push(Column::new(
        "rule_id".into(),
        applications
            .iter()
            .map(|a| a.rule_id.as_str())
            .collect::<Vec<_>>(),
    ));
    out.push(Column::new(
        "stage".into(),
        applications
            .iter()
            .map(|a| a.stage.as_str())
            .collect::<Vec<_>>(),
    ));
    out.push(Column::new(
        "pass".into(),
        applications.iter().map(|a| a.pass).collect::<Vec<u32>>(),
    ));
    Ok(DataFrame::new(out)?)
}

/// Rule id to number of rows it fired on, including rules that never fired.
///
/// # Errors
/// Returns an error if a column cannot be built.
pub fn rule_usage_frame(log: &RuleLog) -> Result<DataFrame> {
    let usage = log.usage();
    Ok(DataFrame::new(vec![
        Column::new(
            "rule_id".into(),
            usage.keys().map(String::as_str).collect::<Vec<_>>(),
        ),
        Column::new(
            "count".into(),
            usage.values().map(|c| *c as u64).collect::<Vec<_>>(),
        ),
    ])?)
}

/// Row counts per identity and category.
///
/// # Errors
/// Returns an error if a column cannot be built.
pub fn validation_summary_frame(summary: &[CategoryCount]) -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        Column::new(
            "identity".into(),
            summary
                .iter()
                .map(|c| c.identity.as_str())
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "category".into(),
            summary
                .iter()
                .map(|c| c.category.label())
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "code".into(),
            summary
                .iter()
                .map(|c| c.category.code())
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "count".into(),
            summary.iter().map(|c| c.count as u64).collect::<Vec<_>>(),
        ),
        Column::new(
            "share".into(),
            summary.iter().map(|c| c.share).collect::<Vec<_>>(),
        ),
    ])?)
}

/// De-duplication, conflict and sign correction events.
///
/// # Errors
/// Returns an error if a column cannot be built.
pub fn prepivot_frame(events: &[PrePivotEvent]) -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        Column::new(
            REPORT_ID_COLUMN.into(),
            events
                .iter()
                .map(|e| e.report_id.as_str())
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "coreg".into(),
            events.iter().map(|e| e.coreg.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            "tag".into(),
            events.iter().map(|e| e.tag.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            "report".into(),
            events.iter().map(|e| e.report).collect::<Vec<_>>(),
        ),
        Column::new(
            "line".into(),
            events.iter().map(|e| e.line).collect::<Vec<_>>(),
        ),
        date_column("ddate", events.iter().map(|e| Some(e.ddate)))?,
        Column::new(
            "qtrs".into(),
            events.iter().map(|e| u32::from(e.qtrs)).collect::<Vec<_>>(),
        ),
        Column::new(
            "value".into(),
            events.iter().map(|e| e.value).collect::<Vec<_>>(),
        ),
        Column::new(
            "action".into(),
            events
                .iter()
                .map(|e| e.action.marker())
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "kept_tag".into(),
            events
                .iter()
                .map(|e| e.kept_tag.as_deref())
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "rule_id".into(),
            events.iter().map(|e| e.rule_id.as_str()).collect::<Vec<_>>(),
        ),
    ])?)
}

/// Assembles the bag of one standardization run.
///
/// # Errors
/// Returns an error if a table cannot be built.
pub fn build_bag(
    statement: StatementType,
    standardized: &Standardized,
    reports: &HashMap<ReportId, ReportMeta>,
    columns: &[Canonical],
    identities: &[Identity],
) -> Result<StandardizedBag> {
    StandardizedBag::new(
        statement,
        result_frame(&standardized.rows, reports, columns, identities)?,
        applied_rules_frame(&standardized.log)?,
        rule_usage_frame(&standardized.log)?,
        validation_summary_frame(&standardized.summary)?,
        prepivot_frame(&standardized.prepivot)?,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_conversion() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        assert_eq!(days_from_date(date), 19_813);
        assert_eq!(date_from_days(19_813), Some(date));
        assert_eq!(date_from_days(0), NaiveDate::from_ymd_opt(1970, 1, 1));
    }

    #[test]
    fn test_empty_tables_have_schema() {
        let events = prepivot_frame(&[]).unwrap();
        assert_eq!(events.height(), 0);
        assert_eq!(events.width(), 11);
        assert_eq!(
            events.column("ddate").unwrap().dtype(),
            &DataType::Date
        );

        let summary = validation_summary_frame(&[]).unwrap();
        assert_eq!(summary.width(), 5);
    }
}
