//! Pivoting adapter: long facts to one [`Row`] per reporting context.

use fsd_core::{ContextKey, Fact};
use std::collections::BTreeMap;

use crate::row::{RawValue, Row};

/// Pivots facts into rows keyed by reporting context.
///
/// When a context holds several facts of one tag, the lowest presentation
/// line wins. Rows are returned in context order.
#[must_use]
pub fn pivot(facts: &[Fact]) -> BTreeMap<ContextKey, Row> {
    let mut ordered: Vec<&Fact> = facts.iter().collect();
    ordered.sort_by_key(|f| f.line);

    let mut rows: BTreeMap<ContextKey, Row> = BTreeMap::new();
    for fact in ordered {
        rows.entry(fact.context())
            .or_default()
            .insert_raw(fact.tag.clone(), RawValue::with_negating(fact.value, fact.negating));
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use fsd_core::{ReportId, StatementType};

    fn fact(tag: &str, line: u32, qtrs: u8, value: f64) -> Fact {
        Fact {
            report_id: ReportId::new("r1"),
            coreg: String::new(),
            tag: tag.to_string(),
            version: "us-gaap/2024".to_string(),
            stmt: StatementType::IS,
            report: 4,
            line,
            uom: "USD".to_string(),
            negating: line % 2 == 0,
            inpth: false,
            ddate: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            qtrs,
            value,
        }
    }

    #[test]
    fn test_one_row_per_context() {
        let rows = pivot(&[
            fact("Revenues", 1, 1, 10.0),
            fact("Revenues", 1, 4, 40.0),
            fact("CostOfRevenue", 2, 1, 4.0),
        ]);
        assert_eq!(rows.len(), 2);
        let quarter = rows
            .values()
            .find(|r| r.raw("CostOfRevenue").is_some())
            .unwrap();
        assert_eq!(quarter.raw("Revenues").unwrap().value, 10.0);
        assert!(quarter.raw("CostOfRevenue").unwrap().negating);
    }

    #[test]
    fn test_lowest_line_wins() {
        let rows = pivot(&[fact("Revenues", 9, 1, 1.0), fact("Revenues", 3, 1, 2.0)]);
        let row = rows.values().next().unwrap();
        assert_eq!(row.raw("Revenues").unwrap().value, 2.0);
    }
}
