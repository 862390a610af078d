//! Pre-pivot clean-up of fact rows.
//!
//! Before facts are pivoted into rows, the same reported number may appear
//! more than once: under a specific and a generic synonym, or on several
//! presentation lines. [`deduplicate`] collapses bit-identical duplicates and
//! flags same-tag facts whose values disagree. [`correct_signs`] flips values
//! reported with the wrong sign for tags with a known sign convention.

use chrono::NaiveDate;
use fsd_core::{Fact, ReportId, StatementType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

use crate::rulebook::Rulebook;

/// What happened to a fact before pivoting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrePivotAction {
    /// The fact duplicated a preferred fact and was dropped.
    DeDup,
    /// The fact disagrees with another fact of the same tag and context; it
    /// is kept.
    Conflict,
    /// The fact's sign was flipped.
    SignCorrection,
}

impl PrePivotAction {
    /// Suffix of the rule id recorded for the action.
    #[must_use]
    pub const fn marker(&self) -> &'static str {
        match self {
            Self::DeDup => "DeDup",
            Self::Conflict => "Conflict",
            Self::SignCorrection => "CorrectSign",
        }
    }
}

/// One logged pre-pivot event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrePivotEvent {
    /// Report of the affected fact.
    pub report_id: ReportId,
    /// Coregistrant of the affected fact.
    pub coreg: String,
    /// Tag of the affected fact.
    pub tag: String,
    /// Report section of the affected fact.
    pub report: u32,
    /// Presentation line of the affected fact.
    pub line: u32,
    /// Period end date.
    pub ddate: NaiveDate,
    /// Quarters covered.
    pub qtrs: u8,
    /// Value of the fact as reported.
    pub value: f64,
    /// What happened.
    pub action: PrePivotAction,
    /// Tag of the fact that was kept instead, for de-duplication events.
    pub kept_tag: Option<String>,
    /// Rule id, `<prefix>_<tag>_<marker>`.
    pub rule_id: String,
}

impl PrePivotEvent {
    fn new(prefix: &str, fact: &Fact, action: PrePivotAction, kept_tag: Option<String>) -> Self {
        Self {
            report_id: fact.report_id.clone(),
            coreg: fact.coreg.clone(),
            tag: fact.tag.clone(),
            report: fact.report,
            line: fact.line,
            ddate: fact.ddate,
            qtrs: fact.qtrs,
            value: fact.value,
            action,
            kept_tag,
            rule_id: format!("{prefix}_{}_{}", fact.tag, action.marker()),
        }
    }
}

/// Facts sharing everything but tag and line.
#[derive(PartialEq, Eq, Hash)]
struct ValueKey<'a> {
    report_id: &'a ReportId,
    coreg: &'a str,
    stmt: StatementType,
    report: u32,
    uom: &'a str,
    ddate: NaiveDate,
    qtrs: u8,
    bits: u64,
}

impl<'a> ValueKey<'a> {
    fn of(fact: &'a Fact) -> Self {
        // 0.0 and -0.0 are the same reported number
        let bits = if fact.value == 0.0 {
            0
        } else {
            fact.value.to_bits()
        };
        Self {
            report_id: &fact.report_id,
            coreg: &fact.coreg,
            stmt: fact.stmt,
            report: fact.report,
            uom: &fact.uom,
            ddate: fact.ddate,
            qtrs: fact.qtrs,
            bits,
        }
    }
}

/// Removes duplicate facts and logs conflicting ones.
///
/// Within a group of facts sharing context and bit-identical value:
///
/// - facts of the same tag keep the lowest presentation line
/// - facts of different tags of one preference family keep the most
///   preferred tag
///
/// Facts of unrelated tags are never merged, even when their values happen
/// to coincide. Same-tag facts with differing values are retained and logged
/// as conflicts.
#[must_use]
pub fn deduplicate(facts: Vec<Fact>, rulebook: &Rulebook) -> (Vec<Fact>, Vec<PrePivotEvent>) {
    let family: HashMap<&str, (usize, usize)> = rulebook
        .dedup_preference
        .iter()
        .enumerate()
        .flat_map(|(f, tags)| {
            tags.iter()
                .enumerate()
                .map(move |(rank, tag)| (tag.as_str(), (f, rank)))
        })
        .collect();

    let dropped = duplicates(&facts, &family);

    // A fact dropped in favour of another that was later dropped points at
    // the final survivor.
    let survivor = |mut i: usize| {
        while let Some(&next) = dropped.get(&i) {
            i = next;
        }
        i
    };

    let mut events = Vec::with_capacity(dropped.len());
    for &i in dropped.keys() {
        let kept = &facts[survivor(i)];
        events.push(PrePivotEvent::new(
            &rulebook.prefix,
            &facts[i],
            PrePivotAction::DeDup,
            Some(kept.tag.clone()),
        ));
    }
    if !events.is_empty() {
        debug!(removed = events.len(), "Removed duplicate facts");
    }

    let removed: HashSet<usize> = dropped.keys().copied().collect();
    let kept: Vec<Fact> = facts
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !removed.contains(i))
        .map(|(_, f)| f)
        .collect();

    let conflicts = find_conflicts(&kept, &rulebook.prefix);
    if !conflicts.is_empty() {
        warn!(
            conflicts = conflicts.len(),
            "Retained facts with conflicting values"
        );
    }
    events.extend(conflicts);
    (kept, events)
}

/// Maps each dropped fact index to the index it was dropped in favour of.
fn duplicates(facts: &[Fact], family: &HashMap<&str, (usize, usize)>) -> BTreeMap<usize, usize> {
    let mut groups: HashMap<ValueKey<'_>, Vec<usize>> = HashMap::new();
    for (i, fact) in facts.iter().enumerate() {
        groups.entry(ValueKey::of(fact)).or_default().push(i);
    }

    let mut dropped: BTreeMap<usize, usize> = BTreeMap::new();
    for members in groups.values().filter(|m| m.len() > 1) {
        // winner per tag: lowest line, then first seen
        let mut per_tag: BTreeMap<&str, usize> = BTreeMap::new();
        for &i in members {
            let tag = facts[i].tag.as_str();
            match per_tag.get(tag) {
                Some(&kept) if facts[kept].line <= facts[i].line => {
                    dropped.insert(i, kept);
                }
                Some(&kept) => {
                    dropped.insert(kept, i);
                    per_tag.insert(tag, i);
                }
                None => {
                    per_tag.insert(tag, i);
                }
            }
        }

        // winner per family: lowest rank
        let mut per_family: HashMap<usize, (usize, usize)> = HashMap::new();
        for (tag, &i) in &per_tag {
            let Some(&(f, rank)) = family.get(tag) else {
                continue;
            };
            match per_family.get(&f) {
                Some(&(best_rank, kept)) if best_rank <= rank => {
                    dropped.insert(i, kept);
                }
                Some(&(_, kept)) => {
                    dropped.insert(kept, i);
                    per_family.insert(f, (rank, i));
                }
                None => {
                    per_family.insert(f, (rank, i));
                }
            }
        }
    }
    dropped
}

/// Same tag and context, different values.
fn find_conflicts(facts: &[Fact], prefix: &str) -> Vec<PrePivotEvent> {
    type TagKey<'a> = (&'a ReportId, &'a str, u32, &'a str, NaiveDate, u8, &'a str);

    let mut by_tag: HashMap<TagKey<'_>, Vec<&Fact>> = HashMap::new();
    for fact in facts {
        by_tag
            .entry((
                &fact.report_id,
                &fact.coreg,
                fact.report,
                &fact.uom,
                fact.ddate,
                fact.qtrs,
                &fact.tag,
            ))
            .or_default()
            .push(fact);
    }

    let mut events = Vec::new();
    for group in by_tag.values_mut().filter(|g| g.len() > 1) {
        group.sort_by_key(|f| f.line);
        // the lowest line is pivoted; the others are logged
        for fact in &group[1..] {
            events.push(PrePivotEvent::new(
                prefix,
                fact,
                PrePivotAction::Conflict,
                Some(group[0].tag.clone()),
            ));
        }
    }
    events.sort_by(|a, b| {
        (&a.report_id, &a.tag, a.line).cmp(&(&b.report_id, &b.tag, b.line))
    });
    events
}

/// Flips facts whose sign contradicts the rulebook's sign corrections.
///
/// Zero values are left alone.
#[must_use]
pub fn correct_signs(
    mut facts: Vec<Fact>,
    rulebook: &Rulebook,
) -> (Vec<Fact>, Vec<PrePivotEvent>) {
    let expected: HashMap<&str, bool> = rulebook
        .sign_corrections
        .iter()
        .map(|c| (c.tag.as_str(), c.positive))
        .collect();
    if expected.is_empty() {
        return (facts, Vec::new());
    }

    let mut events = Vec::new();
    for fact in &mut facts {
        let Some(&positive) = expected.get(fact.tag.as_str()) else {
            continue;
        };
        if fact.value != 0.0 && (fact.value > 0.0) != positive {
            events.push(PrePivotEvent::new(
                &rulebook.prefix,
                fact,
                PrePivotAction::SignCorrection,
                None,
            ));
            fact.value = -fact.value;
        }
    }

    if !events.is_empty() {
        debug!(corrected = events.len(), "Corrected fact signs");
    }
    (facts, events)
}
