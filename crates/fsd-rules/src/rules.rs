//! Rule primitives.
//!
//! Every rule targets exactly one canonical column. Evaluating a rule is a
//! pure function of the row: it either yields the value the target should
//! take, or nothing. A rule never yields a value for a target that is already
//! resolved, so applying a rule twice is a no-op and the order of a column's
//! rule list encodes priority.

use fsd_core::Canonical;
use serde::{Deserialize, Serialize};

use crate::row::{Row, approx_eq};

/// Where a copy rule reads its value from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// A raw tag reported by the filer.
    Tag(String),
    /// Another canonical column.
    Column(Canonical),
}

/// Condition under which a column legitimately defaults to zero.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroCondition {
    /// At least one of the columns is resolved.
    AnyPresent(Vec<Canonical>),
    /// All of the columns are resolved.
    AllPresent(Vec<Canonical>),
    /// Both columns are resolved and hold the same value.
    Equal(Canonical, Canonical),
}

impl ZeroCondition {
    fn holds(&self, row: &Row) -> bool {
        match self {
            Self::AnyPresent(columns) => columns.iter().any(|c| row.is_set(*c)),
            Self::AllPresent(columns) => {
                !columns.is_empty() && columns.iter().all(|c| row.is_set(*c))
            }
            Self::Equal(a, b) => match (row.get(*a), row.get(*b)) {
                (Some(a), Some(b)) => approx_eq(a, b),
                _ => false,
            },
        }
    }

    fn label(&self) -> String {
        match self {
            Self::AnyPresent(columns) => format!("any:{}", join(columns, ",")),
            Self::AllPresent(columns) => format!("all:{}", join(columns, ",")),
            Self::Equal(a, b) => format!("{a}=={b}"),
        }
    }
}

/// Sign convention applied by [`RuleKind::NormalizeSign`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignMode {
    /// Flip the value when the presentation line is negating.
    Negating,
    /// Always take the magnitude.
    Positive,
    /// Always take the negated magnitude.
    Negative,
}

/// The closed set of rule primitives.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleKind {
    /// Copy a raw tag or another column.
    Copy {
        /// Value to copy.
        source: Source,
    },
    /// First present raw tag, in listed priority order.
    Alias {
        /// Candidate tags, most preferred first.
        tags: Vec<String>,
    },
    /// Sum of the addends, only if every addend is resolved.
    Sum {
        /// Columns to add up.
        addends: Vec<Canonical>,
    },
    /// Derive the missing term of `whole = parts[0] + parts[1]`.
    ///
    /// The target must be one of the three terms and the other two must be
    /// resolved.
    Triangle {
        /// The total of the identity.
        whole: Canonical,
        /// The two components of the identity.
        parts: [Canonical; 2],
    },
    /// Zero, if the condition holds.
    DefaultZero {
        /// Condition implying the column is legitimately zero.
        when: ZeroCondition,
    },
    /// Copy a raw tag, normalizing its sign.
    NormalizeSign {
        /// Raw tag to read.
        tag: String,
        /// Sign convention to apply.
        mode: SignMode,
    },
}

impl RuleKind {
    /// Short name of the primitive.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Copy { .. } => "Copy",
            Self::Alias { .. } => "Alias",
            Self::Sum { .. } => "Sum",
            Self::Triangle { .. } => "Triangle",
            Self::DefaultZero { .. } => "DefaultZero",
            Self::NormalizeSign { .. } => "NormalizeSign",
        }
    }

    /// Label including the operands, used to build rule ids.
    #[must_use]
    pub fn label(&self) -> String {
        let operands = match self {
            Self::Copy {
                source: Source::Tag(tag),
            } => tag.clone(),
            Self::Copy {
                source: Source::Column(column),
            } => format!("={column}"),
            Self::Alias { tags } => tags.join("|"),
            Self::Sum { addends } => join(addends, "+"),
            Self::Triangle { whole, parts } => format!("{whole}={}+{}", parts[0], parts[1]),
            Self::DefaultZero { when } => when.label(),
            Self::NormalizeSign { tag, mode } => format!("{tag}:{mode:?}"),
        };
        format!("{}[{operands}]", self.name())
    }

    /// Canonical columns the rule reads.
    #[must_use]
    pub fn inputs(&self) -> Vec<Canonical> {
        match self {
            Self::Copy {
                source: Source::Column(column),
            } => vec![*column],
            Self::Copy { .. } | Self::Alias { .. } | Self::NormalizeSign { .. } => Vec::new(),
            Self::Sum { addends } => addends.clone(),
            Self::Triangle { whole, parts } => vec![*whole, parts[0], parts[1]],
            Self::DefaultZero { when } => match when {
                ZeroCondition::AnyPresent(columns) | ZeroCondition::AllPresent(columns) => {
                    columns.clone()
                }
                ZeroCondition::Equal(a, b) => vec![*a, *b],
            },
        }
    }

    fn evaluate(&self, target: Canonical, row: &Row) -> Option<f64> {
        match self {
            Self::Copy {
                source: Source::Tag(tag),
            } => row.raw(tag).map(|raw| raw.value),
            Self::Copy {
                source: Source::Column(column),
            } => row.get(*column),
            Self::Alias { tags } => tags.iter().find_map(|tag| row.raw(tag)).map(|raw| raw.value),
            Self::Sum { addends } => {
                if addends.is_empty() {
                    return None;
                }
                addends
                    .iter()
                    .map(|c| row.get(*c))
                    .sum::<Option<f64>>()
            }
            Self::Triangle { whole, parts } => {
                let [a, b] = *parts;
                if target == *whole {
                    Some(row.get(a)? + row.get(b)?)
                } else if target == a {
                    Some(row.get(*whole)? - row.get(b)?)
                } else if target == b {
                    Some(row.get(*whole)? - row.get(a)?)
                } else {
                    None
                }
            }
            Self::DefaultZero { when } => when.holds(row).then_some(0.0),
            Self::NormalizeSign { tag, mode } => {
                let raw = row.raw(tag)?;
                Some(match mode {
                    SignMode::Negating if raw.negating => -raw.value,
                    SignMode::Negating => raw.value,
                    SignMode::Positive => raw.value.abs(),
                    SignMode::Negative => -raw.value.abs(),
                })
            }
        }
    }
}

fn join(columns: &[Canonical], sep: &str) -> String {
    columns
        .iter()
        .map(Canonical::as_str)
        .collect::<Vec<_>>()
        .join(sep)
}

/// A rule bound to its target column, with a stable id for provenance.
#[derive(Clone, Debug, PartialEq)]
pub struct Rule {
    id: String,
    target: Canonical,
    kind: RuleKind,
}

impl Rule {
    /// Creates a rule; the id is `<prefix>_<target>_<label>`.
    #[must_use]
    pub fn new(prefix: &str, target: Canonical, kind: RuleKind) -> Self {
        let id = format!("{prefix}_{target}_{}", kind.label());
        Self { id, target, kind }
    }

    /// Provenance id of the rule.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Column the rule sets.
    #[must_use]
    pub const fn target(&self) -> Canonical {
        self.target
    }

    /// The primitive this rule applies.
    #[must_use]
    pub const fn kind(&self) -> &RuleKind {
        &self.kind
    }

    /// Value the rule would set, or `None` if its precondition does not hold
    /// or the target is already resolved.
    #[must_use]
    pub fn evaluate(&self, row: &Row) -> Option<f64> {
        if row.is_set(self.target) {
            return None;
        }
        self.kind
            .evaluate(self.target, row)
            .filter(|value| value.is_finite())
    }

    /// Applies the rule to the row; returns true if it set the target.
    pub fn apply(&self, row: &mut Row) -> bool {
        match self.evaluate(row) {
            Some(value) => row.set(self.target, value),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::RawValue;

    fn row(raw: &[(&str, f64)], values: &[(Canonical, f64)]) -> Row {
        let mut row = Row::from_raw(raw.iter().map(|(t, v)| (*t, RawValue::new(*v))));
        for (c, v) in values {
            row.set(*c, *v);
        }
        row
    }

    #[test]
    fn test_copy_tag() {
        let rule = Rule::new(
            "BS",
            Canonical::Assets,
            RuleKind::Copy {
                source: Source::Tag("Assets".into()),
            },
        );
        let mut r = row(&[("Assets", 42.0)], &[]);
        assert!(rule.apply(&mut r));
        assert_eq!(r.get(Canonical::Assets), Some(42.0));
        assert_eq!(rule.id(), "BS_Assets_Copy[Assets]");

        let mut missing = row(&[], &[]);
        assert!(!rule.apply(&mut missing));
    }

    #[test]
    fn test_copy_does_not_overwrite() {
        let rule = Rule::new(
            "BS",
            Canonical::Assets,
            RuleKind::Copy {
                source: Source::Tag("Assets".into()),
            },
        );
        let mut r = row(&[("Assets", 42.0)], &[(Canonical::Assets, 7.0)]);
        assert!(rule.evaluate(&r).is_none());
        assert!(!rule.apply(&mut r));
        assert_eq!(r.get(Canonical::Assets), Some(7.0));
    }

    #[test]
    fn test_alias_takes_first_present() {
        let rule = Rule::new(
            "IS",
            Canonical::Revenues,
            RuleKind::Alias {
                tags: vec!["Revenues".into(), "SalesRevenueNet".into(), "Other".into()],
            },
        );
        let r = row(&[("Other", 3.0), ("SalesRevenueNet", 2.0)], &[]);
        assert_eq!(rule.evaluate(&r), Some(2.0));
    }

    #[test]
    fn test_sum_requires_all_addends() {
        let rule = Rule::new(
            "BS",
            Canonical::Equity,
            RuleKind::Sum {
                addends: vec![Canonical::HolderEquity, Canonical::MinorityInterest],
            },
        );
        assert_eq!(rule.id(), "BS_Equity_Sum[HolderEquity+MinorityInterest]");
        let partial = row(&[], &[(Canonical::HolderEquity, 10.0)]);
        assert!(rule.evaluate(&partial).is_none());

        let full = row(
            &[],
            &[(Canonical::HolderEquity, 10.0), (Canonical::MinorityInterest, 2.5)],
        );
        assert_eq!(rule.evaluate(&full), Some(12.5));
    }

    #[test]
    fn test_triangle_completes_each_term() {
        let kind = RuleKind::Triangle {
            whole: Canonical::Assets,
            parts: [Canonical::AssetsCurrent, Canonical::AssetsNoncurrent],
        };

        let whole = Rule::new("BS", Canonical::Assets, kind.clone());
        let r = row(
            &[],
            &[(Canonical::AssetsCurrent, 100.0), (Canonical::AssetsNoncurrent, 50.0)],
        );
        assert_eq!(whole.evaluate(&r), Some(150.0));

        let part_b = Rule::new("BS", Canonical::AssetsNoncurrent, kind.clone());
        let r = row(
            &[],
            &[(Canonical::Assets, 150.0), (Canonical::AssetsCurrent, 100.25)],
        );
        let value = part_b.evaluate(&r).unwrap();
        assert!((value - 49.75).abs() < 1e-6);

        let part_a = Rule::new("BS", Canonical::AssetsCurrent, kind.clone());
        let r = row(
            &[],
            &[(Canonical::Assets, 150.0), (Canonical::AssetsNoncurrent, 30.0)],
        );
        assert_eq!(part_a.evaluate(&r), Some(120.0));

        let only_one = row(&[], &[(Canonical::Assets, 150.0)]);
        assert!(part_a.evaluate(&only_one).is_none());

        let unrelated = Rule::new("BS", Canonical::Cash, kind);
        let full = row(
            &[],
            &[(Canonical::Assets, 1.0), (Canonical::AssetsCurrent, 1.0)],
        );
        assert!(unrelated.evaluate(&full).is_none());
    }

    #[test]
    fn test_default_zero_needs_condition() {
        let rule = Rule::new(
            "BS",
            Canonical::MinorityInterest,
            RuleKind::DefaultZero {
                when: ZeroCondition::Equal(Canonical::Equity, Canonical::HolderEquity),
            },
        );
        assert!(rule.evaluate(&row(&[], &[])).is_none());

        let different = row(
            &[],
            &[(Canonical::Equity, 10.0), (Canonical::HolderEquity, 8.0)],
        );
        assert!(rule.evaluate(&different).is_none());

        let equal = row(
            &[],
            &[(Canonical::Equity, 10.0), (Canonical::HolderEquity, 10.0)],
        );
        assert_eq!(rule.evaluate(&equal), Some(0.0));

        let any = Rule::new(
            "CF",
            Canonical::EffectOfExchangeRateChanges,
            RuleKind::DefaultZero {
                when: ZeroCondition::AllPresent(vec![]),
            },
        );
        assert!(any.evaluate(&equal).is_none());
    }

    #[test]
    fn test_normalize_sign() {
        let mut r = Row::new();
        r.insert_raw("TreasuryStockValue", RawValue::with_negating(-5.0, true));
        r.insert_raw("Flipped", RawValue::with_negating(5.0, true));
        r.insert_raw("Plain", RawValue::with_negating(5.0, false));

        let eval = |tag: &str, mode| {
            Rule::new(
                "BS",
                Canonical::TreasuryStockValue,
                RuleKind::NormalizeSign {
                    tag: tag.into(),
                    mode,
                },
            )
            .evaluate(&r)
        };

        assert_eq!(eval("TreasuryStockValue", SignMode::Positive), Some(5.0));
        assert_eq!(eval("Plain", SignMode::Negative), Some(-5.0));
        assert_eq!(eval("Flipped", SignMode::Negating), Some(-5.0));
        assert_eq!(eval("Plain", SignMode::Negating), Some(5.0));
        assert_eq!(eval("Missing", SignMode::Positive), None);
    }

    #[test]
    fn test_rule_kind_json() {
        let kind = RuleKind::Triangle {
            whole: Canonical::Assets,
            parts: [Canonical::AssetsCurrent, Canonical::AssetsNoncurrent],
        };
        let json = serde_json::to_string(&kind).unwrap();
        assert!(json.contains("\"kind\":\"triangle\""));
        let back: RuleKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kind);
    }
}
