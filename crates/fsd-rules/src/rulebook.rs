//! Declarative rule configuration.
//!
//! A [`Rulebook`] is immutable data: the ordered list of canonical columns a
//! standardizer resolves, each with its ordered rule list, plus the
//! identities validated afterwards and the pre-pivot preferences. Adding a
//! canonical column only means appending a [`ColumnRules`] entry; the engine's
//! control flow never changes.

use fsd_core::{Canonical, FsdError, Result, StatementType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::rules::{Rule, RuleKind, Source};
use crate::validation::Identity;

/// Ordered rules for one canonical column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnRules {
    /// Column the rules resolve.
    pub column: Canonical,
    /// Rules in priority order; the first one that fires wins.
    pub rules: Vec<RuleKind>,
}

impl ColumnRules {
    /// Creates a column rule list.
    #[must_use]
    pub const fn new(column: Canonical, rules: Vec<RuleKind>) -> Self {
        Self { column, rules }
    }
}

/// Expected sign of a tag whose filers disagree on presentation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignCorrection {
    /// Raw tag to correct.
    pub tag: String,
    /// Whether the value is expected to be positive.
    pub positive: bool,
}

impl SignCorrection {
    /// A tag expected to be reported as a positive amount.
    #[must_use]
    pub fn positive(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            positive: true,
        }
    }

    /// A tag expected to be reported as a negative amount.
    #[must_use]
    pub fn negative(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            positive: false,
        }
    }
}

/// Rule configuration of one statement type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rulebook {
    /// Statement the rulebook standardizes.
    pub statement: StatementType,
    /// Prefix of every rule id.
    pub prefix: String,
    /// Output columns in resolution order.
    pub columns: Vec<ColumnRules>,
    /// Rules applied once after the main passes.
    #[serde(default)]
    pub post_rules: Vec<ColumnRules>,
    /// Identities validated on the final rows.
    #[serde(default)]
    pub identities: Vec<Identity>,
    /// Families of synonymous tags, most preferred first.
    ///
    /// Facts of different tags in one family that share their context and
    /// value are duplicates; only the most preferred tag is kept.
    #[serde(default)]
    pub dedup_preference: Vec<Vec<String>>,
    /// Tags whose sign is corrected before pivoting.
    #[serde(default)]
    pub sign_corrections: Vec<SignCorrection>,
}

impl Rulebook {
    /// Creates an empty rulebook.
    #[must_use]
    pub fn new(statement: StatementType, prefix: impl Into<String>) -> Self {
        Self {
            statement,
            prefix: prefix.into(),
            columns: Vec::new(),
            post_rules: Vec::new(),
            identities: Vec::new(),
            dedup_preference: Vec::new(),
            sign_corrections: Vec::new(),
        }
    }

    /// Appends an output column with its ordered rules.
    #[must_use]
    pub fn with_column(mut self, column: Canonical, rules: Vec<RuleKind>) -> Self {
        self.columns.push(ColumnRules::new(column, rules));
        self
    }

    /// Appends post-processing rules for a column.
    #[must_use]
    pub fn with_post_rules(mut self, column: Canonical, rules: Vec<RuleKind>) -> Self {
        self.post_rules.push(ColumnRules::new(column, rules));
        self
    }

    /// Appends a validation identity.
    #[must_use]
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identities.push(identity);
        self
    }

    /// Appends a family of synonymous tags, most preferred first.
    #[must_use]
    pub fn with_dedup_family(mut self, tags: &[&str]) -> Self {
        self.dedup_preference
            .push(tags.iter().map(|t| (*t).to_string()).collect());
        self
    }

    /// Appends a sign correction.
    #[must_use]
    pub fn with_sign_correction(mut self, correction: SignCorrection) -> Self {
        self.sign_corrections.push(correction);
        self
    }

    /// Builtin rulebook of a statement type, if one exists.
    #[must_use]
    pub fn for_statement(statement: StatementType) -> Option<Self> {
        match statement {
            StatementType::BS => Some(crate::rulebooks::balance_sheet()),
            StatementType::IS => Some(crate::rulebooks::income_statement()),
            StatementType::CF => Some(crate::rulebooks::cash_flow()),
            _ => None,
        }
    }

    /// Rulebook that copies each column from the raw tag of the same name.
    ///
    /// Standardized output restated as facts passes through it unchanged.
    #[must_use]
    pub fn identity(statement: StatementType, columns: &[Canonical]) -> Self {
        columns.iter().fold(Self::new(statement, "ID"), |book, column| {
            book.with_column(
                *column,
                vec![RuleKind::Copy {
                    source: Source::Tag(column.as_str().to_string()),
                }],
            )
        })
    }

    /// Output columns in resolution order.
    #[must_use]
    pub fn output_columns(&self) -> Vec<Canonical> {
        self.columns.iter().map(|c| c.column).collect()
    }

    /// Prefix of post-processing rule ids.
    #[must_use]
    pub fn post_prefix(&self) -> String {
        format!("{}_Post", self.prefix)
    }

    /// Binds the main rules to their target columns.
    #[must_use]
    pub fn main_rules(&self) -> Vec<(Canonical, Vec<Rule>)> {
        bind(&self.prefix, &self.columns)
    }

    /// Binds the post-processing rules to their target columns.
    #[must_use]
    pub fn bound_post_rules(&self) -> Vec<(Canonical, Vec<Rule>)> {
        bind(&self.post_prefix(), &self.post_rules)
    }

    /// Ids of every rule, main rules first.
    #[must_use]
    pub fn rule_ids(&self) -> Vec<String> {
        self.main_rules()
            .into_iter()
            .chain(self.bound_post_rules())
            .flat_map(|(_, rules)| rules.into_iter().map(|r| r.id().to_string()))
            .collect()
    }

    /// Tags referenced by any rule, as raw inputs.
    #[must_use]
    pub fn referenced_tags(&self) -> BTreeSet<String> {
        let mut tags = BTreeSet::new();
        for kind in self
            .columns
            .iter()
            .chain(&self.post_rules)
            .flat_map(|c| &c.rules)
        {
            match kind {
                RuleKind::Copy {
                    source: Source::Tag(tag),
                }
                | RuleKind::NormalizeSign { tag, .. } => {
                    tags.insert(tag.clone());
                }
                RuleKind::Alias { tags: aliases } => tags.extend(aliases.iter().cloned()),
                _ => {}
            }
        }
        tags
    }

    /// Checks the rulebook for structural errors.
    ///
    /// # Errors
    /// Returns [`FsdError::Rulebook`] if a column is declared twice, a rule has
    /// no operands, a triangle does not involve its target, a post rule or
    /// identity references an undeclared column, or ids collide.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(FsdError::Rulebook(format!("{}: {msg}", self.prefix)));

        if self.prefix.is_empty() {
            return invalid("empty prefix".to_string());
        }
        if self.columns.is_empty() {
            return invalid("no output columns".to_string());
        }

        let mut declared = HashSet::new();
        for entry in &self.columns {
            if !declared.insert(entry.column) {
                return invalid(format!("column {} declared twice", entry.column));
            }
        }

        for entry in self.columns.iter().chain(&self.post_rules) {
            if !declared.contains(&entry.column) {
                return invalid(format!("post rules target undeclared column {}", entry.column));
            }
            for kind in &entry.rules {
                check_kind(entry.column, kind).or_else(|msg| invalid(msg))?;
                if let Some(input) = kind.inputs().into_iter().find(|c| !declared.contains(c)) {
                    return invalid(format!(
                        "rule {} of {} reads undeclared column {input}",
                        kind.label(),
                        entry.column
                    ));
                }
            }
        }

        let mut names = HashSet::new();
        for identity in &self.identities {
            if !names.insert(identity.name.as_str()) {
                return invalid(format!("identity {} declared twice", identity.name));
            }
            let operands =
                std::iter::once(identity.total).chain(identity.terms.iter().map(|t| t.column));
            for column in operands {
                if !declared.contains(&column) {
                    return invalid(format!(
                        "identity {} references undeclared column {column}",
                        identity.name
                    ));
                }
            }
        }

        let mut ids = HashSet::new();
        for id in self.rule_ids() {
            if !ids.insert(id.clone()) {
                return invalid(format!("duplicate rule id {id}"));
            }
        }

        let mut family_tags = HashSet::new();
        for tag in self.dedup_preference.iter().flatten() {
            if !family_tags.insert(tag.as_str()) {
                return invalid(format!("tag {tag} is in more than one dedup family"));
            }
        }

        Ok(())
    }

    /// Parses and validates a rulebook from JSON.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed or the rulebook is invalid.
    pub fn from_json(json: &str) -> Result<Self> {
        let book: Self = serde_json::from_str(json)?;
        book.validate()?;
        Ok(book)
    }

    /// Serializes the rulebook to pretty-printed JSON.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn bind(prefix: &str, columns: &[ColumnRules]) -> Vec<(Canonical, Vec<Rule>)> {
    columns
        .iter()
        .map(|entry| {
            let rules = entry
                .rules
                .iter()
                .map(|kind| Rule::new(prefix, entry.column, kind.clone()))
                .collect();
            (entry.column, rules)
        })
        .collect()
}

fn check_kind(target: Canonical, kind: &RuleKind) -> std::result::Result<(), String> {
    match kind {
        RuleKind::Alias { tags } if tags.is_empty() => {
            Err(format!("alias rule of {target} has no tags"))
        }
        RuleKind::Sum { addends } if addends.is_empty() => {
            Err(format!("sum rule of {target} has no addends"))
        }
        RuleKind::Sum { addends } if addends.contains(&target) => {
            Err(format!("sum rule of {target} reads its own target"))
        }
        RuleKind::Triangle { whole, parts }
            if target != *whole && !parts.contains(&target) =>
        {
            Err(format!(
                "triangle {whole}={}+{} does not involve {target}",
                parts[0], parts[1]
            ))
        }
        RuleKind::Copy {
            source: Source::Column(column),
        } if *column == target => Err(format!("copy rule of {target} reads its own target")),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Term;

    fn small() -> Rulebook {
        Rulebook::new(StatementType::BS, "BS")
            .with_column(
                Canonical::AssetsCurrent,
                vec![RuleKind::Copy {
                    source: Source::Tag("AssetsCurrent".into()),
                }],
            )
            .with_column(
                Canonical::AssetsNoncurrent,
                vec![RuleKind::Copy {
                    source: Source::Tag("AssetsNoncurrent".into()),
                }],
            )
            .with_column(
                Canonical::Assets,
                vec![RuleKind::Triangle {
                    whole: Canonical::Assets,
                    parts: [Canonical::AssetsCurrent, Canonical::AssetsNoncurrent],
                }],
            )
            .with_identity(Identity::new(
                "AssetsCheck",
                Canonical::Assets,
                vec![
                    Term::plus(Canonical::AssetsCurrent),
                    Term::plus(Canonical::AssetsNoncurrent),
                ],
            ))
    }

    #[test]
    fn test_builtins_are_valid() {
        for statement in [StatementType::BS, StatementType::IS, StatementType::CF] {
            let book = Rulebook::for_statement(statement).unwrap();
            assert_eq!(book.statement, statement);
            book.validate().unwrap();
        }
        assert!(Rulebook::for_statement(StatementType::EQ).is_none());
    }

    #[test]
    fn test_rule_ids_are_deterministic() {
        let ids = small().rule_ids();
        assert_eq!(
            ids,
            vec![
                "BS_AssetsCurrent_Copy[AssetsCurrent]",
                "BS_AssetsNoncurrent_Copy[AssetsNoncurrent]",
                "BS_Assets_Triangle[Assets=AssetsCurrent+AssetsNoncurrent]",
            ]
        );
        assert_eq!(ids, small().rule_ids());
    }

    #[test]
    fn test_json_roundtrip() {
        let book = small();
        let json = book.to_json().unwrap();
        let back = Rulebook::from_json(&json).unwrap();
        assert_eq!(back, book);
    }

    #[test]
    fn test_from_json_validates() {
        let json = r#"{
            "statement": "BS",
            "prefix": "BS",
            "columns": [
                {"column": "Cash", "rules": [
                    {"kind": "triangle", "whole": "Assets", "parts": ["AssetsCurrent", "AssetsNoncurrent"]}
                ]}
            ]
        }"#;
        let err = Rulebook::from_json(json).unwrap_err();
        assert!(matches!(err, FsdError::Rulebook(_)));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let book = small().with_column(Canonical::Assets, vec![]);
        assert!(book.validate().is_err());
    }

    #[test]
    fn test_identity_must_reference_declared_columns() {
        let book = small().with_identity(Identity::new(
            "Broken",
            Canonical::Liabilities,
            vec![Term::plus(Canonical::Equity)],
        ));
        assert!(book.validate().is_err());
    }

    #[test]
    fn test_post_rules_use_post_prefix() {
        let book = small().with_post_rules(
            Canonical::AssetsNoncurrent,
            vec![RuleKind::DefaultZero {
                when: crate::rules::ZeroCondition::AllPresent(vec![Canonical::Assets]),
            }],
        );
        book.validate().unwrap();
        let post = book.bound_post_rules();
        assert!(post[0].1[0].id().starts_with("BS_Post_AssetsNoncurrent_"));
    }

    #[test]
    fn test_identity_rulebook() {
        let book = Rulebook::identity(StatementType::BS, &[Canonical::Assets, Canonical::Cash]);
        book.validate().unwrap();
        assert_eq!(book.output_columns(), vec![Canonical::Assets, Canonical::Cash]);
        assert!(book.referenced_tags().contains("Cash"));
    }
}
