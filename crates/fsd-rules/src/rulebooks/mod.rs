//! Builtin rulebooks.
//!
//! Tag choices and priorities reflect how filers report the statements in
//! the quarterly financial statement data sets.

mod balance_sheet;
mod cash_flow;
mod income_statement;

pub use balance_sheet::balance_sheet;
pub use cash_flow::cash_flow;
pub use income_statement::income_statement;

use fsd_core::Canonical;

use crate::rules::{RuleKind, SignMode, Source, ZeroCondition};
use crate::validation::Term;

fn tag(name: &str) -> RuleKind {
    RuleKind::Copy {
        source: Source::Tag(name.to_string()),
    }
}

fn column(column: Canonical) -> RuleKind {
    RuleKind::Copy {
        source: Source::Column(column),
    }
}

fn alias(tags: &[&str]) -> RuleKind {
    RuleKind::Alias {
        tags: tags.iter().map(|t| (*t).to_string()).collect(),
    }
}

fn sum(addends: &[Canonical]) -> RuleKind {
    RuleKind::Sum {
        addends: addends.to_vec(),
    }
}

fn triangle(whole: Canonical, a: Canonical, b: Canonical) -> RuleKind {
    RuleKind::Triangle {
        whole,
        parts: [a, b],
    }
}

fn zero_if_equal(a: Canonical, b: Canonical) -> RuleKind {
    RuleKind::DefaultZero {
        when: ZeroCondition::Equal(a, b),
    }
}

fn zero_if_all(columns: &[Canonical]) -> RuleKind {
    RuleKind::DefaultZero {
        when: ZeroCondition::AllPresent(columns.to_vec()),
    }
}

fn zero_if_any(columns: &[Canonical]) -> RuleKind {
    RuleKind::DefaultZero {
        when: ZeroCondition::AnyPresent(columns.to_vec()),
    }
}

fn positive(name: &str) -> RuleKind {
    RuleKind::NormalizeSign {
        tag: name.to_string(),
        mode: SignMode::Positive,
    }
}

fn plus(columns: &[Canonical]) -> Vec<Term> {
    columns.iter().copied().map(Term::plus).collect()
}
