#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/fsd/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Rule engine for standardizing financial statements.
//!
//! - [`Standardizer`] - Resolves canonical columns for one statement type
//! - [`Rulebook`] - Declarative, ordered rules per canonical column
//! - [`FilterPipeline`] - Explicit, composable fact filters
//! - [`Identity`] - Accounting identities checked on every row

/// Engine configuration.
pub mod config;
/// Multi-pass rule resolution and the applied rules log.
pub mod engine;
/// Composable fact filters.
pub mod filter;
/// Conversion of engine output into bag tables.
pub mod frames;
/// Decoding and joining of the input tables.
pub mod input;
/// Long to wide pivoting of facts.
pub mod pivot;
/// De-duplication and sign correction before pivoting.
pub mod prepivot;
/// Per-context working rows.
pub mod row;
/// Rulebook definitions and their checks.
pub mod rulebook;
/// Builtin rulebooks per statement type.
pub mod rulebooks;
/// Rule primitives.
pub mod rules;
/// Accounting identity validation.
pub mod validation;

pub use config::{DEFAULT_MAX_ITERATIONS, StandardizerConfig};
pub use engine::{RuleApplication, RuleLog, Stage, Standardized, StandardizedRow, Standardizer};
pub use filter::{Filter, FilterPipeline};
pub use input::JoinedTable;
pub use prepivot::{PrePivotAction, PrePivotEvent};
pub use row::{RawValue, Row};
pub use rulebook::{ColumnRules, Rulebook, SignCorrection};
pub use rules::{Rule, RuleKind, SignMode, Source, ZeroCondition};
pub use validation::{
    CategoryCount, ErrorCategory, Identity, Term, ValidationOutcome, ValidationThresholds,
};
