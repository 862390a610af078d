#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/fsd/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Standardized financial statements from the SEC financial statement data sets.
//!
//! This crate re-exports the core types, the rule engine and the progress
//! stores, and provides a [`PartitionRunner`] that standardizes many
//! independent partitions concurrently and concatenates their bags.
//!
//! # Features
//!
//! - `sqlite` - SQLite-based progress tracking
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fsd::{FilterPipeline, InMemoryProgress, Partition, PartitionRunner, Standardizer, StatementType};
//!
//! #[tokio::main]
//! async fn main() -> fsd::Result<()> {
//!     let runner = PartitionRunner::new(
//!         Standardizer::for_statement(StatementType::BS)?,
//!         FilterPipeline::standard(),
//!         Arc::new(InMemoryProgress::new()),
//!     )
//!     .with_output_dir("out/bs");
//!
//!     let report = runner.run(vec![Partition::new("2024q1", input)]).await?;
//!     println!("{:?}", report.bag.map(|b| b.result().height()));
//!     Ok(())
//! }
//! ```

// Core types and traits
pub use fsd_core::*;

// Rule engine
pub use fsd_rules::{
    CategoryCount, ColumnRules, DEFAULT_MAX_ITERATIONS, ErrorCategory, Filter, FilterPipeline,
    Identity, JoinedTable, PrePivotAction, PrePivotEvent, RawValue, Row, Rule, RuleApplication,
    RuleKind, RuleLog, Rulebook, SignCorrection, SignMode, Source, Stage, Standardized,
    StandardizedRow, Standardizer, StandardizerConfig, Term, ValidationOutcome,
    ValidationThresholds, ZeroCondition,
};

// Progress stores
#[cfg(feature = "sqlite")]
pub use fsd_store::SqliteProgress;
pub use fsd_store::{InMemoryProgress, NoopProgress};

mod runner;
pub use runner::{Partition, PartitionRunner, RunReport};
