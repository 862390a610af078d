#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/fsd/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core types for standardizing SEC financial statement data sets.
//!
//! This crate provides the shared vocabulary of the standardizer:
//!
//! - [`Fact`](types::Fact) and [`ReportMeta`](types::ReportMeta) - Typed input rows
//! - [`Canonical`](columns::Canonical) - The closed set of output line items
//! - [`StandardizedBag`](bag::StandardizedBag) - The persistable output artifact
//! - [`ProgressStore`](progress::ProgressStore) - Partition progress tracking

/// Standardized bag and its persistence.
pub mod bag;
/// Canonical output columns.
pub mod columns;
/// Error types for standardization.
pub mod error;
/// Fiscal period codes.
pub mod period;
/// Partition progress tracking.
pub mod progress;
/// Core data types (facts, report metadata, context keys).
pub mod types;

// Re-export commonly used items at crate root
pub use bag::{ConcatPolicy, REPORT_ID_COLUMN, StandardizedBag};
pub use columns::Canonical;
pub use error::{FsdError, Result};
pub use period::FiscalPeriod;
pub use progress::{PartitionRecord, ProgressStore};
pub use types::{ContextKey, Fact, ReportId, ReportMeta, StatementType};
