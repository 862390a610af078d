#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/fsd/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Progress stores for partitioned standardization runs.
//!
//! This crate provides implementations of the [`ProgressStore`] trait from `fsd-core`:
//!
//! - [`SqliteProgress`] - Persistent SQLite-based store (default, requires `sqlite` feature)
//! - [`InMemoryProgress`] - Simple in-memory store for testing
//! - [`NoopProgress`] - Store that never remembers a partition

/// In-memory progress store.
pub mod memory;
/// No-op progress store.
pub mod noop;

/// SQLite-based progress store.
#[cfg(feature = "sqlite")]
pub mod sqlite;

// Re-export the trait for convenience
pub use fsd_core::ProgressStore;

pub use memory::InMemoryProgress;
pub use noop::NoopProgress;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteProgress;
