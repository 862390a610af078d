//! Progress tracking for partitioned standardization runs.
//!
//! A full-dataset run is split into independent partitions (typically one
//! quarterly data set each). The [`ProgressStore`] trait records which
//! partitions finished so an interrupted run restarts at the first partition
//! that did not complete instead of reprocessing everything.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A partition that completed successfully.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionRecord {
    /// Partition identifier (e.g. `2024q1`).
    pub partition: String,
    /// Number of standardized rows the partition produced.
    pub rows: usize,
    /// When the partition was marked completed.
    pub completed_at: DateTime<Utc>,
}

impl PartitionRecord {
    /// Creates a record completed now.
    #[must_use]
    pub fn new(partition: impl Into<String>, rows: usize) -> Self {
        Self {
            partition: partition.into(),
            rows,
            completed_at: Utc::now(),
        }
    }
}

/// Trait for recording completed partitions.
///
/// Partition granularity is the unit of retry: a partition is either marked
/// completed after its bag was produced, or it is processed again.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Returns true if the partition was already marked completed.
    async fn is_completed(&self, partition: &str) -> Result<bool>;

    /// Marks a partition as completed with the number of rows it produced.
    ///
    /// Marking an already completed partition replaces its record.
    async fn mark_completed(&self, partition: &str, rows: usize) -> Result<()>;

    /// Returns all completed partitions ordered by partition id.
    async fn completed(&self) -> Result<Vec<PartitionRecord>>;

    /// Forgets all progress.
    async fn clear(&self) -> Result<()>;
}
