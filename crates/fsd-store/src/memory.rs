//! In-memory progress store.

use async_trait::async_trait;
use fsd_core::{PartitionRecord, ProgressStore, Result};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Progress kept in a `RwLock`-protected map; lost when the store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryProgress {
    partitions: RwLock<BTreeMap<String, PartitionRecord>>,
}

impl InMemoryProgress {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressStore for InMemoryProgress {
    async fn is_completed(&self, partition: &str) -> Result<bool> {
        Ok(self.partitions.read().await.contains_key(partition))
    }

    #[instrument(skip(self))]
    async fn mark_completed(&self, partition: &str, rows: usize) -> Result<()> {
        self.partitions
            .write()
            .await
            .insert(partition.to_string(), PartitionRecord::new(partition, rows));
        debug!("Marked partition completed");
        Ok(())
    }

    async fn completed(&self) -> Result<Vec<PartitionRecord>> {
        Ok(self.partitions.read().await.values().cloned().collect())
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        self.partitions.write().await.clear();
        debug!("Cleared progress");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mark_and_query() {
        let store = InMemoryProgress::new();
        assert!(!store.is_completed("2024q1").await.unwrap());

        store.mark_completed("2024q2", 7).await.unwrap();
        store.mark_completed("2024q1", 5).await.unwrap();
        assert!(store.is_completed("2024q1").await.unwrap());

        let done = store.completed().await.unwrap();
        let ids: Vec<_> = done.iter().map(|r| r.partition.as_str()).collect();
        assert_eq!(ids, vec!["2024q1", "2024q2"]);
        assert_eq!(done[0].rows, 5);
    }

    #[tokio::test]
    async fn test_remark_replaces_record() {
        let store = InMemoryProgress::new();
        store.mark_completed("2024q1", 5).await.unwrap();
        store.mark_completed("2024q1", 9).await.unwrap();

        let done = store.completed().await.unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].rows, 9);
    }

    #[tokio::test]
    async fn test_clear() {
        let store = InMemoryProgress::new();
        store.mark_completed("2024q1", 5).await.unwrap();
        store.clear().await.unwrap();
        assert!(!store.is_completed("2024q1").await.unwrap());
        assert!(store.completed().await.unwrap().is_empty());
    }
}
