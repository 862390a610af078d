//! Concurrent, resumable standardization of many partitions.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use fsd_core::{ConcatPolicy, FsdError, ProgressStore, Result, StandardizedBag};
use fsd_rules::{FilterPipeline, JoinedTable, Standardizer};

/// An independent unit of work, typically one quarterly data set.
#[derive(Clone, Debug)]
pub struct Partition {
    /// Partition identifier, used for progress tracking and as the output
    /// directory name. Must be non-empty, unique within a run and free of
    /// path separators.
    pub id: String,
    /// Joined input of the partition.
    pub input: JoinedTable,
}

impl Partition {
    /// Creates a partition.
    #[must_use]
    pub fn new(id: impl Into<String>, input: JoinedTable) -> Self {
        Self {
            id: id.into(),
            input,
        }
    }
}

/// Outcome of [`PartitionRunner::run`].
#[derive(Debug)]
pub struct RunReport {
    /// Concatenation of all partition bags, in input order. `None` if no bag
    /// was produced or loaded.
    pub bag: Option<StandardizedBag>,
    /// Partitions standardized in this run.
    pub processed: Vec<String>,
    /// Partitions skipped because they were already completed.
    pub skipped: Vec<String>,
}

/// Runs one [`Standardizer`] over many partitions.
///
/// Each partition runs on the blocking thread pool, at most `concurrency` at
/// a time. A partition is marked completed in the progress store only after
/// its bag was produced and, with an output directory, saved. Completed
/// partitions are skipped on later runs; their saved bags are loaded back so
/// the concatenated result still covers them.
pub struct PartitionRunner {
    standardizer: Arc<Standardizer>,
    filters: Arc<FilterPipeline>,
    progress: Arc<dyn ProgressStore>,
    concurrency: usize,
    output_dir: Option<PathBuf>,
    policy: ConcatPolicy,
}

impl std::fmt::Debug for PartitionRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionRunner")
            .field("statement", &self.standardizer.statement())
            .field("filters", &self.filters)
            .field("concurrency", &self.concurrency)
            .field("output_dir", &self.output_dir)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl PartitionRunner {
    /// Creates a runner with one partition per available CPU.
    #[must_use]
    pub fn new(
        standardizer: Standardizer,
        filters: FilterPipeline,
        progress: Arc<dyn ProgressStore>,
    ) -> Self {
        let concurrency = std::thread::available_parallelism().map_or(1, usize::from);
        Self {
            standardizer: Arc::new(standardizer),
            filters: Arc::new(filters),
            progress,
            concurrency,
            output_dir: None,
            policy: ConcatPolicy::strict(),
        }
    }

    /// Sets the maximum number of partitions processed at once (at least 1).
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Saves each partition bag under `<dir>/<partition>`.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Sets how duplicate report ids across partitions are treated.
    #[must_use]
    pub const fn with_concat_policy(mut self, policy: ConcatPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Directory a partition's bag is saved in, if an output directory is set.
    #[must_use]
    pub fn partition_dir(&self, partition: &str) -> Option<PathBuf> {
        self.output_dir.as_ref().map(|dir| dir.join(partition))
    }

    /// Standardizes all partitions and concatenates their bags.
    ///
    /// Every partition task runs to completion before the first error, if
    /// any, is returned, so partitions that succeeded stay marked completed.
    ///
    /// # Errors
    /// Returns [`FsdError::InvalidParameter`] before any work starts if a
    /// partition id is empty, repeated, or not a plain directory name.
    /// Otherwise returns the first partition error, a progress store error,
    /// or a concatenation error.
    #[instrument(skip_all, fields(statement = %self.standardizer.statement(), partitions = partitions.len()))]
    pub async fn run(&self, partitions: Vec<Partition>) -> Result<RunReport> {
        check_partition_ids(&partitions)?;
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = Vec::with_capacity(partitions.len());

        for partition in partitions {
            let output = self.partition_dir(&partition.id);
            if self.progress.is_completed(&partition.id).await? {
                debug!(partition = %partition.id, "Skipping completed partition");
                tasks.push(tokio::spawn(load_completed(partition.id, output)));
                continue;
            }

            let semaphore = Arc::clone(&semaphore);
            let standardizer = Arc::clone(&self.standardizer);
            let filters = Arc::clone(&self.filters);
            let progress = Arc::clone(&self.progress);
            tasks.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| FsdError::Other(e.to_string()))?;
                let Partition { id, input } = partition;
                let bag = tokio::task::spawn_blocking(move || {
                    let bag = standardizer.process(&input, &filters)?;
                    if let Some(path) = &output {
                        bag.save(path)?;
                    }
                    Ok::<_, FsdError>(bag)
                })
                .await
                .map_err(|e| FsdError::Other(e.to_string()))??;

                let rows = bag.result().height();
                progress.mark_completed(&id, rows).await?;
                info!(partition = %id, rows, "Partition completed");
                Ok::<_, FsdError>(Done {
                    id,
                    bag: Some(bag),
                    skipped: false,
                })
            }));
        }

        let mut bags = Vec::new();
        let mut processed = Vec::new();
        let mut skipped = Vec::new();
        let mut first_error = None;
        for joined in join_all(tasks).await {
            match joined.map_err(|e| FsdError::Other(e.to_string())) {
                Ok(Ok(done)) => {
                    if done.skipped {
                        skipped.push(done.id);
                    } else {
                        processed.push(done.id);
                    }
                    bags.extend(done.bag);
                }
                Ok(Err(e)) | Err(e) => {
                    warn!(error = %e, "Partition failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        let bag = if bags.is_empty() {
            None
        } else {
            Some(StandardizedBag::concat(&bags, self.policy)?)
        };
        info!(
            processed = processed.len(),
            skipped = skipped.len(),
            "Run complete"
        );
        Ok(RunReport {
            bag,
            processed,
            skipped,
        })
    }
}

fn check_partition_ids(partitions: &[Partition]) -> Result<()> {
    let mut seen = HashSet::with_capacity(partitions.len());
    for partition in partitions {
        let id = partition.id.as_str();
        if id.is_empty() || id == "." || id.contains("..") || id.contains(['/', '\\']) {
            return Err(FsdError::InvalidParameter(format!("Invalid partition id: {id:?}")));
        }
        if !seen.insert(id) {
            return Err(FsdError::InvalidParameter(format!("Duplicate partition id: {id}")));
        }
    }
    Ok(())
}

struct Done {
    id: String,
    bag: Option<StandardizedBag>,
    skipped: bool,
}

async fn load_completed(id: String, output: Option<PathBuf>) -> Result<Done> {
    let bag = match output {
        Some(path) => tokio::task::spawn_blocking(move || load_if_saved(&path))
            .await
            .map_err(|e| FsdError::Other(e.to_string()))??,
        None => None,
    };
    Ok(Done {
        id,
        bag,
        skipped: true,
    })
}

fn load_if_saved(path: &Path) -> Result<Option<StandardizedBag>> {
    if path.is_dir() {
        StandardizedBag::load(path).map(Some)
    } else {
        warn!(path = %path.display(), "Completed partition has no saved bag");
        Ok(None)
    }
}
