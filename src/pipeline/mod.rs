use std::path::PathBuf;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use log::{info, warn};
use tokio::time::timeout;

use crate::cache::{ThumbnailCache, ThumbnailOutcome};
use crate::models::ImageRecord;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub max_concurrent: usize,
    pub task_timeout: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_concurrent: 8,
            task_timeout: Duration::from_secs(30),
        }
    }
}

/// Per-run counters. A batch with failures is still a finished batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub without_locator: usize,
    pub hits: usize,
    pub created: usize,
    pub failed: usize,
    pub timed_out: usize,
}

impl BatchSummary {
    pub fn with_thumbnail(&self) -> usize {
        self.hits + self.created
    }
}

enum TaskResult {
    Done(ThumbnailOutcome),
    TimedOut,
}

/// Ensures a thumbnail for every record that has a locator and returns the
/// records, in input order, with `thumbnail_path` filled in where one exists.
pub async fn build_thumbnails(
    records: Vec<ImageRecord>,
    cache: &ThumbnailCache,
    options: &BatchOptions,
) -> (Vec<ImageRecord>, BatchSummary) {
    let mut summary = BatchSummary {
        total: records.len(),
        ..BatchSummary::default()
    };

    let pending: Vec<(usize, &str, &str)> = records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| {
            record
                .source_url
                .as_deref()
                .map(|url| (index, record.id.as_str(), url))
        })
        .collect();
    summary.without_locator = records.len() - pending.len();

    let workers = options.max_concurrent.max(1).min(pending.len().max(1));
    info!(
        "Building thumbnails for {} of {} records with {} workers",
        pending.len(),
        records.len(),
        workers
    );

    let task_timeout = options.task_timeout;
    let results: Vec<(usize, TaskResult)> = stream::iter(pending)
        .map(|(index, id, url)| async move {
            match timeout(task_timeout, cache.ensure(id, url)).await {
                Ok(outcome) => (index, TaskResult::Done(outcome)),
                Err(_) => {
                    warn!("Thumbnail for '{}' timed out after {:?}", id, task_timeout);
                    (index, TaskResult::TimedOut)
                }
            }
        })
        .buffer_unordered(workers)
        .collect()
        .await;

    let mut paths: Vec<Option<PathBuf>> = vec![None; records.len()];
    for (index, result) in results {
        match result {
            TaskResult::Done(ThumbnailOutcome::Hit(path)) => {
                summary.hits += 1;
                paths[index] = Some(path);
            }
            TaskResult::Done(ThumbnailOutcome::Created(path)) => {
                summary.created += 1;
                paths[index] = Some(path);
            }
            TaskResult::Done(ThumbnailOutcome::Failed) => summary.failed += 1,
            TaskResult::TimedOut => summary.timed_out += 1,
        }
    }

    let records = records
        .into_iter()
        .zip(paths)
        .map(|(record, path)| record.with_thumbnail(path))
        .collect();

    info!(
        "Thumbnail batch finished: {} cached, {} created, {} failed, {} timed out, {} without locator",
        summary.hits, summary.created, summary.failed, summary.timed_out, summary.without_locator
    );

    (records, summary)
}
