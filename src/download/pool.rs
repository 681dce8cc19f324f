//! Bounded worker pool for download units.
//!
//! Every submitted unit is spawned immediately and waits for one of `size`
//! semaphore permits, so submission never blocks the caller. Outcomes are
//! collected when the pool is joined, in completion order.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::Error;
use crate::model::Song;

/// Shared shutdown request.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Live counters, readable from any thread. Values only ever grow.
#[derive(Debug, Default)]
pub struct Progress {
    submitted: AtomicUsize,
    downloaded: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

/// Point-in-time copy of [`Progress`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub submitted: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ProgressSnapshot {
    /// Units that reached a final state.
    pub fn finished(&self) -> usize {
        self.downloaded + self.skipped + self.failed
    }
}

impl Progress {
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            downloaded: self.downloaded.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record(&self, outcome: &DownloadOutcome) {
        let counter = match outcome {
            DownloadOutcome::Downloaded { .. } => &self.downloaded,
            DownloadOutcome::Skipped { .. } => &self.skipped,
            DownloadOutcome::Failed { .. } | DownloadOutcome::Cancelled { .. } => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Final state of one unit.
#[derive(Debug)]
pub enum DownloadOutcome {
    Downloaded { song: Song, path: PathBuf },
    /// The file was already present
    Skipped { song: Song, path: PathBuf },
    Failed { song: Song, error: Error },
    Cancelled { song: Song },
}

impl DownloadOutcome {
    pub fn song(&self) -> &Song {
        match self {
            Self::Downloaded { song, .. }
            | Self::Skipped { song, .. }
            | Self::Failed { song, .. }
            | Self::Cancelled { song } => song,
        }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Downloaded { path, .. } | Self::Skipped { path, .. } => Some(path),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Downloaded { .. } | Self::Skipped { .. })
    }
}

/// Every outcome of a batch.
#[derive(Debug, Default)]
pub struct DownloadReport {
    pub outcomes: Vec<DownloadOutcome>,
}

impl DownloadReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn downloaded(&self) -> usize {
        self.count(|o| matches!(o, DownloadOutcome::Downloaded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, DownloadOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, DownloadOutcome::Failed { .. }))
    }

    pub fn cancelled(&self) -> usize {
        self.count(|o| matches!(o, DownloadOutcome::Cancelled { .. }))
    }

    fn count(&self, pred: impl Fn(&DownloadOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Song, &Error)> {
        self.outcomes.iter().filter_map(|o| match o {
            DownloadOutcome::Failed { song, error } => Some((song, error)),
            _ => None,
        })
    }

    pub fn extend(&mut self, other: DownloadReport) {
        self.outcomes.extend(other.outcomes);
    }
}

/// Fixed-size pool of download units.
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    tasks: JoinSet<DownloadOutcome>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            tasks: JoinSet::new(),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Units submitted and not yet joined.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Spawn a unit. It starts once a permit is free.
    pub fn submit<F>(&mut self, unit: F)
    where
        F: Future<Output = DownloadOutcome> + Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        self.tasks.spawn(async move {
            // The semaphore is never closed, so acquire only fails after a
            // bug elsewhere; run the unit regardless.
            let _permit = semaphore.acquire_owned().await.ok();
            unit.await
        });
    }

    /// Wait for every unit and collect the outcomes.
    pub async fn join(mut self) -> DownloadReport {
        let mut report = DownloadReport::default();
        while let Some(result) = self.tasks.join_next().await {
            match result {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(e) => tracing::error!("Download task aborted: {}", e),
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_pool_bounds_concurrency() {
        let mut pool = WorkerPool::new(3);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for i in 0..10 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            pool.submit(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                DownloadOutcome::Cancelled {
                    song: Song::new(format!("song {}", i)),
                }
            });
        }
        assert_eq!(pool.pending(), 10);

        let report = pool.join().await;
        assert_eq!(report.len(), 10);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn test_pool_size_is_at_least_one() {
        assert_eq!(WorkerPool::new(0).size(), 1);
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_report_counts() {
        let report = DownloadReport {
            outcomes: vec![
                DownloadOutcome::Downloaded {
                    song: Song::new("a"),
                    path: PathBuf::from("a.mp3"),
                },
                DownloadOutcome::Skipped {
                    song: Song::new("b"),
                    path: PathBuf::from("b.mp3"),
                },
                DownloadOutcome::Failed {
                    song: Song::new("c"),
                    error: Error::download("c", "boom"),
                },
            ],
        };
        assert_eq!(report.downloaded(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures().next().map(|(s, _)| s.name.as_str()), Some("c"));
    }

    #[test]
    fn test_progress_records_outcomes() {
        let progress = Progress::default();
        progress.record_submitted();
        progress.record(&DownloadOutcome::Cancelled { song: Song::new("x") });
        let snap = progress.snapshot();
        assert_eq!(snap.submitted, 1);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.finished(), 1);
    }
}
