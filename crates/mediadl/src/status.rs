//! Shared, occurrence-counted status aggregate.
//!
//! Every running job updates the same aggregate. Stage activity is counted
//! per stage name so that two jobs in the same stage do not flip the mode to
//! `idle` when only one of them finishes.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::warn;

use crate::models::{LastJob, Mode, Stage, StatusSnapshot};

#[derive(Debug)]
struct StatusInner {
    counts: BTreeMap<Stage, usize>,
    /// Sum of `counts`.
    total: usize,
    mode: Mode,
    last_started: Option<Stage>,
    last_changed: DateTime<Utc>,
    last_job: Option<LastJob>,
    /// Bumped on every mutation; orders publication.
    seq: u64,
}

impl StatusInner {
    /// Stamp a mutation and capture the state it produced.
    fn commit(&mut self) -> (u64, StatusSnapshot) {
        self.seq += 1;
        self.last_changed = Utc::now();
        (self.seq, self.snapshot())
    }

    fn snapshot(&self) -> StatusSnapshot {
        let active_processes: Vec<Stage> = self
            .counts
            .iter()
            .flat_map(|(stage, count)| std::iter::repeat(*stage).take(*count))
            .collect();

        let subprocess = self
            .last_started
            .filter(|stage| self.counts.get(stage).copied().unwrap_or(0) > 0)
            .or_else(|| active_processes.first().copied());

        StatusSnapshot {
            mode: self.mode,
            subprocess,
            active_processes,
            last_changed: self.last_changed,
            last_job: self.last_job,
        }
    }
}

/// Concurrency-safe status shared by all jobs.
///
/// Mutations are serialized by a short critical section that only updates
/// counts and captures a snapshot. Publication to subscribers happens after
/// the lock is released, so a subscriber holding a borrow never stalls other
/// callers of the aggregate.
#[derive(Debug)]
pub struct StatusAggregate {
    inner: Mutex<StatusInner>,
    tx: watch::Sender<StatusSnapshot>,
    /// Sequence number of the snapshot currently in `tx`.
    published: AtomicU64,
}

impl Default for StatusAggregate {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusAggregate {
    pub fn new() -> Self {
        let inner = StatusInner {
            counts: BTreeMap::new(),
            total: 0,
            mode: Mode::Idle,
            last_started: None,
            last_changed: Utc::now(),
            last_job: None,
            seq: 0,
        };
        let (tx, _rx) = watch::channel(inner.snapshot());
        Self {
            inner: Mutex::new(inner),
            tx,
            published: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StatusInner> {
        // Mutations never panic midway, so a poisoned lock still holds valid counts.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Hand a committed snapshot to subscribers unless a later one already
    /// went out. Must be called without holding the status lock.
    fn publish(&self, (seq, snapshot): (u64, StatusSnapshot)) {
        self.tx.send_if_modified(|current| {
            // Runs under the channel's write lock, so check and store are atomic.
            if seq <= self.published.load(Ordering::Acquire) {
                return false;
            }
            self.published.store(seq, Ordering::Release);
            *current = snapshot;
            true
        });
    }

    /// Mark one occurrence of `stage` as active.
    pub fn begin_stage(&self, stage: Stage) {
        let mut inner = self.lock();
        *inner.counts.entry(stage).or_insert(0) += 1;
        inner.total += 1;
        inner.mode = Mode::Working;
        inner.last_started = Some(stage);
        let committed = inner.commit();
        drop(inner);
        self.publish(committed);
    }

    /// Mark one occurrence of `stage` as finished.
    ///
    /// Never drops below zero; an unmatched call is logged and leaves the
    /// counts untouched.
    pub fn end_stage(&self, stage: Stage) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let remaining = match inner.counts.get_mut(&stage) {
            Some(count) if *count > 0 => {
                *count -= 1;
                Some(*count)
            }
            _ => None,
        };
        match remaining {
            Some(left) => {
                if left == 0 {
                    inner.counts.remove(&stage);
                }
                inner.total -= 1;
            }
            None => warn!("end_stage({}) without a matching begin_stage", stage),
        }
        if inner.total == 0 {
            inner.mode = Mode::Idle;
        }
        let committed = inner.commit();
        drop(guard);
        self.publish(committed);
    }

    /// Record the outcome of a job that just terminated. Last write wins.
    pub fn set_last_job(&self, outcome: LastJob) {
        let mut inner = self.lock();
        inner.last_job = Some(outcome);
        let committed = inner.commit();
        drop(inner);
        self.publish(committed);
    }

    /// Begin `stage` and return a guard that ends it when dropped.
    pub fn enter(self: &Arc<Self>, stage: Stage) -> StageGuard {
        self.begin_stage(stage);
        StageGuard {
            status: Arc::clone(self),
            stage,
        }
    }

    /// Consistent point-in-time copy.
    pub fn snapshot(&self) -> StatusSnapshot {
        self.lock().snapshot()
    }

    /// Receive a snapshot after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }

    /// Number of active occurrences of `stage`.
    pub fn active_count(&self, stage: Stage) -> usize {
        self.lock().counts.get(&stage).copied().unwrap_or(0)
    }

    /// Number of active occurrences across all stages.
    pub fn total_active(&self) -> usize {
        self.lock().total
    }
}

/// Active stage occurrence; ends the stage on drop.
///
/// Dropping happens on every exit path, including a pipeline future being
/// cancelled mid-stage.
#[must_use = "the stage ends as soon as the guard is dropped"]
#[derive(Debug)]
pub struct StageGuard {
    status: Arc<StatusAggregate>,
    stage: Stage,
}

impl StageGuard {
    pub fn stage(&self) -> Stage {
        self.stage
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        self.status.end_stage(self.stage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_idle() {
        let status = StatusAggregate::new();
        let snapshot = status.snapshot();
        assert_eq!(snapshot.mode, Mode::Idle);
        assert!(snapshot.active_processes.is_empty());
        assert_eq!(snapshot.subprocess, None);
        assert_eq!(snapshot.last_job, None);
    }

    #[test]
    fn test_begin_and_end() {
        let status = StatusAggregate::new();
        status.begin_stage(Stage::Downloading);
        let snapshot = status.snapshot();
        assert_eq!(snapshot.mode, Mode::Working);
        assert_eq!(snapshot.subprocess, Some(Stage::Downloading));
        assert_eq!(snapshot.active_processes, vec![Stage::Downloading]);

        status.end_stage(Stage::Downloading);
        let snapshot = status.snapshot();
        assert_eq!(snapshot.mode, Mode::Idle);
        assert_eq!(snapshot.subprocess, None);
    }

    #[test]
    fn test_repeated_stage_is_counted() {
        let status = StatusAggregate::new();
        status.begin_stage(Stage::Resizing);
        status.begin_stage(Stage::Resizing);
        assert_eq!(status.active_count(Stage::Resizing), 2);

        status.end_stage(Stage::Resizing);
        assert_eq!(status.snapshot().mode, Mode::Working);
        assert_eq!(
            status.snapshot().active_processes,
            vec![Stage::Resizing]
        );

        status.end_stage(Stage::Resizing);
        assert_eq!(status.snapshot().mode, Mode::Idle);
    }

    #[test]
    fn test_end_without_begin_never_goes_negative() {
        let status = StatusAggregate::new();
        status.end_stage(Stage::Probing);
        assert_eq!(status.total_active(), 0);
        assert_eq!(status.snapshot().mode, Mode::Idle);

        status.begin_stage(Stage::Downloading);
        status.end_stage(Stage::Probing);
        assert_eq!(status.total_active(), 1);
        assert_eq!(status.snapshot().mode, Mode::Working);
    }

    #[test]
    fn test_subprocess_tracks_latest_active() {
        let status = StatusAggregate::new();
        status.begin_stage(Stage::Downloading);
        status.begin_stage(Stage::Thumbnail);
        assert_eq!(status.snapshot().subprocess, Some(Stage::Thumbnail));

        status.end_stage(Stage::Thumbnail);
        assert_eq!(status.snapshot().subprocess, Some(Stage::Downloading));
    }

    #[test]
    fn test_last_job_is_last_write_wins() {
        let status = StatusAggregate::new();
        status.set_last_job(LastJob::Interrupted);
        status.set_last_job(LastJob::Done);
        assert_eq!(status.snapshot().last_job, Some(LastJob::Done));
    }

    #[test]
    fn test_guard_ends_stage_on_drop() {
        let status = Arc::new(StatusAggregate::new());
        {
            let guard = status.enter(Stage::Normalizing);
            assert_eq!(guard.stage(), Stage::Normalizing);
            assert_eq!(status.total_active(), 1);
        }
        assert_eq!(status.total_active(), 0);
        assert_eq!(status.snapshot().mode, Mode::Idle);
    }

    #[test]
    fn test_subscribers_see_mutations() {
        let status = StatusAggregate::new();
        let mut rx = status.subscribe();
        status.begin_stage(Stage::Probing);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().mode, Mode::Working);

        status.set_last_job(LastJob::Failed);
        assert_eq!(rx.borrow_and_update().last_job, Some(LastJob::Failed));
    }

    #[test]
    fn test_held_borrow_does_not_block_counting() {
        let status = Arc::new(StatusAggregate::new());
        let rx = status.subscribe();
        let held = rx.borrow();

        let writer = {
            let status = Arc::clone(&status);
            std::thread::spawn(move || status.begin_stage(Stage::Downloading))
        };

        let give_up = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while status.active_count(Stage::Downloading) == 0 {
            assert!(std::time::Instant::now() < give_up, "writer never counted");
            std::thread::yield_now();
        }
        assert_eq!(status.snapshot().mode, Mode::Working);

        drop(held);
        writer.join().unwrap();
        assert_eq!(rx.borrow().mode, Mode::Working);
    }

    #[test]
    fn test_stale_snapshot_is_not_published() {
        let status = StatusAggregate::new();
        let stale = status.lock().commit();
        status.begin_stage(Stage::Probing);
        status.publish(stale);
        assert_eq!(status.subscribe().borrow().mode, Mode::Working);
    }

    #[test]
    fn test_last_changed_advances() {
        let status = StatusAggregate::new();
        let before = status.snapshot().last_changed;
        status.begin_stage(Stage::Downloading);
        assert!(status.snapshot().last_changed >= before);
    }
}
