//! Randomized concurrent begin/end interleavings against the status aggregate.
//!
//! Every snapshot observed by any thread must satisfy
//! `mode == working` iff at least one stage occurrence is active.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use mediadl::{Mode, Stage, StatusAggregate, StatusSnapshot};

const WORKERS: usize = 8;
const ROUNDS: usize = 2_000;

/// Small deterministic PRNG so runs are reproducible without extra crates.
struct XorShift(u64);

impl XorShift {
    fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next() % n as u64) as usize
    }
}

fn check(snapshot: &StatusSnapshot) {
    let working = snapshot.mode == Mode::Working;
    assert_eq!(
        working,
        !snapshot.active_processes.is_empty(),
        "inconsistent snapshot: {:?}",
        snapshot
    );
    assert_eq!(snapshot.subprocess.is_some(), working);
}

#[test]
fn test_mode_tracks_occurrence_count_under_contention() {
    let status = Arc::new(StatusAggregate::new());
    let done = Arc::new(AtomicBool::new(false));

    let watcher = {
        let mut rx = status.subscribe();
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut observed = 0usize;
            while !done.load(Ordering::SeqCst) {
                if rx.has_changed().unwrap_or(false) {
                    check(&rx.borrow_and_update());
                    observed += 1;
                }
                thread::yield_now();
            }
            if rx.has_changed().unwrap_or(false) {
                check(&rx.borrow_and_update());
                observed += 1;
            }
            observed
        })
    };

    let workers: Vec<_> = (0..WORKERS)
        .map(|i| {
            let status = Arc::clone(&status);
            thread::spawn(move || {
                let mut rng = XorShift::new(0x9E37_79B9_7F4A_7C15 ^ (i as u64 + 1));
                let mut held: Vec<Stage> = Vec::new();
                for _ in 0..ROUNDS {
                    let begin = held.is_empty() || (held.len() < 4 && rng.below(2) == 0);
                    if begin {
                        let stage = Stage::ALL[rng.below(Stage::ALL.len())];
                        status.begin_stage(stage);
                        held.push(stage);
                        // While this thread holds a stage, nobody may observe idle.
                        assert_eq!(status.snapshot().mode, Mode::Working);
                    } else {
                        let idx = rng.below(held.len());
                        status.end_stage(held.swap_remove(idx));
                    }
                    check(&status.snapshot());
                }
                for stage in held.drain(..) {
                    status.end_stage(stage);
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    done.store(true, Ordering::SeqCst);
    let observed = watcher.join().unwrap();

    let snapshot = status.snapshot();
    check(&snapshot);
    assert_eq!(snapshot.mode, Mode::Idle);
    assert_eq!(status.total_active(), 0);
    for stage in Stage::ALL {
        assert_eq!(status.active_count(stage), 0);
    }
    assert!(observed > 0);
}

#[test]
fn test_guards_released_from_many_threads() {
    let status = Arc::new(StatusAggregate::new());

    let workers: Vec<_> = (0..WORKERS)
        .map(|i| {
            let status = Arc::clone(&status);
            thread::spawn(move || {
                let mut rng = XorShift::new(i as u64 + 7);
                for _ in 0..ROUNDS / 4 {
                    let stage = Stage::ALL[rng.below(Stage::ALL.len())];
                    let _guard = status.enter(stage);
                    check(&status.snapshot());
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(status.snapshot().mode, Mode::Idle);
    assert_eq!(status.total_active(), 0);
}
