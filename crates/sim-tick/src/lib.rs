//! Tick-based execution with colour-parity spatial parallelism.
//!
//! # Tick execution model
//!
//! ```text
//! Tick N:
//! ┌─────────────────────────────────────────────────────────────┐
//! │  for colour in 0..8:                                        │
//! │      run every batch of `colour` in parallel                │
//! │      barrier — wait for all of them before the next colour  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Within a colour, concurrent batches touch disjoint 1-rings (that's what
//! makes a colouring valid in the first place — see `sim_spatial::Color`),
//! so no batch needs to coordinate with another batch running at the same
//! time. Between colours, the barrier is load-bearing: colour `k + 1` may
//! observe agents colour `k` just inserted.

use rayon::{ThreadPool, ThreadPoolBuilder};

/// Executes pre-built batches with a join barrier at the end of each colour.
///
/// Building the batches themselves — partitioning a colour group's chunks
/// across `allowed_cores` workers — is `ChunkedIndex`'s job; this type only
/// knows how to run whatever it's handed.
pub struct Scheduler {
    pool: ThreadPool,
}

impl Scheduler {
    /// # Panics
    ///
    /// Panics if the underlying `rayon` thread pool fails to start (out of
    /// OS resources). `core_count == 0` defers to rayon's own default
    /// (number of logical CPUs).
    #[must_use]
    pub fn new(core_count: usize) -> Self {
        let pool = ThreadPoolBuilder::new()
            .num_threads(core_count)
            .build()
            .expect("failed to start scheduler thread pool");
        Self { pool }
    }

    /// Run every batch in `batches` in parallel via `step_batch`, returning
    /// only once all of them have finished — the per-colour barrier.
    ///
    /// `step_batch` must not itself try to run another colour's batches
    /// (re-entrant use of the same `Scheduler` from inside a batch would
    /// deadlock the underlying pool).
    pub fn run_colour<B, F>(&self, batches: &[B], step_batch: F)
    where
        B: Sync,
        F: Fn(&B) + Sync,
    {
        use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

        let _span = tracing::trace_span!("run_colour", batches = batches.len()).entered();
        self.pool.install(|| {
            batches.par_iter().for_each(|batch| step_batch(batch));
        });
    }

    /// Number of worker threads this scheduler was built with.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn run_colour_visits_every_batch_exactly_once() {
        let scheduler = Scheduler::new(2);
        let batches: Vec<usize> = (0..9).collect();
        let visits = AtomicUsize::new(0);

        scheduler.run_colour(&batches, |_batch| {
            visits.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(visits.load(Ordering::SeqCst), 9);
    }

    #[test]
    fn run_colour_is_a_barrier() {
        // All batches must complete before run_colour returns; a shared
        // counter incremented by every batch should read back at the total.
        let scheduler = Scheduler::new(4);
        let batches: Vec<usize> = (0..50).collect();
        let total = AtomicUsize::new(0);

        scheduler.run_colour(&batches, |b| {
            total.fetch_add(*b, Ordering::SeqCst);
        });

        let expected: usize = (0..50).sum();
        assert_eq!(total.load(Ordering::SeqCst), expected);
    }

    #[test]
    fn zero_core_count_defers_to_rayon_default() {
        let scheduler = Scheduler::new(0);
        assert!(scheduler.worker_count() >= 1);
    }
}
