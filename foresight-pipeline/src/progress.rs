//! Cross-worker progress accounting.
//!
//! The only state shared across worker tasks is this monotonically
//! increasing completion counter. Entities own their store partitions,
//! so a lock-free atomic is all the coordination a stage needs.

use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Counts completed units of work across a worker pool.
pub struct CompletionCounter {
    done: AtomicUsize,
    total: usize,
}

impl CompletionCounter {
    pub fn new(total: usize) -> Self {
        Self {
            done: AtomicUsize::new(0),
            total,
        }
    }

    /// Record one completed unit and return the running count.
    pub fn record_done(&self, symbol: &str) -> usize {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(symbol, done, total = self.total, "unit complete");
        done
    }

    pub fn done(&self) -> usize {
        self.done.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn counts_monotonically() {
        let counter = CompletionCounter::new(3);
        assert_eq!(counter.record_done("A"), 1);
        assert_eq!(counter.record_done("B"), 2);
        assert_eq!(counter.record_done("C"), 3);
        assert_eq!(counter.done(), 3);
    }

    #[test]
    fn concurrent_increments_do_not_lose_counts() {
        let counter = Arc::new(CompletionCounter::new(400));
        let mut handles = Vec::new();

        for _ in 0..4 {
            let counter = Arc::clone(&counter);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    counter.record_done("X");
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.done(), 400);
    }
}
