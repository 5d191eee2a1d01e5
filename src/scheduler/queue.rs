//! Spinlock-guarded shared work list.
//!
//! The shared-queue and slicing strategies drain one list of tasks from
//! many workers. The list is an ordered sequence mutated only while the
//! spinlock is held, and the lock never escapes this module: the only
//! operation callers see is an atomic pop-front-or-empty.

use std::cell::UnsafeCell;
use std::collections::VecDeque;

use crate::stdx::SpinLock;

/// FIFO work list shared across worker threads.
///
/// Removal order is front-first; no ordering is guaranteed *across* workers
/// beyond that (whichever worker wins the lock gets the next task).
pub struct SharedQueue<T> {
    lock: SpinLock,
    items: UnsafeCell<VecDeque<T>>,
}

// SAFETY: `items` is only accessed between lock/unlock of `lock`, which
// provides the required mutual exclusion.
unsafe impl<T: Send> Sync for SharedQueue<T> {}

impl<T> SharedQueue<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            lock: SpinLock::new(),
            items: UnsafeCell::new(VecDeque::from(items)),
        }
    }

    /// Pop the front item, or `None` once the list is drained.
    pub fn pop_front(&self) -> Option<T> {
        self.lock.lock();
        // SAFETY: we hold the lock.
        let item = unsafe { (*self.items.get()).pop_front() };
        self.lock.unlock();
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn pops_in_fifo_order() {
        let queue = SharedQueue::new(vec![1, 2, 3]);
        assert_eq!(queue.pop_front(), Some(1));
        assert_eq!(queue.pop_front(), Some(2));
        assert_eq!(queue.pop_front(), Some(3));
        assert_eq!(queue.pop_front(), None);
        assert_eq!(queue.pop_front(), None);
    }

    #[test]
    fn concurrent_drain_covers_every_item_once() {
        const ITEMS: u64 = 20_000;
        const WORKERS: usize = 4;

        let queue = SharedQueue::new((0..ITEMS).collect());

        let mut all = std::thread::scope(|s| {
            let handles: Vec<_> = (0..WORKERS)
                .map(|_| {
                    s.spawn(|| {
                        let mut got = Vec::new();
                        while let Some(v) = queue.pop_front() {
                            got.push(v);
                        }
                        got
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect::<Vec<_>>()
        });

        all.sort_unstable();
        let unique: HashSet<u64> = all.iter().copied().collect();
        assert_eq!(unique.len(), all.len(), "an item was popped twice");
        assert_eq!(all, (0..ITEMS).collect::<Vec<_>>());
    }
}
