//! Staged pipeline: generate → process → save over bounded channels.
//!
//! ```text
//!   generators ──task chan──► processing pool ──save chan──► savers
//!   (≤ N, one per            (exactly N workers)            (one thread per
//!    task chunk)                                             arriving item)
//! ```
//!
//! Both channels are bounded to the configured thread count, so a full
//! channel blocks its producer: at most N tasks and N processed items are
//! ever in flight, which caps memory at O(threads) decoded images while
//! still letting slow load/save I/O overlap with CPU-bound filtering.
//!
//! Channel close is all-senders-dropped: the generator handles close the
//! task channel once every chunk is pushed, and the processing pool's
//! handles close the save channel once every worker exits its receive loop.

use std::thread;

use crossbeam_channel::bounded;

use crate::img::Image;

use super::{load_task_image, save_task_image, DataLayout, StatCounters, Task};

/// Run the three-stage pipeline with pools sized to `threads`.
/// Returns the processing-pool worker count.
pub(crate) fn run(
    tasks: Vec<Task>,
    threads: usize,
    layout: &DataLayout,
    counters: &StatCounters,
) -> usize {
    let (task_tx, task_rx) = bounded::<Task>(threads);
    let (save_tx, save_rx) = bounded::<(Image, Task)>(threads);
    let chunks = chunk_tasks(tasks, threads);

    thread::scope(|s| {
        // Stage A: one generator per contiguous chunk of the task list.
        for chunk in chunks {
            let tx = task_tx.clone();
            s.spawn(move || {
                for task in chunk {
                    // Send fails only if every receiver is gone, which means
                    // the run is already unwinding.
                    let _ = tx.send(task);
                }
            });
        }
        drop(task_tx);

        // Stage B: fixed processing pool; a closed, drained channel ends
        // each worker's iteration.
        for _ in 0..threads {
            let rx = task_rx.clone();
            let tx = save_tx.clone();
            s.spawn(move || {
                for task in rx {
                    let Some(mut image) = load_task_image(&task, layout, counters) else {
                        continue;
                    };
                    image.apply_all(&task.effects);
                    let _ = tx.send((image, task));
                }
            });
        }
        drop(task_rx);
        drop(save_tx);

        // Stage C: one saver thread per arriving item; the scope join waits
        // for all of them.
        for (image, task) in save_rx {
            s.spawn(move || {
                save_task_image(&image, &task, layout, counters);
            });
        }
    });
    threads
}

/// Partition the flat task list into at most `parts` contiguous chunks.
fn chunk_tasks(mut tasks: Vec<Task>, parts: usize) -> Vec<Vec<Task>> {
    debug_assert!(parts >= 1);
    if tasks.is_empty() {
        return Vec::new();
    }
    let chunk_len = (tasks.len() + parts - 1) / parts;
    let mut chunks = Vec::with_capacity(parts);
    while !tasks.is_empty() {
        let rest = tasks.split_off(tasks.len().min(chunk_len));
        chunks.push(std::mem::replace(&mut tasks, rest));
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(n: usize) -> Task {
        Task {
            dir: "d".to_string(),
            input: format!("{n}.png"),
            output: format!("{n}_out.png"),
            effects: Vec::new(),
        }
    }

    #[test]
    fn chunks_are_contiguous_and_complete() {
        let tasks: Vec<Task> = (0..10).map(task).collect();
        let chunks = chunk_tasks(tasks.clone(), 4);
        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().all(|c| c.len() <= 3));
        let rejoined: Vec<Task> = chunks.into_iter().flatten().collect();
        assert_eq!(rejoined, tasks);
    }

    #[test]
    fn fewer_tasks_than_parts_yields_fewer_chunks() {
        let chunks = chunk_tasks((0..2).map(task).collect(), 8);
        assert_eq!(chunks.len(), 2);
        assert!(chunk_tasks(Vec::new(), 8).is_empty());
    }

    /// Backpressure bound: a bounded channel of capacity K holds at most K
    /// in-flight items — the K+1th send would block (try_send fails).
    #[test]
    fn bounded_channel_enforces_capacity() {
        let (tx, rx) = bounded::<usize>(3);
        for i in 0..3 {
            tx.try_send(i).unwrap();
        }
        assert!(tx.try_send(99).is_err());
        assert!(tx.is_full());

        // Draining one slot unblocks exactly one producer slot.
        assert_eq!(rx.recv().unwrap(), 0);
        tx.try_send(99).unwrap();
        assert!(tx.try_send(100).is_err());
    }

    #[test]
    fn empty_task_list_completes() {
        let counters = StatCounters::default();
        let layout = DataLayout::new("unused");
        assert_eq!(run(Vec::new(), 4, &layout, &counters), 4);
        assert_eq!(counters.processed.load(std::sync::atomic::Ordering::Relaxed), 0);
    }

    #[test]
    fn failed_loads_flow_through_without_saves() {
        let counters = StatCounters::default();
        let layout = DataLayout::new("/definitely/not/here");
        run((0..6).map(task).collect(), 2, &layout, &counters);
        assert_eq!(
            counters.load_errors.load(std::sync::atomic::Ordering::Relaxed),
            6
        );
        assert_eq!(counters.save_errors.load(std::sync::atomic::Ordering::Relaxed), 0);
        assert_eq!(counters.processed.load(std::sync::atomic::Ordering::Relaxed), 0);
    }
}
