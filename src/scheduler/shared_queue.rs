//! Shared-queue parallelism: N workers draining one guarded list.
//!
//! The entire task list goes into a [`SharedQueue`](super::SharedQueue) up
//! front; `min(threads, tasks)` workers loop on pop-front-or-empty and
//! process each task whole. The queue's spinlock covers only the pop, so
//! contention is a few index updates per task — the work itself runs
//! unlocked.

use std::thread;

use super::{process_task, DataLayout, SharedQueue, StatCounters, Task};

/// Drain `tasks` with up to `threads` workers. Returns the worker count.
pub(crate) fn run(
    tasks: Vec<Task>,
    threads: usize,
    layout: &DataLayout,
    counters: &StatCounters,
) -> usize {
    let workers = threads.min(tasks.len());
    if workers == 0 {
        return 0;
    }

    let queue = SharedQueue::new(tasks);
    thread::scope(|s| {
        for _ in 0..workers {
            s.spawn(|| {
                while let Some(task) = queue.pop_front() {
                    process_task(&task, layout, counters);
                }
            });
        }
    });
    workers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawns_no_workers_for_empty_list() {
        let counters = StatCounters::default();
        let layout = DataLayout::new("unused");
        assert_eq!(run(Vec::new(), 8, &layout, &counters), 0);
    }

    #[test]
    fn worker_count_capped_by_task_count() {
        // Tasks against a nonexistent layout: every load fails and is
        // counted, which also exercises the fail-soft path end to end.
        let counters = StatCounters::default();
        let layout = DataLayout::new("/definitely/not/here");
        let tasks: Vec<Task> = (0..3)
            .map(|i| Task {
                dir: "d".to_string(),
                input: format!("missing_{i}.png"),
                output: format!("out_{i}.png"),
                effects: Vec::new(),
            })
            .collect();

        let workers = run(tasks, 16, &layout, &counters);
        assert_eq!(workers, 3);
        assert_eq!(
            counters.load_errors.load(std::sync::atomic::Ordering::Relaxed),
            3
        );
        assert_eq!(counters.processed.load(std::sync::atomic::Ordering::Relaxed), 0);
    }
}
