//! Sequential baseline: one thread, the full task list in order.
//!
//! Exists so the parallel strategies have a denominator. Every task is
//! load → full effect sequence with swap-after-each → save, same as the
//! per-task path of the parallel strategies.

use super::{process_task, DataLayout, StatCounters, Task};

/// Run every task on the calling thread. Returns the worker count (1).
pub(crate) fn run(tasks: &[Task], layout: &DataLayout, counters: &StatCounters) -> usize {
    for task in tasks {
        process_task(task, layout, counters);
    }
    1
}
