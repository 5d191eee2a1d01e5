//! Work-stealing: one deque per worker, random placement, random victims.
//!
//! Every task is seeded up front into a uniformly-random deque, then one
//! worker spawns per deque. A worker pops its own deque first (the
//! uncontended fast path); when that comes up empty it probes the other
//! deques in a single random-start rotation, skipping itself, and takes the
//! first successful steal. A worker that finds its own deque and every
//! victim empty terminates.
//!
//! There is no global done signal: "everyone observed empty" is a valid
//! termination policy only because no task is created after seeding. If
//! dynamic task creation is ever added this must become an explicit
//! in-flight count with a shared shutdown signal.

use std::thread;

use crate::stdx::{work_deque, Stealer, WorkDeque};

use super::{process_task, DataLayout, StatCounters, Task, XorShift64};

/// Initial slab exponent for each worker deque (capacity 256).
const INITIAL_EXPONENT: u32 = 8;

/// Seed `tasks` across `threads` deques and drain them with one worker per
/// deque. Returns the worker count.
pub(crate) fn run(
    tasks: Vec<Task>,
    threads: usize,
    seed: u64,
    layout: &DataLayout,
    counters: &StatCounters,
) -> usize {
    let mut rng = XorShift64::new(seed);

    let mut owners: Vec<WorkDeque<Task>> = Vec::with_capacity(threads);
    let mut stealers: Vec<Stealer<Task>> = Vec::with_capacity(threads);
    for _ in 0..threads {
        let (owner, stealer) = work_deque(INITIAL_EXPONENT);
        owners.push(owner);
        stealers.push(stealer);
    }

    // Placement runs before any worker exists, so the spawning thread is
    // every deque's owner for the duration of the seeding loop.
    for task in tasks {
        owners[rng.next_usize(threads)].push_bottom(task);
    }

    thread::scope(|s| {
        let stealers = &stealers;
        for (id, mut own) in owners.into_iter().enumerate() {
            let mut rng = rng.fork();
            s.spawn(move || loop {
                let task = match own.pop_bottom() {
                    Some(task) => task,
                    None => match steal_task(stealers, id, &mut rng) {
                        Some(task) => task,
                        None => return,
                    },
                };
                process_task(&task, layout, counters);
            });
        }
    });
    threads
}

/// Probe every other deque once, starting from a random victim.
///
/// A `None` from a victim means empty *or* a lost race; either way the
/// rotation moves on rather than rereading the same slot.
fn steal_task(stealers: &[Stealer<Task>], thief: usize, rng: &mut XorShift64) -> Option<Task> {
    let n = stealers.len();
    let start = rng.next_usize(n);
    for offset in 0..n {
        let victim = (start + offset) % n;
        if victim == thief {
            continue;
        }
        if let Some(task) = stealers[victim].steal() {
            return Some(task);
        }
    }
    None
}
