//! Data-parallel slicing: one item, many row ranges.
//!
//! Workers pull whole tasks from the shared queue as in the shared-queue
//! strategy, but each popped item is itself parallelized: per effect, the
//! row extent is partitioned into `threads` contiguous ranges (the last
//! absorbs any remainder) and one scoped thread applies the effect to each
//! range. Joining the scope is the barrier — every range must see the
//! fully-written result of the previous effect before any range starts the
//! next, so effects are never interleaved across rounds. The buffers swap
//! once per effect for the whole item, plus the usual trailing swap before
//! the save.
//!
//! # Halo
//!
//! A neighborhood effect at a slice boundary needs rows owned by the
//! adjacent slice. Each range is therefore widened by [`HALO_ROWS`] on both
//! sides (clamped to the image) to form the *read* window handed to the
//! effect; writes stay confined to the range's own rows, which is what lets
//! the write plane be split into disjoint `&mut` bands across the range
//! workers. Partitioning must not change results: the halo (2 rows) covers
//! every kernel radius in use (1), and the equality with an unpartitioned
//! run is asserted by test.

use std::ops::Range;
use std::thread;

use crate::img::{effects, Effect, Image, CHANNELS};

use super::{load_task_image, save_task_image, DataLayout, SharedQueue, StatCounters, Task};

/// Rows of boundary context added to each side of a slice.
pub(crate) const HALO_ROWS: usize = 2;

/// Drain `tasks` with exactly `threads` workers, slicing each item.
/// Returns the worker count.
pub(crate) fn run(
    tasks: Vec<Task>,
    threads: usize,
    layout: &DataLayout,
    counters: &StatCounters,
) -> usize {
    let queue = SharedQueue::new(tasks);
    thread::scope(|s| {
        for _ in 0..threads {
            s.spawn(|| {
                while let Some(task) = queue.pop_front() {
                    process_sliced(&task, threads, layout, counters);
                }
            });
        }
    });
    threads
}

/// Process one task with per-effect row slicing.
fn process_sliced(task: &Task, slices: usize, layout: &DataLayout, counters: &StatCounters) {
    let Some(mut image) = load_task_image(task, layout, counters) else {
        return;
    };
    for &effect in &task.effects {
        apply_effect_sliced(&mut image, effect, slices);
        image.swap();
    }
    image.swap();
    save_task_image(&image, task, layout, counters);
}

/// Apply one effect across `slices` row ranges in parallel. No swap; the
/// scope join is the barrier the next effect waits behind.
pub(crate) fn apply_effect_sliced(image: &mut Image, effect: Effect, slices: usize) {
    let height = image.height();
    let width = image.width();
    let stride = width * CHANNELS;
    let ranges = partition_rows(height, slices);
    let (src, mut rest) = image.planes_mut();

    thread::scope(|s| {
        for rows in ranges {
            // Carve this range's rows out of the write plane; ranges are
            // ascending and contiguous, so the split offsets line up.
            let (band, tail) = std::mem::take(&mut rest).split_at_mut(rows.len() * stride);
            rest = tail;
            if rows.is_empty() {
                continue;
            }
            let context = with_halo(&rows, height);
            s.spawn(move || {
                debug_assert!(halo_covers_kernel(&rows, &context, effect, height));
                effects::apply_rows(effect, src, width, height, band, rows, context);
            });
        }
        // The ranges tile the full row extent, so the write plane must be
        // fully consumed.
        debug_assert!(rest.is_empty());
    });
}

/// Split `height` rows into `parts` contiguous ranges; the last absorbs the
/// remainder. Ranges can be empty when `height < parts`.
pub(crate) fn partition_rows(height: usize, parts: usize) -> Vec<Range<usize>> {
    debug_assert!(parts >= 1);
    let len = height / parts;
    (0..parts)
        .map(|j| {
            let start = j * len;
            let end = if j == parts - 1 { height } else { (j + 1) * len };
            start..end
        })
        .collect()
}

/// Widen a range by the halo on both sides, clamped to the image.
pub(crate) fn with_halo(rows: &Range<usize>, height: usize) -> Range<usize> {
    rows.start.saturating_sub(HALO_ROWS)..(rows.end + HALO_ROWS).min(height)
}

/// The halo must cover every kernel read: wherever the image continues past
/// the range, the context extends at least the kernel radius beyond it.
fn halo_covers_kernel(
    rows: &Range<usize>,
    context: &Range<usize>,
    effect: Effect,
    height: usize,
) -> bool {
    let radius = effect.neighborhood_radius();
    let low_ok = context.start <= rows.start.saturating_sub(radius);
    let high_ok = context.end >= (rows.end + radius).min(height);
    low_ok && high_ok
}
