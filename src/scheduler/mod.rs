//! Scheduling runtime: five strategies over one task model.
//!
//! # Architecture
//!
//! ```text
//!   manifest ──┐
//!              ├──► expand_tasks() ──► Vec<Task> ──► exactly one strategy
//!   dir set ───┘                                        │
//!                                                       ▼
//!                      sequential | shared-queue | slices | pipeline | steal
//! ```
//!
//! The driver ([`run`]) loads the manifest, expands the directory × manifest
//! cross product into a flat task list, and hands the list to the strategy
//! selected by configuration. The strategy owns every concurrency decision
//! until all tasks are durably saved; the driver just joins it and snapshots
//! the counters.
//!
//! Ordering guarantees: within one item, effects are applied strictly in
//! sequence. Across items nothing is ordered. Strategies differ only in how
//! independent work — across items, or across the row ranges of one effect —
//! is spread over workers.
//!
//! A configured thread count of `-1` is the performance-test sentinel: the
//! run returns immediately, before the manifest is read, without a single
//! load, apply, or save.

pub mod pipeline;
pub mod queue;
pub mod rng;
pub mod sequential;
pub mod shared_queue;
pub mod slices;
pub mod task;
pub mod work_stealing;

pub use queue::SharedQueue;
pub use rng::XorShift64;
pub use task::{expand_tasks, Task};

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::img::Image;
use crate::manifest::{self, ManifestError};

/// Thread-count sentinel that skips all work (kept for compatibility with
/// the performance-test harness, which uses it to time the serial fraction).
pub const PERF_TEST_SENTINEL: i32 = -1;

/// The five mutually exclusive scheduling disciplines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Single-threaded baseline.
    Sequential,
    /// N workers popping one spinlock-guarded list.
    SharedQueue,
    /// Per-item row slicing with a 2-row halo and a barrier between effects.
    Slices,
    /// Three stages (generate → process → save) over bounded channels.
    Pipeline,
    /// One deque per worker; idle workers steal from random victims.
    WorkStealing,
}

impl Strategy {
    /// Parse a CLI mode name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sequential" => Some(Strategy::Sequential),
            "parfiles" => Some(Strategy::SharedQueue),
            "parslices" => Some(Strategy::Slices),
            "pipeline" => Some(Strategy::Pipeline),
            "steal" => Some(Strategy::WorkStealing),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Sequential => "sequential",
            Strategy::SharedQueue => "parfiles",
            Strategy::Slices => "parslices",
            Strategy::Pipeline => "pipeline",
            Strategy::WorkStealing => "steal",
        }
    }
}

/// Where the data set lives on disk.
///
/// Inputs are read from `<root>/in/<dir>/<name>`, outputs written to
/// `<root>/out/<dir>_<name>`, and the manifest is `<root>/effects.txt`.
#[derive(Clone, Debug)]
pub struct DataLayout {
    pub root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("effects.txt")
    }

    pub fn input_path(&self, dir: &str, name: &str) -> PathBuf {
        self.root.join("in").join(dir).join(name)
    }

    pub fn output_path(&self, dir: &str, name: &str) -> PathBuf {
        self.root.join("out").join(format!("{dir}_{name}"))
    }
}

/// Validated run configuration, produced by the CLI layer.
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Worker count (>= 1), or [`PERF_TEST_SENTINEL`].
    pub threads: i32,
    /// `+`-delimited directory identifiers.
    pub data_dirs: String,
    pub strategy: Strategy,
    pub layout: DataLayout,
    /// Master seed for the work-stealing strategy's placement and victim
    /// selection. Fixed seed ⇒ reproducible placement.
    pub seed: u64,
}

/// Live counters shared with the workers of one run.
#[derive(Debug, Default)]
pub struct StatCounters {
    /// Tasks fully processed and durably saved.
    pub processed: AtomicU64,
    /// Items whose load failed (task skipped).
    pub load_errors: AtomicU64,
    /// Items whose save failed (no retry).
    pub save_errors: AtomicU64,
}

/// Snapshot of one completed run.
#[derive(Clone, Debug)]
pub struct RunStats {
    pub strategy: Strategy,
    /// Tasks in the expanded list (0 for a sentinel run).
    pub tasks: u64,
    pub processed: u64,
    pub load_errors: u64,
    pub save_errors: u64,
    /// Workers the strategy actually spawned (1 for sequential).
    pub workers: usize,
    pub elapsed: Duration,
}

impl RunStats {
    fn snapshot(
        strategy: Strategy,
        tasks: u64,
        counters: &StatCounters,
        workers: usize,
        elapsed: Duration,
    ) -> Self {
        Self {
            strategy,
            tasks,
            processed: counters.processed.load(Ordering::Relaxed),
            load_errors: counters.load_errors.load(Ordering::Relaxed),
            save_errors: counters.save_errors.load(Ordering::Relaxed),
            workers,
            elapsed,
        }
    }

    fn skipped(strategy: Strategy, elapsed: Duration) -> Self {
        Self {
            strategy,
            tasks: 0,
            processed: 0,
            load_errors: 0,
            save_errors: 0,
            workers: 0,
            elapsed,
        }
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tasks={} processed={} load_errors={} save_errors={} elapsed_ms={} mode={} workers={}",
            self.tasks,
            self.processed,
            self.load_errors,
            self.save_errors,
            self.elapsed.as_millis(),
            self.strategy.name(),
            self.workers,
        )
    }
}

/// Fatal run failures. Everything else is per-task and merely logged.
#[derive(Debug)]
pub enum RunError {
    Manifest(ManifestError),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Manifest(err) => write!(f, "failed to load manifest: {err}"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Manifest(err) => Some(err),
        }
    }
}

impl From<ManifestError> for RunError {
    fn from(err: ManifestError) -> Self {
        RunError::Manifest(err)
    }
}

/// Execute one run under the configured strategy.
///
/// Blocks until every spawned worker has finished. Per-item failures are
/// logged and counted, never fatal; only a manifest load failure aborts
/// before any work is scheduled.
pub fn run(config: &RunConfig) -> Result<RunStats, RunError> {
    debug_assert!(
        config.threads >= 1 || config.threads == PERF_TEST_SENTINEL,
        "thread count must be >= 1 or the -1 sentinel"
    );
    let started = Instant::now();

    if config.threads == PERF_TEST_SENTINEL {
        return Ok(RunStats::skipped(config.strategy, started.elapsed()));
    }

    let entries = manifest::load(&config.layout.manifest_path())?;
    let dirs: Vec<String> = config
        .data_dirs
        .split('+')
        .filter(|d| !d.is_empty())
        .map(str::to_owned)
        .collect();
    let tasks = expand_tasks(&dirs, &entries);
    let task_count = tasks.len() as u64;

    let threads = config.threads as usize;
    let counters = StatCounters::default();
    let layout = &config.layout;

    let workers = match config.strategy {
        Strategy::Sequential => sequential::run(&tasks, layout, &counters),
        Strategy::SharedQueue => shared_queue::run(tasks, threads, layout, &counters),
        Strategy::Slices => slices::run(tasks, threads, layout, &counters),
        Strategy::Pipeline => pipeline::run(tasks, threads, layout, &counters),
        Strategy::WorkStealing => {
            work_stealing::run(tasks, threads, config.seed, layout, &counters)
        }
    };

    Ok(RunStats::snapshot(
        config.strategy,
        task_count,
        &counters,
        workers,
        started.elapsed(),
    ))
}

/// Load a task's item, logging and counting a failure.
///
/// A failed load makes the task silently disappear: no processing, no save,
/// and the run continues.
pub(crate) fn load_task_image(
    task: &Task,
    layout: &DataLayout,
    counters: &StatCounters,
) -> Option<Image> {
    let path = layout.input_path(&task.dir, &task.input);
    match Image::load(&path) {
        Ok(image) => Some(image),
        Err(err) => {
            eprintln!("error loading {}: {}", path.display(), err);
            counters.load_errors.fetch_add(1, Ordering::Relaxed);
            None
        }
    }
}

/// Persist a processed item, logging and counting a failure. No retry.
pub(crate) fn save_task_image(
    image: &Image,
    task: &Task,
    layout: &DataLayout,
    counters: &StatCounters,
) {
    let path = layout.output_path(&task.dir, &task.output);
    match image.save(&path) {
        Ok(()) => {
            counters.processed.fetch_add(1, Ordering::Relaxed);
        }
        Err(err) => {
            eprintln!("error saving {}: {}", path.display(), err);
            counters.save_errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// The whole-item fast path shared by every strategy except slicing:
/// load → apply the full effect sequence with swap-after-each → save.
pub(crate) fn process_task(task: &Task, layout: &DataLayout, counters: &StatCounters) {
    let Some(mut image) = load_task_image(task, layout, counters) else {
        return;
    };
    image.apply_all(&task.effects);
    save_task_image(&image, task, layout, counters);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_names_round_trip() {
        for strategy in [
            Strategy::Sequential,
            Strategy::SharedQueue,
            Strategy::Slices,
            Strategy::Pipeline,
            Strategy::WorkStealing,
        ] {
            assert_eq!(Strategy::from_name(strategy.name()), Some(strategy));
        }
        assert_eq!(Strategy::from_name("bogus"), None);
    }

    #[test]
    fn layout_paths() {
        let layout = DataLayout::new("/data");
        assert_eq!(layout.manifest_path(), PathBuf::from("/data/effects.txt"));
        assert_eq!(
            layout.input_path("small", "a.png"),
            PathBuf::from("/data/in/small/a.png")
        );
        assert_eq!(
            layout.output_path("small", "a_out.png"),
            PathBuf::from("/data/out/small_a_out.png")
        );
    }

    #[test]
    fn sentinel_skips_everything() {
        // The layout points at a directory that does not exist; a sentinel
        // run must succeed anyway because it never touches the manifest.
        let config = RunConfig {
            threads: PERF_TEST_SENTINEL,
            data_dirs: "small+big".to_string(),
            strategy: Strategy::SharedQueue,
            layout: DataLayout::new("/definitely/not/here"),
            seed: 0,
        };
        let stats = run(&config).unwrap();
        assert_eq!(stats.tasks, 0);
        assert_eq!(stats.processed, 0);
        assert_eq!(stats.workers, 0);
    }

    #[test]
    fn missing_manifest_is_fatal() {
        let config = RunConfig {
            threads: 2,
            data_dirs: "small".to_string(),
            strategy: Strategy::Sequential,
            layout: DataLayout::new("/definitely/not/here"),
            seed: 0,
        };
        assert!(matches!(run(&config), Err(RunError::Manifest(_))));
    }
}
