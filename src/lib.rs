//! Comparative parallel image-filtering runtime.
//!
//! ## Scope
//! parfx executes a batch of independent "apply an effect sequence to a
//! PNG" jobs under five interchangeable scheduling strategies — sequential,
//! shared-queue, data-parallel row slicing, a staged pipeline, and
//! work-stealing — so their throughput and scaling behavior can be measured
//! against each other on the same workload.
//!
//! ## Key invariants
//! - Task coverage is identical across strategies: every strategy consumes
//!   the same directory × manifest expansion.
//! - Within one item, effects apply strictly in manifest order; only
//!   independent work (across items, or across row ranges of one effect)
//!   is parallelized.
//! - Per-item failures are logged and skipped; only a manifest load failure
//!   aborts a run.
//! - A thread count of `-1` skips all work (performance-test sentinel).
//!
//! ## Run flow
//! `dirs + manifest -> expand_tasks -> Vec<Task> -> one Strategy -> saved PNGs`
//!
//! ## Notable entry points
//! - [`scheduler::run`] / [`scheduler::RunConfig`]: drive one full run.
//! - [`stdx::WorkDeque`]: the Chase–Lev deque under the stealing strategy.
//! - [`img::Image`]: double-buffered raster the effects operate on.

pub mod img;
pub mod manifest;
pub mod scheduler;
pub mod stdx;

pub use img::{Effect, Image};
pub use manifest::{ManifestEntry, ManifestError};
pub use scheduler::{
    run, DataLayout, RunConfig, RunError, RunStats, Strategy, PERF_TEST_SENTINEL,
};
