//! Task model: one unit of schedulable work.
//!
//! A [`Task`] pairs an item's locators (directory, input name, output name)
//! with the ordered effect sequence to apply. Tasks are immutable once
//! expanded and consumed exactly once by whichever strategy dequeues them.

use crate::img::Effect;
use crate::manifest::ManifestEntry;

/// One (item, effect-sequence) job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Task {
    /// Directory/collection identifier the item lives under.
    pub dir: String,
    /// Input file name within the directory.
    pub input: String,
    /// Output file name.
    pub output: String,
    /// Effects to apply, in order. Never reordered, never run concurrently
    /// with each other for the same item.
    pub effects: Vec<Effect>,
}

/// Expand the directory set × manifest cross product into a flat task list.
///
/// Directory-major, manifest-minor; deterministic for a given pair of input
/// lists. Every strategy consumes this same expansion, so task coverage is
/// identical across strategies by construction.
pub fn expand_tasks(dirs: &[String], manifest: &[ManifestEntry]) -> Vec<Task> {
    let mut tasks = Vec::with_capacity(dirs.len() * manifest.len());
    for dir in dirs {
        for entry in manifest {
            tasks.push(Task {
                dir: dir.clone(),
                input: entry.input.clone(),
                output: entry.output.clone(),
                effects: entry.effects.clone(),
            });
        }
    }
    tasks
}
