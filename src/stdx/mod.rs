//! Concurrency primitives the scheduler is built on.
//!
//! Small, dependency-light building blocks with documented memory-ordering
//! contracts:
//!
//! - [`SpinLock`]: test-and-set busy-wait lock guarding the shared task list.
//! - [`WorkDeque`] / [`Stealer`]: dynamic circular work-stealing deque
//!   (single owner, many thieves).

pub mod deque;
pub mod spin_lock;

pub use deque::{work_deque, Stealer, WorkDeque};
pub use spin_lock::SpinLock;
