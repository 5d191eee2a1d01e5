//! Dynamic circular work-stealing deque (Chase–Lev).
//!
//! # Design
//!
//! One thread — the owner — pushes and pops at the `bottom` end; any number
//! of thieves steal at the `top` end. The owner's end is the fast path: it
//! synchronizes with thieves only when a single element remains, where pop
//! and steal race on a compare-exchange of `top`. Thieves contend with each
//! other and with that last-element race, never with the owner's common
//! case.
//!
//! The backing buffer ("slab") is a power-of-two circular array addressed by
//! monotonically adjusted indices, grown when occupancy would reach
//! capacity − 1 and shrunk when it falls below a quarter of capacity
//! (minimum exponent 1). The set of unconsumed slots is always the half-open
//! range `[top, bottom)`.
//!
//! # Buffer reclamation
//!
//! Growth and shrink replace the slab while thieves may still hold a pointer
//! to the old one. Replaced slabs are therefore retired into a list owned by
//! the deque and freed only when the deque itself is dropped, so an
//! in-flight thief read always targets live memory. Grows and shrinks are
//! logarithmic in the push/pop volume, which bounds the retained memory.
//!
//! Slabs never run item destructors: a slot's bytes are either consumed by
//! exactly one pop/steal, copied into the successor slab, or dead. Only the
//! live `[top, bottom)` range of the *current* slab is dropped with the
//! deque.
//!
//! # Ordering rationale
//!
//! ```text
//! push:  write slot, then Release-store bottom  →  a thief that
//!        Acquire-loads bottom and sees the slot in range also sees its bytes
//! pop:   decrement bottom, SeqCst fence, load top  →  totally ordered with
//!        a concurrent thief's (load top, fence, load bottom), so at most one
//!        side can claim the last element without going through the CAS
//! steal: the CAS on top is the single linearization point; a failed CAS
//!        discards the tentatively copied bytes without materializing them
//! ```
//!
//! Slot bytes are copied as `MaybeUninit<T>` before the CAS and only
//! `assume_init` after winning it, so a stale read (owner lapped the slot)
//! is discarded as raw bytes, never observed as a `T`.

#[cfg(not(loom))]
use std::sync::atomic::{fence, AtomicI64, AtomicPtr, Ordering};

#[cfg(loom)]
use loom::sync::atomic::{fence, AtomicI64, AtomicPtr, Ordering};

use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::Arc;

use crossbeam_utils::CachePadded;

/// Smallest slab exponent a shrink may produce (capacity 2).
const MIN_EXPONENT: u32 = 1;

// ============================================================================
// Slab (circular buffer)
// ============================================================================

/// Power-of-two circular slot array plus its size exponent.
///
/// Indices are used modulo capacity (bitmask). Slots are `MaybeUninit`: the
/// slab itself has no idea which of them hold live values — that knowledge
/// lives in the deque's `[top, bottom)` range.
struct Slab<T> {
    exponent: u32,
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
}

impl<T> Slab<T> {
    fn new(exponent: u32) -> Box<Self> {
        let capacity = 1usize << exponent;
        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Box::new(Self { exponent, slots })
    }

    #[inline]
    fn capacity(&self) -> i64 {
        1i64 << self.exponent
    }

    #[inline]
    fn slot(&self, index: i64) -> *mut MaybeUninit<T> {
        debug_assert!(index >= 0);
        self.slots[index as usize & (self.slots.len() - 1)].get()
    }

    /// Copy the raw bytes at `index` out of the slab.
    ///
    /// # Safety
    /// `index` must be non-negative. The returned value is uninitialized
    /// bytes unless the caller knows a `T` was written there and not yet
    /// consumed.
    #[inline]
    unsafe fn read_raw(&self, index: i64) -> MaybeUninit<T> {
        ptr::read(self.slot(index))
    }

    /// Store raw bytes at `index`.
    ///
    /// # Safety
    /// `index` must be non-negative, and no other thread may concurrently
    /// access the same physical slot (guaranteed by the deque protocol:
    /// the owner only writes at `bottom`, which is never inside `[top,
    /// bottom)`).
    #[inline]
    unsafe fn write_raw(&self, index: i64, value: MaybeUninit<T>) {
        ptr::write(self.slot(index), value);
    }
}

// ============================================================================
// Shared deque state
// ============================================================================

/// State shared between the owner handle and all stealers.
///
/// # Invariants
///
/// - Unconsumed slots are exactly `[top, bottom)` once `bottom`'s optimistic
///   decrement has been reconciled; the reconciled length is never negative.
/// - `slab` is replaced only by the owner; old slabs go to `retired` and
///   stay allocated until the deque drops.
/// - `retired` is touched only by the owner (and by `Drop`, which has
///   exclusive access by construction).
struct DequeShared<T> {
    /// Owner-end index. Written only by the owner; read by thieves.
    bottom: CachePadded<AtomicI64>,
    /// Thief-end index. Advanced by the winning CAS of a steal or of the
    /// owner's last-element pop.
    top: CachePadded<AtomicI64>,
    /// Current slab. Published with Release on replacement.
    slab: AtomicPtr<Slab<T>>,
    /// Replaced slabs, kept alive for in-flight thief reads.
    retired: UnsafeCell<Vec<*mut Slab<T>>>,
}

// SAFETY: the deque protocol confines slot writes to the owner, slot
// consumption to CAS winners, and `retired` to the owner; all cross-thread
// hand-off goes through the atomics above.
unsafe impl<T: Send> Send for DequeShared<T> {}
unsafe impl<T: Send> Sync for DequeShared<T> {}

impl<T> DequeShared<T> {
    /// Replace the current slab with one of `new_exponent`, copying the live
    /// range `[top, bottom)`.
    ///
    /// # Safety
    /// Owner-only. `[top, bottom)` must be the live range and must fit the
    /// new capacity.
    unsafe fn replace_slab(&self, new_exponent: u32, top: i64, bottom: i64) -> *mut Slab<T> {
        let old_ptr = self.slab.load(Ordering::Relaxed);
        let old = &*old_ptr;
        debug_assert!(bottom - top < (1i64 << new_exponent));

        let new = Slab::new(new_exponent);
        for index in top..bottom {
            new.write_raw(index, old.read_raw(index));
        }
        let new_ptr = Box::into_raw(new);
        self.slab.store(new_ptr, Ordering::Release);

        // SAFETY: only the owner reaches this path.
        (*self.retired.get()).push(old_ptr);
        new_ptr
    }
}

impl<T> Drop for DequeShared<T> {
    fn drop(&mut self) {
        let top = self.top.load(Ordering::Relaxed);
        let bottom = self.bottom.load(Ordering::Relaxed);
        let slab_ptr = self.slab.load(Ordering::Relaxed);

        // SAFETY: exclusive access; `[top, bottom)` of the current slab holds
        // the remaining unconsumed items.
        unsafe {
            let slab = Box::from_raw(slab_ptr);
            for index in top..bottom.max(top) {
                slab.read_raw(index).assume_init();
            }
            drop(slab);

            for retired in (*self.retired.get()).drain(..) {
                // Retired slabs hold only consumed or copied bytes; free the
                // storage without running destructors.
                drop(Box::from_raw(retired));
            }
        }
    }
}

// ============================================================================
// Handles
// ============================================================================

/// Owner handle: push and pop at the bottom end.
///
/// Exactly one thread may own this handle; exclusivity is enforced by the
/// `&mut self` receivers, so "no two threads call owner operations
/// concurrently" holds by construction rather than by documentation.
pub struct WorkDeque<T> {
    shared: Arc<DequeShared<T>>,
    /// Owner ops are single-threaded; keep the handle `!Sync`.
    _not_sync: PhantomData<std::cell::Cell<()>>,
}

// SAFETY: moving the owner handle to another thread is fine; the protocol
// only forbids concurrent owner calls, which `&mut self` already does.
unsafe impl<T: Send> Send for WorkDeque<T> {}

/// Thief handle: steal at the top end. Cheap to clone, any thread.
pub struct Stealer<T> {
    shared: Arc<DequeShared<T>>,
}

impl<T> Clone for Stealer<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Create a deque with initial capacity `1 << exponent`.
///
/// Returns the unique owner handle and one stealer (clone it per thief).
pub fn work_deque<T: Send>(exponent: u32) -> (WorkDeque<T>, Stealer<T>) {
    assert!(exponent >= MIN_EXPONENT, "deque exponent must be >= 1");
    let shared = Arc::new(DequeShared {
        bottom: CachePadded::new(AtomicI64::new(0)),
        top: CachePadded::new(AtomicI64::new(0)),
        slab: AtomicPtr::new(Box::into_raw(Slab::new(exponent))),
        retired: UnsafeCell::new(Vec::new()),
    });
    (
        WorkDeque {
            shared: Arc::clone(&shared),
            _not_sync: PhantomData,
        },
        Stealer { shared },
    )
}

impl<T: Send> WorkDeque<T> {
    /// Push an item at the bottom end. Always succeeds; grows the slab to
    /// exponent + 1 when occupancy would reach capacity − 1.
    pub fn push_bottom(&mut self, item: T) {
        let shared = &*self.shared;
        let bottom = shared.bottom.load(Ordering::Relaxed);
        let top = shared.top.load(Ordering::Acquire);

        let mut slab_ptr = shared.slab.load(Ordering::Relaxed);
        // SAFETY: slabs stay allocated for the deque's lifetime.
        if bottom - top >= unsafe { (*slab_ptr).capacity() } - 1 {
            // SAFETY: owner-only call; [top, bottom) is the live range.
            slab_ptr =
                unsafe { shared.replace_slab((*slab_ptr).exponent + 1, top, bottom) };
        }

        // SAFETY: index `bottom` is outside [top, bottom), so no thief reads
        // this physical slot until the Release store below publishes it.
        unsafe { (*slab_ptr).write_raw(bottom, MaybeUninit::new(item)) };
        shared.bottom.store(bottom + 1, Ordering::Release);
    }

    /// Pop an item from the bottom end.
    ///
    /// Returns `None` when the deque is empty or a thief won the race for
    /// the final element. May shrink the slab when occupancy drops below a
    /// quarter of capacity.
    pub fn pop_bottom(&mut self) -> Option<T> {
        let shared = &*self.shared;
        let bottom = shared.bottom.load(Ordering::Relaxed) - 1;
        shared.bottom.store(bottom, Ordering::Relaxed);
        // Totally order the bottom decrement against thief top/bottom loads.
        fence(Ordering::SeqCst);
        let top = shared.top.load(Ordering::Relaxed);

        let len = bottom - top;
        if len < 0 {
            // Empty: undo the optimistic decrement.
            shared.bottom.store(top, Ordering::Relaxed);
            return None;
        }

        let slab_ptr = shared.slab.load(Ordering::Relaxed);
        // SAFETY: len >= 0, so `bottom` indexes a published slot that no
        // thief can claim (thieves consume from `top`, and top == bottom is
        // handled by the CAS below).
        let slab = unsafe { &*slab_ptr };
        let item = unsafe { slab.read_raw(bottom) };

        if len > 0 {
            if len < slab.capacity() / 4 && slab.exponent > MIN_EXPONENT {
                // SAFETY: owner-only; remaining live range is [top, bottom).
                unsafe { shared.replace_slab(slab.exponent - 1, top, bottom) };
            }
            // SAFETY: the slot held a T and only this pop consumes it.
            return Some(unsafe { item.assume_init() });
        }

        // Exactly one element left: race any thief for it via top.
        let won = shared
            .top
            .compare_exchange(top, top + 1, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok();
        shared.bottom.store(top + 1, Ordering::Relaxed);
        if won {
            // SAFETY: winning the CAS makes this pop the unique consumer.
            Some(unsafe { item.assume_init() })
        } else {
            // A thief took it; `item` stays raw bytes and is forgotten.
            None
        }
    }

    /// Current slab capacity. Exposed for growth/shrink observability.
    pub fn capacity(&self) -> usize {
        // SAFETY: slabs stay allocated for the deque's lifetime.
        unsafe { (*self.shared.slab.load(Ordering::Relaxed)).capacity() as usize }
    }

    /// Number of unconsumed items (owner's view; racy under concurrent
    /// steals, exact when quiescent).
    pub fn len(&self) -> usize {
        let bottom = self.shared.bottom.load(Ordering::Relaxed);
        let top = self.shared.top.load(Ordering::Relaxed);
        (bottom - top).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Send> Stealer<T> {
    /// Steal an item from the top end.
    ///
    /// `None` means empty *or* a lost race (with the owner's last-element
    /// pop or another thief). Callers must move on to a different victim
    /// rather than rereading the same slot.
    pub fn steal(&self) -> Option<T> {
        let shared = &*self.shared;
        let top = shared.top.load(Ordering::Acquire);
        fence(Ordering::SeqCst);
        let bottom = shared.bottom.load(Ordering::Acquire);

        if bottom - top <= 0 {
            return None;
        }

        // Tentatively copy the slot bytes, then claim them with the CAS. A
        // stale read (the owner lapped this slot after we loaded `top`) makes
        // the CAS fail and the bytes are discarded unmaterialized.
        let slab_ptr = shared.slab.load(Ordering::Acquire);
        // SAFETY: slabs stay allocated for the deque's lifetime; the read is
        // a raw byte copy, validated by the CAS before use.
        let item = unsafe { (*slab_ptr).read_raw(top) };

        if shared
            .top
            .compare_exchange(top, top + 1, Ordering::SeqCst, Ordering::Relaxed)
            .is_err()
        {
            return None;
        }
        // SAFETY: the CAS win makes this steal the unique consumer of `top`.
        Some(unsafe { item.assume_init() })
    }
}

// ============================================================================
// Tests
// ============================================================================


#[cfg(all(test, feature = "stdx-proptest", not(loom)))]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::VecDeque;

    #[derive(Debug, Clone)]
    enum Op {
        Push(u64),
        Pop,
        Steal,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            any::<u64>().prop_map(Op::Push),
            Just(Op::Pop),
            Just(Op::Steal),
        ]
    }

    proptest! {
        /// Single-threaded op sequences match a VecDeque model exactly:
        /// pop takes the back, steal takes the front.
        #[test]
        fn matches_sequential_model(ops in proptest::collection::vec(op_strategy(), 0..400)) {
            let (mut owner, stealer) = work_deque::<u64>(1);
            let mut model: VecDeque<u64> = VecDeque::new();

            for op in ops {
                match op {
                    Op::Push(v) => {
                        owner.push_bottom(v);
                        model.push_back(v);
                    }
                    Op::Pop => prop_assert_eq!(owner.pop_bottom(), model.pop_back()),
                    Op::Steal => prop_assert_eq!(stealer.steal(), model.pop_front()),
                }
                prop_assert_eq!(owner.len(), model.len());
            }
        }
    }
}

#[cfg(all(test, loom))]
mod loom_tests {
    use super::*;
    use loom::thread;

    /// The single-element pop/steal race: exactly one side wins, never both,
    /// never neither.
    #[test]
    fn loom_last_element_race() {
        loom::model(|| {
            let (mut owner, stealer) = work_deque::<u32>(1);
            owner.push_bottom(42);

            let thief = thread::spawn(move || stealer.steal());
            let popped = owner.pop_bottom();
            let stolen = thief.join().unwrap();

            let delivered = popped.is_some() as u32 + stolen.is_some() as u32;
            assert_eq!(delivered, 1, "popped={:?} stolen={:?}", popped, stolen);
            assert_eq!(popped.or(stolen), Some(42));
        });
    }

    /// Two items, concurrent pop and steal: no duplication, no loss.
    #[test]
    fn loom_two_items_no_duplication() {
        loom::model(|| {
            let (mut owner, stealer) = work_deque::<u32>(1);
            owner.push_bottom(1);
            owner.push_bottom(2);

            let thief = thread::spawn(move || stealer.steal());
            let mut got = Vec::new();
            while let Some(v) = owner.pop_bottom() {
                got.push(v);
            }
            if let Some(v) = thief.join().unwrap() {
                got.push(v);
            }

            got.sort_unstable();
            assert_eq!(got, vec![1, 2]);
        });
    }
}
