//! The C-call bridge: a process-wide table of per-thread shadow stacks that
//! merges native-callable enter/exit events with the sampled interpreted
//! stack.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::runtime::{Frame, NativeCallSink, NativeCallable};
use crate::trie::Trie;
use crate::walk::{Filters, FrameWalker};

const UNASSIGNED: u64 = 0;

/// One entry on a [`ShadowStackSlot`]'s push-down stack.
struct NativeCallFrame<F> {
    cfunc_id: u64,
    module: String,
    name: String,
    caller_frame: Option<F>,
    enter_cpu_ns: u64,
}

/// Per-thread native-call stack.
///
/// `stack` is only ever touched by the one application thread that owns
/// this slot, once [`ShadowStackTable::slot_index`] has bound `thread_id`
/// to it — the table hands out `&ShadowStackSlot` to many threads
/// concurrently, but each slot's data has exactly one writer by
/// construction, so the `UnsafeCell` access below never races: once a thread
/// has cached its slot index, mutating that slot's list requires no lock.
struct ShadowStackSlot<F> {
    thread_id: AtomicU64,
    stack: UnsafeCell<Vec<NativeCallFrame<F>>>,
}

// SAFETY: see the single-writer-per-slot invariant documented above.
unsafe impl<F> Sync for ShadowStackSlot<F> {}

impl<F> ShadowStackSlot<F> {
    fn new() -> Self {
        ShadowStackSlot {
            thread_id: AtomicU64::new(UNASSIGNED),
            stack: UnsafeCell::new(Vec::new()),
        }
    }

    #[allow(clippy::mut_from_ref)]
    unsafe fn stack_mut(&self) -> &mut Vec<NativeCallFrame<F>> {
        &mut *self.stack.get()
    }
}

thread_local! {
    static CACHED_SLOT: std::cell::Cell<Option<(usize, usize)>> = const { std::cell::Cell::new(None) };
}

/// A fixed-capacity, lock-free-allocation table mapping OS thread handles to
/// [`ShadowStackSlot`]s. Allocation uses a CAS loop rather than a sleeping
/// lock: allocation is rare, contention is rare, and a sleeping lock would
/// invert priority against the sampling thread.
pub struct ShadowStackTable<F: Frame> {
    slots: Box<[ShadowStackSlot<F>]>,
    trie: std::sync::Arc<Mutex<Trie>>,
    filters: Filters,
    sampling_interval_us: u64,
    discount: f64,
    too_many_threads: AtomicU64,
}

impl<F: Frame> ShadowStackTable<F> {
    /// Builds a table with room for `capacity` distinct threads.
    pub fn new(capacity: usize, trie: std::sync::Arc<Mutex<Trie>>, filters: Filters, sampling_interval_us: u64, discount: f64) -> Self {
        let slots = (0..capacity).map(|_| ShadowStackSlot::new()).collect();
        ShadowStackTable {
            slots,
            trie,
            filters,
            sampling_interval_us,
            discount,
            too_many_threads: AtomicU64::new(0),
        }
    }

    pub fn too_many_threads_count(&self) -> u64 {
        self.too_many_threads.load(Ordering::Acquire)
    }

    fn slot_index(&self, thread_id: u64) -> Result<usize> {
        let table_addr = self as *const _ as *const () as usize;

        if let Some((addr, idx)) = CACHED_SLOT.with(|c| c.get()) {
            if addr == table_addr && self.slots[idx].thread_id.load(Ordering::Acquire) == thread_id {
                return Ok(idx);
            }
        }

        for (i, slot) in self.slots.iter().enumerate() {
            if slot.thread_id.load(Ordering::Acquire) == thread_id {
                CACHED_SLOT.with(|c| c.set(Some((table_addr, i))));
                return Ok(i);
            }
        }

        for (i, slot) in self.slots.iter().enumerate() {
            if slot
                .thread_id
                .compare_exchange(UNASSIGNED, thread_id, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                CACHED_SLOT.with(|c| c.set(Some((table_addr, i))));
                return Ok(i);
            }
        }

        Err(Error::TooManyThreads)
    }

    fn push(&self, thread_id: u64, entry: NativeCallFrame<F>) -> Result<()> {
        let idx = self.slot_index(thread_id)?;
        // SAFETY: `idx` was bound to `thread_id` by `slot_index`, and only
        // the calling thread ever pushes/pops its own slot.
        unsafe { self.slots[idx].stack_mut() }.push(entry);
        Ok(())
    }

    fn pop(&self, thread_id: u64) -> Option<NativeCallFrame<F>> {
        let idx = self.slot_index(thread_id).ok()?;
        unsafe { self.slots[idx].stack_mut() }.pop()
    }

    /// Computes the discounted weight for a completed native call:
    /// `floor(duration_us / sampling_interval_us) * discount`, truncated to
    /// `u64` after the multiply.
    fn synthesize_weight(&self, duration_us: u64) -> u64 {
        if self.sampling_interval_us == 0 {
            return 0;
        }
        let ticks = duration_us / self.sampling_interval_us;
        (ticks as f64 * self.discount) as u64
    }
}

impl<F: Frame> NativeCallSink<F> for ShadowStackTable<F> {
    fn on_native_enter(&self, thread_id: u64, callable: NativeCallable, caller_frame: Option<F>) {
        let entry = NativeCallFrame {
            cfunc_id: callable.cfunc_id,
            module: callable.module,
            name: callable.name,
            caller_frame,
            enter_cpu_ns: crate::clock::thread_cpu_ns(),
        };
        if self.push(thread_id, entry).is_err() {
            self.too_many_threads.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn on_native_return(&self, thread_id: u64) {
        let Some(entry) = self.pop(thread_id) else {
            return;
        };

        let duration_us = crate::clock::ns_to_us(crate::clock::thread_cpu_ns().saturating_sub(entry.enter_cpu_ns));
        let weight = self.synthesize_weight(duration_us);
        if weight == 0 {
            return;
        }

        let mut buf = String::new();
        if let Some(frame) = entry.caller_frame {
            let mut walker = FrameWalker::new();
            if walker.walk(frame, &mut buf, 16 * 1024, &self.filters).is_err() {
                return;
            }
            if !buf.is_empty() {
                buf.push(';');
            }
        }
        buf.push_str(&entry.module);
        buf.push(':');
        buf.push_str(&entry.name);
        buf.push_str(":0");

        self.trie.lock().expect("trie lock poisoned").add_weighted(&buf, weight);
    }
}
