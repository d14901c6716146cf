//! The signal-driven counterpart to [`crate::sampler::Sampler`].
//!
//! Meant to be invoked from a `SIGPROF` handler (or any caller on the main
//! thread of control that must complete without allocating, blocking, or
//! calling non-reentrant code). Everything here avoids the periodic
//! sampler's `Mutex`-guarded config clone-on-start and logging: the buffer is
//! sized once at construction, and failures are recorded into counters
//! rather than logged or returned.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::clock;
use crate::config::{SamplerConfig, TimeMode};
use crate::runtime::{Frame, MainThreadScheduler, ThreadRegistry};
use crate::trie::Trie;
use crate::walk::{Filters, FrameWalker};

const BUFFER_CAPACITY: usize = 16 * 1024;

/// Failure counters updated instead of logging or returning errors from the
/// signal path: it must not surface errors through the signal path itself,
/// so it records them here for later inspection instead.
#[derive(Default)]
pub struct AsyncFailureCounters {
    /// Signal deliveries dropped by the reentrancy guard.
    pub reentrant_skips: AtomicU64,
    /// Threads whose enumeration or frame lookup failed.
    pub runtime_unavailable: AtomicU64,
    /// Samples dropped because the preallocated buffer was too small.
    pub stack_too_deep: AtomicU64,
}

/// A construction-time-configured, signal-handler-safe sampler.
///
/// `R::threads_signal_safe()`/`R::topmost_frame()` are called from inside
/// [`AsyncSampler::async_routine`], which itself may run on a signal stack;
/// an embedding crate's `ThreadRegistry` impl used here must read the
/// runtime's thread table directly rather than through any API that can
/// block or re-enter interpreter locks.
pub struct AsyncSampler<R: ThreadRegistry> {
    registry: Arc<R>,
    config: SamplerConfig,
    filters: Filters,
    trie: Arc<Mutex<Trie>>,
    buf: Mutex<String>,
    sampling: AtomicBool,
    enabled: AtomicBool,
    start_ns: AtomicU64,
    life_time_ns: AtomicU64,
    pub failures: AsyncFailureCounters,
}

impl<R: ThreadRegistry> AsyncSampler<R> {
    /// Builds a stopped async sampler. `config` is captured once here and
    /// never mutated afterward — there is no live-reconfiguration surface on
    /// this path, unlike the periodic sampler.
    pub fn new(registry: R, config: SamplerConfig, trie: Arc<Mutex<Trie>>) -> AsyncSampler<R> {
        let filters = config.filters();
        AsyncSampler {
            registry: Arc::new(registry),
            config,
            filters,
            trie,
            buf: Mutex::new(String::with_capacity(BUFFER_CAPACITY)),
            sampling: AtomicBool::new(false),
            enabled: AtomicBool::new(false),
            start_ns: AtomicU64::new(0),
            life_time_ns: AtomicU64::new(0),
            failures: AsyncFailureCounters::default(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn life_time(&self) -> u64 {
        self.life_time_ns.load(Ordering::Acquire)
    }

    /// Records `start_time` and sets `ENABLED`.
    pub fn start(&self) {
        self.start_ns.store(sample_clock(self.config.time_mode), Ordering::Release);
        self.enabled.store(true, Ordering::Release);
    }

    /// Clears `ENABLED` and computes `life_time`.
    pub fn stop(&self) {
        self.enabled.store(false, Ordering::Release);
        let end = sample_clock(self.config.time_mode);
        let start = self.start_ns.load(Ordering::Acquire);
        self.life_time_ns.store(end.saturating_sub(start), Ordering::Release);
    }

    /// One signal-handler invocation: reentrancy-guarded, allocation-free on
    /// its fast paths, samples every thread except `main_tid` via the
    /// registry and folds `main_frame` in directly, since a signal handler's
    /// own interrupted frame is the one piece of state the registry can't
    /// hand back by thread id.
    pub fn async_routine(&self, main_tid: u64, main_frame: R::Frame) {
        if self.sampling.swap(true, Ordering::AcqRel) {
            self.failures.reentrant_skips.fetch_add(1, Ordering::Relaxed);
            return;
        }

        if !self.enabled() {
            self.sampling.store(false, Ordering::Release);
            return;
        }

        let mut walker = FrameWalker::new();
        let mut buf = self.buf.lock().expect("async sampler buffer lock poisoned");

        self.sample_one(&mut walker, &mut buf, main_tid, "MainThread", main_frame);

        match self.registry.threads_signal_safe() {
            Ok(threads) => {
                for (tid, name) in threads {
                    if tid == main_tid {
                        continue;
                    }
                    match self.registry.topmost_frame(tid) {
                        Ok(Some(frame)) => self.sample_one(&mut walker, &mut buf, tid, &name, frame),
                        Ok(None) => {}
                        Err(_) => {
                            self.failures.runtime_unavailable.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            }
            Err(_) => {
                self.failures.runtime_unavailable.fetch_add(1, Ordering::Relaxed);
            }
        }

        self.sampling.store(false, Ordering::Release);
    }

    fn sample_one(&self, walker: &mut FrameWalker, buf: &mut String, _tid: u64, name: &str, frame: R::Frame) {
        buf.clear();
        buf.push_str(name);
        buf.push(';');

        match walker.walk(frame, buf, BUFFER_CAPACITY, &self.filters) {
            Ok(n) if n > 0 => {
                self.trie.lock().expect("trie lock poisoned").add(buf);
            }
            Ok(_) => {}
            Err(_) => {
                self.failures.stack_too_deep.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl<R: ThreadRegistry + Send + Sync + 'static> AsyncSampler<R> {
    /// Schedules [`AsyncSampler::start`] to run on the main thread at the
    /// next interpreter safepoint, rather than flipping `ENABLED` directly
    /// from whatever thread the caller happens to be on. Since the signal
    /// that drives [`AsyncSampler::async_routine`] is itself only ever
    /// delivered on the main thread, routing the transition through the
    /// scheduler guarantees it can never be observed mid-delivery.
    pub fn start_on_main_thread(this: &Arc<Self>, scheduler: &dyn MainThreadScheduler) -> io::Result<()> {
        let this = Arc::clone(this);
        scheduler.schedule(Box::new(move || this.start()))
    }

    /// The `stop` counterpart of [`AsyncSampler::start_on_main_thread`].
    pub fn stop_on_main_thread(this: &Arc<Self>, scheduler: &dyn MainThreadScheduler) -> io::Result<()> {
        let this = Arc::clone(this);
        scheduler.schedule(Box::new(move || this.stop()))
    }
}

fn sample_clock(mode: Option<TimeMode>) -> u64 {
    match mode {
        Some(TimeMode::Cpu) => clock::thread_cpu_ns(),
        Some(TimeMode::Wall) | None => clock::monotonic_ns(),
    }
}
