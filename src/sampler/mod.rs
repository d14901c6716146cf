//! The periodic Thread Sampler: a dedicated worker thread that wakes on an
//! interval, walks every live thread's call stack, and folds the result into
//! a [`Trie`].

#[cfg(test)]
mod test;

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use log::{debug, warn};

use crate::clock;
use crate::config::{SamplerConfig, TimeMode};
use crate::error::{Error, Result};
use crate::runtime::ThreadRegistry;
use crate::trie::Trie;
use crate::walk::FrameWalker;

const MIN_BUFFER_CAPACITY: usize = 16 * 1024;

/// Counters exposed read-only through the lifetime of a sampler.
#[derive(Default)]
struct Counters {
    acc_sampling_time_ns: AtomicU64,
    sampling_times: AtomicU64,
    life_time_ns: AtomicU64,
}

/// A periodic, off-thread sampler over a [`ThreadRegistry`].
///
/// `config` is the "what to do" half; `trie`/`counters`/`worker` are the
/// "how far along" half, kept separate so a caller can read the former
/// without taking a lock the worker might be holding.
pub struct Sampler<R> {
    registry: Arc<R>,
    config: Mutex<SamplerConfig>,
    trie: Arc<Mutex<Trie>>,
    counters: Arc<Counters>,
    enabled: Arc<AtomicBool>,
    self_tid: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl<R> Sampler<R>
where
    R: ThreadRegistry + Send + Sync + 'static,
{
    /// Builds a stopped sampler against `registry`, using `config` as the
    /// initial configuration.
    pub fn new(registry: R, config: SamplerConfig) -> Sampler<R> {
        Sampler {
            registry: Arc::new(registry),
            config: Mutex::new(config),
            trie: Arc::new(Mutex::new(Trie::new())),
            counters: Arc::new(Counters::default()),
            enabled: Arc::new(AtomicBool::new(false)),
            self_tid: Arc::new(AtomicU64::new(u64::MAX)),
            worker: None,
        }
    }

    /// Whether the sampling loop is currently running.
    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// The worker thread's OS-level identifier, once started.
    pub fn sampling_thread(&self) -> Option<u64> {
        let tid = self.self_tid.load(Ordering::Acquire);
        (tid != u64::MAX).then_some(tid)
    }

    pub fn acc_sampling_time(&self) -> u64 {
        self.counters.acc_sampling_time_ns.load(Ordering::Acquire)
    }

    pub fn sampling_times(&self) -> u64 {
        self.counters.sampling_times.load(Ordering::Acquire)
    }

    pub fn life_time(&self) -> u64 {
        self.counters.life_time_ns.load(Ordering::Acquire)
    }

    /// Runs `f` against the current configuration. Mutation through
    /// [`Sampler::configure`] is rejected while running: fields are readable
    /// at any time but only writable while stopped.
    pub fn configure(&self, f: impl FnOnce(&mut SamplerConfig) -> Result<()>) -> Result<()> {
        if self.enabled() {
            return Err(Error::AlreadyRunning);
        }
        let mut cfg = self.config.lock().expect("sampler config lock poisoned");
        f(&mut cfg)
    }

    /// Starts the worker thread. Fails with [`Error::AlreadyRunning`] if
    /// already started.
    pub fn start(&mut self) -> Result<()> {
        if self.enabled.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyRunning);
        }

        let registry = Arc::clone(&self.registry);
        let trie = Arc::clone(&self.trie);
        let counters = Arc::clone(&self.counters);
        let enabled = Arc::clone(&self.enabled);
        let self_tid = Arc::clone(&self.self_tid);
        let config = self.config.lock().expect("sampler config lock poisoned").clone();

        let start_ns = clock::monotonic_ns();
        let handle = std::thread::spawn(move || {
            self_tid.store(worker_tid(), Ordering::Release);
            run_loop(&registry, &config, &trie, &counters, &enabled, &self_tid);
            counters
                .life_time_ns
                .store(clock::monotonic_ns().saturating_sub(start_ns), Ordering::Release);
        });
        self.worker = Some(handle);
        Ok(())
    }

    /// Clears `ENABLED` and joins the worker. Fails with [`Error::NotRunning`]
    /// if not started.
    pub fn stop(&mut self) -> Result<()> {
        if !self.enabled.swap(false, Ordering::AcqRel) {
            return Err(Error::NotRunning);
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        Ok(())
    }

    /// Resets the trie and counters. Legal only while stopped.
    pub fn clear(&self) -> Result<()> {
        if self.enabled() {
            return Err(Error::AlreadyRunning);
        }
        *self.trie.lock().expect("trie lock poisoned") = Trie::new();
        self.counters.acc_sampling_time_ns.store(0, Ordering::Release);
        self.counters.sampling_times.store(0, Ordering::Release);
        self.counters.life_time_ns.store(0, Ordering::Release);
        Ok(())
    }

    /// Writes the current trie's folded-stack output to `writer`.
    pub fn dump_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.trie.lock().expect("trie lock poisoned").dump_to(writer)
    }

    pub fn dump_to_string(&self) -> String {
        self.trie.lock().expect("trie lock poisoned").dump_to_string()
    }
}

#[cfg(target_os = "linux")]
fn worker_tid() -> u64 {
    unsafe { libc::syscall(libc::SYS_gettid) as u64 }
}

#[cfg(not(target_os = "linux"))]
fn worker_tid() -> u64 {
    // No portable OS-thread-id syscall off Linux; the self-exclusion check
    // below degenerates to "never matches," which is safe since the
    // registry never reports this worker as one of its own threads anyway.
    u64::MAX
}

fn run_loop<R>(
    registry: &R,
    config: &SamplerConfig,
    trie: &Mutex<Trie>,
    counters: &Counters,
    enabled: &AtomicBool,
    self_tid: &AtomicU64,
) where
    R: ThreadRegistry,
{
    let mut walker = FrameWalker::new();
    let mut buf = String::with_capacity(MIN_BUFFER_CAPACITY);
    let filters = config.filters();
    let my_tid = self_tid.load(Ordering::Acquire);

    while enabled.load(Ordering::Acquire) {
        std::thread::sleep(std::time::Duration::from_micros(config.sampling_interval));

        let t0 = sample_clock(config.time_mode);

        let threads = match registry.threads() {
            Ok(threads) => threads,
            Err(e) => {
                if config.debug {
                    warn!("thread enumeration failed: {e}");
                }
                continue;
            }
        };

        for (tid, name) in threads {
            if tid == my_tid {
                continue;
            }

            let frame = match registry.topmost_frame(tid) {
                Ok(frame) => frame,
                Err(e) => {
                    if config.debug {
                        warn!("frame lookup failed for thread {tid}: {e}");
                    }
                    continue;
                }
            };
            let Some(frame) = frame else { continue };

            buf.clear();
            buf.push_str(&name);
            buf.push(';');
            let prefix_len = buf.len();

            match walker.walk(frame, &mut buf, MIN_BUFFER_CAPACITY, &filters) {
                Ok(n) if n > 0 => {
                    if config.debug {
                        debug!("sample: {buf}");
                    }
                    trie.lock().expect("trie lock poisoned").add(&buf);
                }
                Ok(_) => {
                    buf.truncate(prefix_len);
                }
                Err(Error::StackTooDeep) => {
                    if config.debug {
                        warn!("dropping sample for thread {tid}: stack too deep for buffer");
                    }
                }
                Err(_) => {}
            }
        }

        let elapsed = sample_clock(config.time_mode).saturating_sub(t0);
        counters.acc_sampling_time_ns.fetch_add(elapsed, Ordering::AcqRel);
        counters.sampling_times.fetch_add(1, Ordering::AcqRel);
    }
}

fn sample_clock(mode: Option<TimeMode>) -> u64 {
    match mode {
        Some(TimeMode::Cpu) => clock::thread_cpu_ns(),
        Some(TimeMode::Wall) | None => clock::monotonic_ns(),
    }
}
