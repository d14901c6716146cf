use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::*;
use crate::runtime::Frame as FrameTrait;

#[derive(Clone)]
struct StaticFrame {
    file: &'static str,
    qualname: &'static str,
    line: u32,
}

impl FrameTrait for StaticFrame {
    fn file(&self) -> &str {
        self.file
    }
    fn qualname(&self) -> &str {
        self.qualname
    }
    fn first_line(&self) -> u32 {
        self.line
    }
    fn current_line(&self) -> u32 {
        self.line
    }
    fn parent(&self) -> Option<Self> {
        None
    }
}

/// A registry with one fixed thread that always reports the same frame, so
/// the worker loop has something deterministic to sample.
struct OneThreadRegistry {
    frame: StaticFrame,
    lookups: AtomicUsize,
}

impl ThreadRegistry for OneThreadRegistry {
    type Frame = StaticFrame;

    fn threads(&self) -> io::Result<Vec<(u64, String)>> {
        Ok(vec![(1, "MainThread".to_owned())])
    }

    fn threads_signal_safe(&self) -> io::Result<Vec<(u64, String)>> {
        self.threads()
    }

    fn topmost_frame(&self, _thread_id: u64) -> io::Result<Option<Self::Frame>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(Some(self.frame.clone()))
    }
}

fn fast_config() -> SamplerConfig {
    let mut cfg = SamplerConfig::default();
    cfg.sampling_interval = 1_000; // 1ms
    cfg
}

#[test]
fn stop_without_start_fails_not_running() {
    let registry = OneThreadRegistry {
        frame: StaticFrame { file: "a.py", qualname: "f", line: 1 },
        lookups: AtomicUsize::new(0),
    };
    let mut sampler = Sampler::new(registry, fast_config());
    assert!(matches!(sampler.stop(), Err(Error::NotRunning)));
}

#[test]
fn double_start_fails_already_running() {
    let registry = OneThreadRegistry {
        frame: StaticFrame { file: "a.py", qualname: "f", line: 1 },
        lookups: AtomicUsize::new(0),
    };
    let mut sampler = Sampler::new(registry, fast_config());
    sampler.start().unwrap();
    assert!(matches!(sampler.start(), Err(Error::AlreadyRunning)));
    sampler.stop().unwrap();
}

#[test]
fn clear_while_running_fails_already_running() {
    let registry = OneThreadRegistry {
        frame: StaticFrame { file: "a.py", qualname: "f", line: 1 },
        lookups: AtomicUsize::new(0),
    };
    let mut sampler = Sampler::new(registry, fast_config());
    sampler.start().unwrap();
    assert!(matches!(sampler.clear(), Err(Error::AlreadyRunning)));
    sampler.stop().unwrap();
}

#[test]
fn configure_while_running_fails_already_running() {
    let registry = OneThreadRegistry {
        frame: StaticFrame { file: "a.py", qualname: "f", line: 1 },
        lookups: AtomicUsize::new(0),
    };
    let mut sampler = Sampler::new(registry, fast_config());
    sampler.start().unwrap();
    let result = sampler.configure(|cfg| cfg.set_time_mode("cpu"));
    assert!(matches!(result, Err(Error::AlreadyRunning)));
    sampler.stop().unwrap();
}

#[test]
fn unknown_time_mode_is_rejected_before_start() {
    let registry = OneThreadRegistry {
        frame: StaticFrame { file: "a.py", qualname: "f", line: 1 },
        lookups: AtomicUsize::new(0),
    };
    let sampler = Sampler::new(registry, fast_config());
    let result = sampler.configure(|cfg| cfg.set_time_mode("stopwatch"));
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}

#[test]
fn full_run_accumulates_samples_and_counters() {
    let _ = env_logger::builder().is_test(true).try_init();

    let registry = OneThreadRegistry {
        frame: StaticFrame { file: "app.py", qualname: "work", line: 10 },
        lookups: AtomicUsize::new(0),
    };
    let mut cfg = fast_config();
    cfg.debug = true;
    let mut sampler = Sampler::new(registry, cfg);

    sampler.start().unwrap();
    std::thread::sleep(Duration::from_millis(50));
    sampler.stop().unwrap();

    assert!(sampler.sampling_times() > 0);
    assert!(sampler.life_time() > 0);

    let folded = sampler.dump_to_string();
    let line = folded.lines().next().expect("at least one sample recorded");
    assert!(line.starts_with("MainThread;app.py:work:10 "));
}

#[test]
fn clear_after_stop_resets_trie_and_counters() {
    let registry = OneThreadRegistry {
        frame: StaticFrame { file: "app.py", qualname: "work", line: 10 },
        lookups: AtomicUsize::new(0),
    };
    let mut sampler = Sampler::new(registry, fast_config());
    sampler.start().unwrap();
    std::thread::sleep(Duration::from_millis(20));
    sampler.stop().unwrap();
    assert!(sampler.sampling_times() > 0);

    sampler.clear().unwrap();
    assert_eq!(sampler.sampling_times(), 0);
    assert_eq!(sampler.acc_sampling_time(), 0);
    assert_eq!(sampler.dump_to_string(), "");
}

#[test]
fn zero_interval_does_not_deadlock_stop() {
    let registry = OneThreadRegistry {
        frame: StaticFrame { file: "app.py", qualname: "work", line: 1 },
        lookups: AtomicUsize::new(0),
    };
    let mut cfg = SamplerConfig::default();
    cfg.sampling_interval = 0;
    let mut sampler = Sampler::new(registry, cfg);
    sampler.start().unwrap();
    std::thread::sleep(Duration::from_millis(5));
    sampler.stop().unwrap();
    assert!(sampler.sampling_times() > 0);
}

struct NoThreadsRegistry;

impl ThreadRegistry for NoThreadsRegistry {
    type Frame = StaticFrame;

    fn threads(&self) -> io::Result<Vec<(u64, String)>> {
        Ok(Vec::new())
    }

    fn threads_signal_safe(&self) -> io::Result<Vec<(u64, String)>> {
        self.threads()
    }

    fn topmost_frame(&self, _thread_id: u64) -> io::Result<Option<Self::Frame>> {
        Ok(None)
    }
}

#[test]
fn sampling_with_no_threads_advances_counters_without_inserting() {
    let mut sampler = Sampler::new(NoThreadsRegistry, fast_config());
    sampler.start().unwrap();
    std::thread::sleep(Duration::from_millis(20));
    sampler.stop().unwrap();

    assert!(sampler.sampling_times() > 0);
    assert_eq!(sampler.dump_to_string(), "");
}

