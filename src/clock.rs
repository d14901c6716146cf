//! Monotonic time sources for the sampler.
//!
//! Mirrors `htime.c` from the source runtime: all readings are nanoseconds
//! since an unspecified epoch, strictly nondecreasing within one thread's
//! observation of them, and obtained straight from `clock_gettime` rather
//! than through a general-purpose time crate.

const NANOS_PER_SEC: u64 = 1_000_000_000;

fn gettime_ns(clock_id: libc::clockid_t) -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    let rc = unsafe { libc::clock_gettime(clock_id, &mut ts) };
    if rc != 0 {
        return 0;
    }
    (ts.tv_sec as u64)
        .saturating_mul(NANOS_PER_SEC)
        .saturating_add(ts.tv_nsec as u64)
}

/// Process-wide wall-clock time, nanosecond precision.
pub fn monotonic_ns() -> u64 {
    gettime_ns(libc::CLOCK_MONOTONIC)
}

/// CPU time consumed by the calling thread, nanosecond precision.
///
/// Falls back to [`process_cpu_ns`] on platforms without
/// `CLOCK_THREAD_CPUTIME_ID`.
#[cfg(any(target_os = "linux", target_os = "android", target_os = "macos"))]
pub fn thread_cpu_ns() -> u64 {
    gettime_ns(libc::CLOCK_THREAD_CPUTIME_ID)
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "macos")))]
pub fn thread_cpu_ns() -> u64 {
    process_cpu_ns()
}

/// CPU time consumed by every thread in the current process, nanosecond precision.
pub fn process_cpu_ns() -> u64 {
    gettime_ns(libc::CLOCK_PROCESS_CPUTIME_ID)
}

/// Truncating conversion to microseconds.
pub fn ns_to_us(ns: u64) -> u64 {
    ns / 1_000
}

/// Truncating conversion to milliseconds.
pub fn ns_to_ms(ns: u64) -> u64 {
    ns / 1_000_000
}
