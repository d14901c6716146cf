use std::io;

use thiserror::Error;

/// Errors surfaced synchronously by lifecycle and configuration calls.
///
/// Per-sample failures ([`Error::StackTooDeep`], [`Error::TooManyThreads`],
/// [`Error::RuntimeUnavailable`]) are caught and counted by the sampler loops
/// rather than propagated to callers of [`crate::sampler::Sampler::start`]; they
/// are exposed here so tests and the async path's post-mortem inspection can
/// name them precisely.
#[derive(Debug, Error)]
pub enum Error {
    /// `start` was called while the sampler was already running.
    #[error("sampler is already running")]
    AlreadyRunning,

    /// `stop` (or a mutation requiring a stopped sampler) was called while not running.
    #[error("sampler is not running")]
    NotRunning,

    /// A configuration value failed validation: an unknown time-mode name, a
    /// non-positive interval, or a discount factor outside `(0, 1]`.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The frame walker's fixed-size buffer could not hold the canonicalized
    /// stack string. The sample that triggered this is dropped; the sampler
    /// keeps running.
    #[error("stack too deep for the sampling buffer")]
    StackTooDeep,

    /// The shadow-stack table has no free slots for a new thread.
    #[error("too many threads for the shadow-stack table")]
    TooManyThreads,

    /// A runtime-contract call (thread enumeration, frame access) failed.
    #[error("runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    /// Wraps an I/O failure from [`crate::report::Report::save`], returned
    /// verbatim to the caller.
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
