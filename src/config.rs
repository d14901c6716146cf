//! The configuration surface shared by the periodic and async samplers,
//! factored out of the sampler types themselves so "what to run with" stays
//! separate from "how far along a run is."

use regex::Regex;

use crate::error::{Error, Result};
use crate::walk::Filters;

/// Default C-call discount factor: a documented, validated tunable rather
/// than a hardcoded constant.
pub const DEFAULT_CFUNC_DISCOUNT: f64 = 0.8;

/// Which clock a sampler charges its per-sample cost against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimeMode {
    /// Charge against the sampler's own thread-CPU clock.
    Cpu,
    /// Charge against the monotonic wall clock.
    Wall,
}

impl TimeMode {
    /// Parses a time-mode name, case-insensitively. Unknown names fail with
    /// [`Error::InvalidConfig`].
    pub fn parse(name: &str) -> Result<TimeMode> {
        match name.to_ascii_lowercase().as_str() {
            "cpu" => Ok(TimeMode::Cpu),
            "wall" => Ok(TimeMode::Wall),
            other => Err(Error::InvalidConfig(format!("unknown time mode: {other:?}"))),
        }
    }
}

/// Configuration for a [`crate::sampler::Sampler`] or
/// [`crate::async_sampler::AsyncSampler`].
///
/// Writable fields are writable only while the owning sampler is not
/// running.
#[derive(Clone)]
pub struct SamplerConfig {
    /// Sampling period in microseconds. Zero is legal: the sampler
    /// busy-loops at the runtime's own sleep granularity.
    pub sampling_interval: u64,
    pub time_mode: Option<TimeMode>,
    pub debug: bool,
    pub ignore_frozen: bool,
    pub ignore_self: bool,
    pub tree_mode: bool,
    pub focus_mode: bool,
    pub trace_cfunction: bool,
    /// Ordered list of compiled regex patterns; an empty list passes every
    /// frame.
    pub regex_patterns: Vec<Regex>,
    /// Cached stdlib directory prefix used by focus mode.
    pub stdlib_prefix: Option<String>,
    /// Discount applied to C-call synthesized weights.
    /// Must lie in `(0.0, 1.0]`.
    pub cfunc_discount: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        SamplerConfig {
            sampling_interval: 1_000,
            time_mode: Some(TimeMode::Wall),
            debug: false,
            ignore_frozen: false,
            ignore_self: false,
            tree_mode: false,
            focus_mode: false,
            trace_cfunction: false,
            regex_patterns: Vec::new(),
            stdlib_prefix: None,
            cfunc_discount: DEFAULT_CFUNC_DISCOUNT,
        }
    }
}

impl SamplerConfig {
    /// Validates `cfunc_discount` and sets it.
    pub fn set_cfunc_discount(&mut self, discount: f64) -> Result<()> {
        if discount > 0.0 && discount <= 1.0 {
            self.cfunc_discount = discount;
            Ok(())
        } else {
            Err(Error::InvalidConfig(format!(
                "cfunc discount must be in (0, 1], got {discount}"
            )))
        }
    }

    /// Sets the time mode by name.
    pub fn set_time_mode(&mut self, name: &str) -> Result<()> {
        self.time_mode = Some(TimeMode::parse(name)?);
        Ok(())
    }

    /// Builds the frame-walker filter set implied by this configuration.
    pub fn filters(&self) -> Filters {
        Filters {
            tree_mode: self.tree_mode,
            focus_mode: self.focus_mode,
            ignore_self: self.ignore_self,
            ignore_frozen: self.ignore_frozen,
            stdlib_prefix: self.stdlib_prefix.clone(),
            self_path: env!("CARGO_MANIFEST_DIR").to_owned(),
            regex_patterns: self.regex_patterns.clone(),
        }
    }
}
