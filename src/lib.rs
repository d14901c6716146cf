//! A statistical stack-sampling profiler core for a managed, interpreted
//! runtime.
//!
//! This crate owns three tightly-coupled pieces: a periodic [`sampler`]
//! and signal-driven [`async_sampler`] that walk live call stacks, a
//! prefix-merging aggregation [`trie`], and a [`shadow`]-stack bridge that
//! folds native-callable timing into the same trie. It never links against
//! a concrete interpreter: [`runtime`] defines the contract a host
//! extension module implements, and everything else here is ordinary,
//! runtime-agnostic Rust.
//!
//! # Example
//!
//! ```no_run
//! use stacktree_prof::config::SamplerConfig;
//! use stacktree_prof::runtime::{Frame, ThreadRegistry};
//! use stacktree_prof::sampler::Sampler;
//! # use std::io;
//! # #[derive(Clone)]
//! # struct MyFrame;
//! # impl Frame for MyFrame {
//! #     fn file(&self) -> &str { "app.py" }
//! #     fn qualname(&self) -> &str { "main" }
//! #     fn first_line(&self) -> u32 { 1 }
//! #     fn current_line(&self) -> u32 { 1 }
//! #     fn parent(&self) -> Option<Self> { None }
//! # }
//! # struct MyRuntime;
//! # impl ThreadRegistry for MyRuntime {
//! #     type Frame = MyFrame;
//! #     fn threads(&self) -> io::Result<Vec<(u64, String)>> { Ok(vec![]) }
//! #     fn threads_signal_safe(&self) -> io::Result<Vec<(u64, String)>> { Ok(vec![]) }
//! #     fn topmost_frame(&self, _: u64) -> io::Result<Option<Self::Frame>> { Ok(None) }
//! # }
//!
//! let mut sampler = Sampler::new(MyRuntime, SamplerConfig::default());
//! sampler.start()?;
//! std::thread::sleep(std::time::Duration::from_millis(10));
//! sampler.stop()?;
//! println!("{}", sampler.dump_to_string());
//! # Ok::<(), stacktree_prof::error::Error>(())
//! ```

pub mod async_sampler;
pub mod clock;
pub mod config;
pub mod error;
pub mod report;
pub mod runtime;
pub mod sampler;
pub mod shadow;
pub mod trie;
pub mod walk;

pub use config::SamplerConfig;
pub use error::{Error, Result};
pub use trie::Trie;
