//! The contract this crate consumes from a managed, interpreted runtime.
//!
//! Everything that would otherwise require linking against a concrete
//! interpreter — CPython, a CLR host, whatever — is expressed here as a
//! trait. An embedding crate, out of scope for this core, implements these
//! against its real runtime; tests and examples in this crate use a small
//! in-memory fake instead.

use std::io;
use std::sync::Arc;

/// One frame of an interpreted call stack.
///
/// The walker holds at most one frame of the chain at a time: it reads
/// `parent()` to obtain the caller and then drops the callee, so "no
/// long-lived frame handles escape the walker".
pub trait Frame: Sized {
    /// Source file path as the runtime reports it.
    fn file(&self) -> &str;

    /// Qualified function name; runtimes without qualnames should return
    /// the plain function name.
    fn qualname(&self) -> &str;

    /// The function's first definition line.
    fn first_line(&self) -> u32;

    /// The line currently executing in this frame.
    fn current_line(&self) -> u32;

    /// The caller's frame, or `None` at the outermost frame.
    fn parent(&self) -> Option<Self>;
}

/// Enumerates live threads and hands out their topmost frame.
pub trait ThreadRegistry {
    type Frame: Frame;

    /// All live threads known to the runtime, as `(thread_id, thread_name)`.
    /// May take whatever locks the runtime's public enumeration API normally
    /// takes; only safe to call from the periodic sampler's own worker
    /// thread, never from inside a signal handler.
    fn threads(&self) -> io::Result<Vec<(u64, String)>>;

    /// The same enumeration as [`ThreadRegistry::threads`], but safe to call
    /// from inside a signal handler running on an interrupted thread: it
    /// must read the runtime's internal active/limbo thread mappings
    /// directly rather than calling through the public enumeration API,
    /// which may be holding a lock the interrupted thread itself owns.
    fn threads_signal_safe(&self) -> io::Result<Vec<(u64, String)>>;

    /// The innermost (currently executing) frame of the given thread, or
    /// `None` if the thread has no Python-level frame right now (e.g. it is
    /// blocked entirely in native code with no frame pushed yet).
    fn topmost_frame(&self, thread_id: u64) -> io::Result<Option<Self::Frame>>;
}

impl<T: ThreadRegistry> ThreadRegistry for Arc<T> {
    type Frame = T::Frame;

    fn threads(&self) -> io::Result<Vec<(u64, String)>> {
        (**self).threads()
    }

    fn threads_signal_safe(&self) -> io::Result<Vec<(u64, String)>> {
        (**self).threads_signal_safe()
    }

    fn topmost_frame(&self, thread_id: u64) -> io::Result<Option<Self::Frame>> {
        (**self).topmost_frame(thread_id)
    }
}

/// A native callable invoked from interpreted code, as reported by the
/// runtime's profiling hook.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NativeCallable {
    /// Opaque identifier stable for the lifetime of the callable.
    pub cfunc_id: u64,
    /// Defining module name, used as the synthesized stack's leading segment.
    pub module: String,
    /// The callable's own name.
    pub name: String,
}

/// Receives native-callable enter/exit events from the runtime's profiling
/// hook. An embedding crate calls these from
/// inside its own hook callback; this crate never installs the hook itself.
pub trait NativeCallSink<F: Frame> {
    /// A native callable was entered on `thread_id`. `caller_frame` is the
    /// interpreted frame that was executing just before the call.
    fn on_native_enter(&self, thread_id: u64, callable: NativeCallable, caller_frame: Option<F>);

    /// A native callable returned on `thread_id`.
    fn on_native_return(&self, thread_id: u64);
}

/// Schedules a callable to run on the main thread at the next interpreter
/// safepoint, mirroring a `register_func_in_main` / `Py_AddPendingCall`
/// style bridge.
pub trait MainThreadScheduler {
    fn schedule(&self, callback: Box<dyn FnOnce() + Send>) -> io::Result<()>;
}
