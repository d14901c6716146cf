//! Frame-chain walking, filtering, and canonicalization into the
//! semicolon-delimited stack strings the trie consumes.


use regex::Regex;

use crate::error::{Error, Result};
use crate::runtime::Frame;

/// The filter stack applied to every frame during a walk, plus the
/// line-number mode (tree vs. definition-line).
pub struct Filters {
    /// Tree-mode uses the currently executing line; off uses the function's
    /// first definition line.
    pub tree_mode: bool,
    pub focus_mode: bool,
    pub ignore_self: bool,
    pub ignore_frozen: bool,
    /// Cached stdlib directory prefix, used by focus mode.
    pub stdlib_prefix: Option<String>,
    /// Path segment(s) identifying this profiler's own install location,
    /// used by ignore-self.
    pub self_path: String,
    /// Ordered list of compiled patterns; empty means "pass everything."
    pub regex_patterns: Vec<Regex>,
}

impl Default for Filters {
    fn default() -> Self {
        Filters {
            tree_mode: false,
            focus_mode: false,
            ignore_self: false,
            ignore_frozen: false,
            stdlib_prefix: None,
            self_path: env!("CARGO_MANIFEST_DIR").to_owned(),
            regex_patterns: Vec::new(),
        }
    }
}

impl Filters {
    fn passes(&self, file: &str, qualname: &str) -> bool {
        if self.focus_mode {
            let in_site_packages = file.contains("site-packages/");
            let in_stdlib = self
                .stdlib_prefix
                .as_deref()
                .is_some_and(|prefix| file.starts_with(prefix));
            if in_site_packages || in_stdlib {
                return false;
            }
        }

        if self.ignore_self && !self.self_path.is_empty() && file.contains(&self.self_path) {
            return false;
        }

        if !self.regex_patterns.is_empty()
            && !self
                .regex_patterns
                .iter()
                .any(|re| re.is_match(file) || re.is_match(qualname))
        {
            return false;
        }

        if self.ignore_frozen && file.starts_with("<frozen") {
            return false;
        }

        true
    }
}

/// One surviving frame, canonicalized but not yet joined into a stack string.
struct CanonicalFrame {
    file: String,
    qualname: String,
    line: u32,
}

/// Reusable walk state so repeated calls don't reallocate their scratch
/// buffer: once the internal frame list has been sized for the maximum
/// observed depth, the walk never allocates on its hot path again.
pub struct FrameWalker {
    scratch: Vec<CanonicalFrame>,
}

impl Default for FrameWalker {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameWalker {
    pub fn new() -> Self {
        FrameWalker {
            scratch: Vec::new(),
        }
    }

    /// Walks `frame`'s parent chain to the outermost frame, filters each
    /// frame, and appends the canonical `"<file>:<qualname>:<lineno>"`
    /// segments (outermost first) to `buf`, joined by `';'`.
    ///
    /// `capacity` bounds the *total* length `buf` may grow to relative to
    /// its length on entry; exceeding it fails with
    /// [`Error::StackTooDeep`] and leaves `buf` in an unspecified state.
    ///
    /// Returns the number of frames actually written (post-filtering).
    pub fn walk<F: Frame>(&mut self, frame: F, buf: &mut String, capacity: usize, filters: &Filters) -> Result<usize> {
        self.scratch.clear();

        let mut current = Some(frame);
        while let Some(f) = current {
            let file = f.file();
            let qualname = f.qualname();
            if filters.passes(file, qualname) {
                let line = if filters.tree_mode {
                    f.current_line()
                } else {
                    f.first_line()
                };
                self.scratch.push(CanonicalFrame {
                    file: file.to_owned(),
                    qualname: qualname.to_owned(),
                    line,
                });
            }
            current = f.parent();
        }

        let mut written = 0usize;
        for (i, frame) in self.scratch.iter().rev().enumerate() {
            if i > 0 {
                push_checked(buf, ";", capacity)?;
            }
            push_checked(buf, &frame.file, capacity)?;
            push_checked(buf, ":", capacity)?;
            push_checked(buf, &frame.qualname, capacity)?;
            push_checked(buf, ":", capacity)?;
            push_checked(buf, itoa(frame.line).as_str(), capacity)?;
            written += 1;
        }

        Ok(written)
    }
}

fn itoa(n: u32) -> String {
    n.to_string()
}

fn push_checked(buf: &mut String, s: &str, capacity: usize) -> Result<()> {
    if buf.len() + s.len() > capacity {
        return Err(Error::StackTooDeep);
    }
    buf.push_str(s);
    Ok(())
}
