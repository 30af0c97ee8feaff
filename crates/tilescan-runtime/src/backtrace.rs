/// Contains the backtrace information if available.
#[derive(Clone)]
pub struct BackTrace {
    inner: String,
}

impl BackTrace {
    /// Creates a new backtrace from the current thread.
    ///
    /// The capture honours `RUST_BACKTRACE`, so it stays cheap in release runs.
    pub fn capture() -> Self {
        Self {
            inner: format!("{}", std::backtrace::Backtrace::capture()),
        }
    }
}

impl core::fmt::Debug for BackTrace {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{}", self.inner))
    }
}

impl core::fmt::Display for BackTrace {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{}", self.inner))
    }
}
