//! Scoped-acquisition helpers: a no-op lock, an error-suppressing scope and
//! a reporting timer.

use std::any::Any;
use std::fmt;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

/// Value yielded by a [`NoopGuard`]
pub const NOOP_TOKEN: u8 = 1;

/// Anything with a scoped acquire/release interface
pub trait ScopedLock {
    /// Guard held for the duration of the scope
    type Guard<'a>
    where
        Self: 'a;

    /// Acquire the lock, releasing it when the guard drops
    fn acquire(&self) -> Self::Guard<'_>;

    /// Run `f` while holding the lock
    fn with<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.acquire();
        f()
    }
}

/// Lock that provides no mutual exclusion.
///
/// Stands in for a real lock on single-threaded paths. Panics and errors
/// raised while it is held propagate unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLock;

impl NoopLock {
    /// Create a no-op lock
    pub fn new() -> Self {
        Self
    }
}

/// Guard returned by [`NoopLock::acquire`]
#[derive(Debug)]
pub struct NoopGuard {
    _private: (),
}

impl NoopGuard {
    /// The constant sentinel handed out on entry
    pub fn token(&self) -> u8 {
        NOOP_TOKEN
    }
}

impl ScopedLock for NoopLock {
    type Guard<'a> = NoopGuard;

    fn acquire(&self) -> NoopGuard {
        NoopGuard { _private: () }
    }
}

impl ScopedLock for parking_lot::Mutex<()> {
    type Guard<'a> = parking_lot::MutexGuard<'a, ()>;

    fn acquire(&self) -> Self::Guard<'_> {
        self.lock()
    }
}

/// Scope that reports and swallows failures raised inside it.
///
/// Errors returned by the closure and panics unwinding out of it are
/// printed to stderr, logged, and treated as handled: the caller gets
/// `None` and carries on.
#[derive(Debug, Clone)]
pub struct SuppressingScope {
    label: String,
}

impl SuppressingScope {
    /// Create a scope whose reports are prefixed with `label`
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    /// Run `f`, returning its value or `None` if it failed
    pub fn run<T, E, F>(&self, f: F) -> Option<T>
    where
        F: FnOnce() -> Result<T, E>,
        E: fmt::Debug,
    {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                self.report(&format!("{err:?}"));
                None
            }
            Err(payload) => {
                self.report(&format!("panic: {}", panic_message(payload.as_ref())));
                None
            }
        }
    }

    fn report(&self, details: &str) {
        eprintln!("{}: suppressed failure: {}", self.label, details);
        tracing::error!(scope = %self.label, "Suppressed failure: {}", details);
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Timer that prints `"{label}: {seconds}s"` when it goes out of scope
pub struct Timer {
    label: String,
    start: Instant,
    output: Box<dyn Write + Send>,
    reported: bool,
}

impl Timer {
    /// Start a timer reporting to stdout
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_output(label, io::stdout())
    }

    /// Start a timer reporting to `output`
    pub fn with_output(label: impl Into<String>, output: impl Write + Send + 'static) -> Self {
        Self {
            label: label.into(),
            start: Instant::now(),
            output: Box::new(output),
            reported: false,
        }
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed().as_secs_f64() * 1000.0
    }

    /// Stop the timer, report, and return the elapsed time
    pub fn stop(mut self) -> Duration {
        self.report()
    }

    fn report(&mut self) -> Duration {
        let elapsed = self.elapsed();
        self.reported = true;
        // reporting is best effort; a closed stdout must not abort the caller
        let _ = writeln!(self.output, "{}: {}s", self.label, elapsed.as_secs_f64());
        let _ = self.output.flush();
        tracing::debug!("Timer '{}' elapsed: {:.2}ms", self.label, elapsed.as_secs_f64() * 1000.0);
        elapsed
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if !self.reported {
            self.report();
        }
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("label", &self.label)
            .field("start", &self.start)
            .finish()
    }
}

/// Run `f` under a [`Timer`] labelled `label`
pub fn time<T>(label: impl Into<String>, f: impl FnOnce() -> T) -> T {
    let _timer = Timer::new(label);
    f()
}
