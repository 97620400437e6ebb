//! Standard runtime services backed by Rust's `std` library.
//!
//! [`StdScheduler`] records flush requests with an atomic flag and can wake a
//! parked host thread. [`StdRuntime`] bundles it with a
//! [`weave_core::Runtime`] and drives flushes until the runtime settles.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use weave_core::{Runtime, RuntimeHandle, RuntimeOptions, RuntimeScheduler};

type FlushWaker = Arc<dyn Fn() + Send + Sync + 'static>;

/// Scheduler that delegates work to Rust's threading primitives.
pub struct StdScheduler {
    flush_requested: AtomicBool,
    flush_waker: RwLock<Option<FlushWaker>>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self {
            flush_requested: AtomicBool::new(false),
            flush_waker: RwLock::new(None),
        }
    }

    /// Returns whether a flush has been requested since the last call.
    pub fn take_flush_request(&self) -> bool {
        self.flush_requested.swap(false, Ordering::SeqCst)
    }

    /// Registers a waker invoked whenever the runtime asks for a flush.
    pub fn set_flush_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self
            .flush_waker
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(waker));
    }

    pub fn clear_flush_waker(&self) {
        *self
            .flush_waker
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn wake(&self) {
        let waker = self
            .flush_waker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field(
                "flush_requested",
                &self.flush_requested.load(Ordering::SeqCst),
            )
            .finish()
    }
}

impl RuntimeScheduler for StdScheduler {
    fn request_flush(&self) {
        self.flush_requested.store(true, Ordering::SeqCst);
        self.wake();
    }
}

/// Convenience container bundling the standard scheduler and a runtime.
#[derive(Clone)]
pub struct StdRuntime {
    scheduler: Arc<StdScheduler>,
    runtime: Runtime,
}

impl StdRuntime {
    pub fn new() -> Self {
        Self::with_options(RuntimeOptions::default())
    }

    pub fn with_options(options: RuntimeOptions) -> Self {
        let scheduler = Arc::new(StdScheduler::default());
        let runtime = Runtime::with_options(scheduler.clone(), options);
        Self { scheduler, runtime }
    }

    /// Returns the [`weave_core::Runtime`] driven by the standard scheduler.
    pub fn runtime(&self) -> Runtime {
        self.runtime.clone()
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    pub fn scheduler(&self) -> Arc<StdScheduler> {
        Arc::clone(&self.scheduler)
    }

    /// Returns whether a flush was requested since the last poll.
    pub fn take_flush_request(&self) -> bool {
        self.scheduler.take_flush_request()
    }

    pub fn set_flush_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.scheduler.set_flush_waker(waker);
    }

    pub fn clear_flush_waker(&self) {
        self.scheduler.clear_flush_waker();
    }

    /// Flush if anything asked for it. Returns the number of steps taken.
    pub fn pump(&self) -> usize {
        if self.take_flush_request() {
            self.runtime.flush()
        } else {
            0
        }
    }

    /// Flush until no further flush is requested and nothing is queued.
    pub fn run_until_idle(&self) -> usize {
        let mut steps = 0;
        loop {
            let requested = self.take_flush_request();
            if !requested && self.runtime.is_idle() {
                break;
            }
            let taken = self.runtime.flush();
            steps += taken;
            if taken == 0 && !self.scheduler.flush_requested.load(Ordering::SeqCst) {
                break;
            }
        }
        steps
    }

    /// Park the current thread between flushes until `done` holds or `timeout` passes.
    ///
    /// Returns whether `done` was reached. Wakes from other threads end the park early.
    pub fn run_until(&self, timeout: Duration, mut done: impl FnMut(&Runtime) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let thread = std::thread::current();
        self.set_flush_waker(move || thread.unpark());
        let reached = loop {
            self.run_until_idle();
            if done(&self.runtime) {
                break true;
            }
            let now = Instant::now();
            if now >= deadline {
                log::warn!("runtime did not settle within {timeout:?}");
                break false;
            }
            if !self.scheduler.flush_requested.load(Ordering::SeqCst) {
                std::thread::park_timeout(deadline - now);
            }
        };
        self.clear_flush_waker();
        reached
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .field("options", self.runtime.options())
            .finish()
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}
