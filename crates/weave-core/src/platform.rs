//! Host integration for the Weave runtime.
//!
//! The runtime never drives itself: it asks the host to call
//! [`Runtime::flush`](crate::Runtime::flush) soon, the way an event loop
//! drains its microtask queue after each task.

/// Schedules flushes of the runtime's microtask queue.
///
/// Implementations may be poked from any thread (futures wake through here),
/// so they must be `Send + Sync`.
pub trait RuntimeScheduler: Send + Sync {
    /// Request that the host call `flush` once the current turn returns.
    fn request_flush(&self);
}
