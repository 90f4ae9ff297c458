//! Timing and cancellation primitives shared by the strategy loops.

pub mod scheduler;

pub use scheduler::{cancellation, CancelHandle, Scheduler, WaitOutcome};
