//! Cancellable suspension for strategy loops.
//!
//! A strategy never blocks a thread between steps: it awaits
//! [`Scheduler::wait`], which races a tokio timer against the cancellation
//! signal, so an operator stop interrupts a 300 second grid poll at once.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// How a wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Elapsed,
    Cancelled,
}

/// Sender side of the cancellation signal
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        if self.tx.send_replace(true) {
            warn!("Cancellation already requested, ignoring duplicate signal");
            return;
        }
        info!("Cancellation requested");
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Receiver side: sleep/interval primitives that observe cancellation
#[derive(Clone)]
pub struct Scheduler {
    rx: watch::Receiver<bool>,
}

/// Create a linked cancel handle and scheduler
pub fn cancellation() -> (CancelHandle, Scheduler) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx: Arc::new(tx) }, Scheduler { rx })
}

impl Scheduler {
    /// A scheduler that can never be cancelled
    pub fn detached() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation has been requested
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender gone without cancelling: nothing can cancel us any more
                std::future::pending::<()>().await;
            }
        }
    }

    /// Suspend for `duration` unless cancelled first
    pub async fn wait(&self, duration: Duration) -> WaitOutcome {
        if self.is_cancelled() {
            return WaitOutcome::Cancelled;
        }
        if duration.is_zero() {
            return WaitOutcome::Elapsed;
        }

        debug!(secs = duration.as_secs_f64(), "suspending");
        tokio::select! {
            _ = tokio::time::sleep(duration) => {
                if self.is_cancelled() {
                    WaitOutcome::Cancelled
                } else {
                    WaitOutcome::Elapsed
                }
            }
            _ = self.cancelled() => WaitOutcome::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn wait_elapses_without_cancel() {
        let (_handle, scheduler) = cancellation();
        let start = Instant::now();

        assert_eq!(scheduler.wait(Duration::from_secs(60)).await, WaitOutcome::Elapsed);
        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_a_long_wait() {
        let (handle, scheduler) = cancellation();
        let start = Instant::now();

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            handle.cancel();
        });

        assert_eq!(scheduler.wait(Duration::from_secs(300)).await, WaitOutcome::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(300));
        canceller.await.unwrap();
    }

    #[tokio::test]
    async fn already_cancelled_returns_immediately() {
        let (handle, scheduler) = cancellation();
        handle.cancel();
        handle.cancel();

        assert!(handle.is_cancelled());
        assert!(scheduler.is_cancelled());
        assert_eq!(scheduler.wait(Duration::from_secs(3600)).await, WaitOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn detached_scheduler_never_cancels() {
        let scheduler = Scheduler::detached();
        assert!(!scheduler.is_cancelled());
        assert_eq!(scheduler.wait(Duration::from_secs(1)).await, WaitOutcome::Elapsed);
        assert_eq!(scheduler.wait(Duration::ZERO).await, WaitOutcome::Elapsed);
    }
}
