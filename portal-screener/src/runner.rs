//! Bounded execution for screening runs.
//!
//! A screening run is dispatched onto its own worker task while the
//! request handler waits on whichever fires first: the worker's result
//! or the deadline timer. The handoff uses a oneshot channel, so a
//! result arriving after the timeout has nowhere to race to; the caller
//! has already moved on. On timeout the worker is asked to stop
//! cooperatively through a cancel token it checks between candidates.
//!
//! The caller observes exactly one of `Completed`, `TimedOut` or
//! `Aborted` per run.

use std::future::Future;
use std::time::Duration;
use tokio::sync::{oneshot, watch};

/// Wall-clock budget for one screening run. Part of the API contract,
/// not client-configurable.
pub const SCREENING_DEADLINE: Duration = Duration::from_secs(60);

// ============================================================================
// Cancel Token
// ============================================================================

/// Cooperative cancellation signal handed to the worker.
///
/// The worker polls `is_cancelled` between candidate evaluations and
/// winds down on its own; there is no forced preemption.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Whether the controller has stopped waiting for this run.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// A token that never fires, for invoking the engine outside the
    /// controller (tests, maintenance commands).
    pub fn inert() -> Self {
        // A dropped sender cannot flip the value; the receiver keeps
        // observing `false`
        let (tx, rx) = watch::channel(false);
        drop(tx);
        Self { rx }
    }

    /// A token that is already cancelled.
    pub fn tripped() -> Self {
        let (tx, rx) = watch::channel(true);
        drop(tx);
        Self { rx }
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Result of a bounded run.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The worker finished before the deadline.
    Completed(T),
    /// The deadline elapsed first; the worker was asked to stop and its
    /// eventual result is discarded.
    TimedOut,
    /// The worker went away without producing a result (panic).
    Aborted,
}

// ============================================================================
// Controller
// ============================================================================

/// Run a task under a wall-clock deadline.
///
/// The task receives a [`CancelToken`] it is expected to poll. If the
/// deadline fires first the token is tripped and `TimedOut` is returned
/// immediately; the caller never waits for worker cleanup.
pub async fn run_bounded<T, F, Fut>(deadline: Duration, task: F) -> Outcome<T>
where
    F: FnOnce(CancelToken) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let (result_tx, result_rx) = oneshot::channel();

    let fut = task(CancelToken { rx: cancel_rx });
    tokio::spawn(async move {
        // Send fails only when the controller already timed out
        let _ = result_tx.send(fut.await);
    });

    tokio::select! {
        result = result_rx => match result {
            Ok(value) => Outcome::Completed(value),
            Err(_) => Outcome::Aborted,
        },
        _ = tokio::time::sleep(deadline) => {
            let _ = cancel_tx.send(true);
            Outcome::TimedOut
        }
    }
}
