//! Run blocking work with a deadline.
//!
//! The work runs on its own thread; the caller waits at most `limit` for the
//! result. On expiry the caller gets [`TimedOut`] and the worker's eventual
//! result is discarded when it finishes.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("timed out after {limit:?}")]
pub struct TimedOut {
    pub limit: Duration,
}

/// Run `work`, returning its value or [`TimedOut`] once `limit` has passed.
///
/// A panic inside `work` is resumed on the calling thread.
pub fn run_with_timeout<T, F>(limit: Duration, work: F) -> Result<T, TimedOut>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(1);
    let handle = thread::spawn(move || {
        // Receiver may be gone after a timeout.
        let _ = tx.send(work());
    });
    match rx.recv_timeout(limit) {
        Ok(value) => Ok(value),
        Err(mpsc::RecvTimeoutError::Timeout) => {
            log::warn!("work abandoned after {limit:?}");
            Err(TimedOut { limit })
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => match handle.join() {
            Err(panic) => std::panic::resume_unwind(panic),
            // Sender dropped without sending only happens on panic.
            Ok(()) => Err(TimedOut { limit }),
        },
    }
}
