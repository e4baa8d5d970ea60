//! Cancellable debounce timers.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Handle to a scheduled callback.
///
/// Cancelling (or dropping) the handle stops the callback if it has not run
/// yet.
#[derive(Debug)]
pub struct TimerHandle {
    id: u64,
    token: CancellationToken,
}

impl TimerHandle {
    /// Identifier given at scheduling time.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop the timer.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Run `on_fire` after `interval` unless the returned handle is cancelled
/// first.
///
/// Must be called from within a tokio runtime.
pub fn schedule<F>(id: u64, interval: Duration, on_fire: F) -> TimerHandle
where
    F: FnOnce() + Send + 'static,
{
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = child.cancelled() => {}
            _ = tokio::time::sleep(interval) => on_fire(),
        }
    });
    TimerHandle { id, token }
}
