//! Trailing-edge debounce for a single action.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

/// Debounces an action: each `trigger` replaces any pending one, so the
/// action runs once, after the most recently requested delay.
///
/// Must be used from within a tokio runtime.
#[derive(Debug)]
pub struct Delayer {
    default_delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Delayer {
    #[must_use]
    pub fn new(default_delay: Duration) -> Self {
        Self {
            default_delay,
            pending: Mutex::new(None),
        }
    }

    /// Schedule `action` after `delay`, replacing any pending action.
    pub fn trigger<F>(&self, delay: Duration, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut pending = self.pending.lock();
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action();
        }));
    }

    /// Schedule `action` after the default delay.
    pub fn trigger_default<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.trigger(self.default_delay, action);
    }

    /// Drop any pending action without running it.
    pub fn cancel(&self) {
        if let Some(previous) = self.pending.lock().take() {
            previous.abort();
        }
    }
}

impl Drop for Delayer {
    fn drop(&mut self) {
        self.cancel();
    }
}
