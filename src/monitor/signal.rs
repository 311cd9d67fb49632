//! Stop signalling with cancellable sleeps
//!
//! Every suspension point in the scheduler goes through [`StopSignal::sleep`],
//! so a stop request is observed at the next sleep or turn boundary instead
//! of after the sleep runs to completion.

use std::time::Duration;
use tokio::sync::watch;

/// Create a connected stop handle and signal
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopSignal { rx })
}

/// Sending side, owned by the controller
#[derive(Debug)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    /// Request a stop; returns immediately
    pub fn stop(&self) {
        let _ = self.tx.send(true);
    }

    /// Whether a stop was requested
    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    /// Create another signal observing this handle
    pub fn signal(&self) -> StopSignal {
        StopSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiving side, polled by the scheduler
///
/// A dropped [`StopHandle`] counts as a stop request.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// Whether a stop was requested
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Sleep for `duration` unless stopped first
    ///
    /// Returns `true` if the full duration elapsed without a stop request.
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        if self.is_stopped() {
            return false;
        }
        if duration.is_zero() {
            return true;
        }

        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return !self.is_stopped(),
                changed = self.rx.changed() => {
                    if changed.is_err() || *self.rx.borrow_and_update() {
                        return false;
                    }
                }
            }
        }
    }

    /// Wait until a stop is requested
    pub async fn stopped(&mut self) {
        while !self.is_stopped() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}
