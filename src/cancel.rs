//! Cooperative cancellation shared by every blocking engine call.
//!
//! A [`CancelHandle`] flips a watch channel once; every clone of the paired
//! [`CancelSignal`] observes it at its next suspension point. A signal whose
//! handle was dropped without cancelling never fires.

use std::future::pending;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;

/// Creates a connected cancellation handle and signal.
#[must_use]
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx: Some(rx) })
}

/// Owner side of a cancellation pair.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Signals cancellation to every paired [`CancelSignal`].
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Observer side of a cancellation pair.
#[derive(Clone, Debug)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    /// Returns a signal that is never cancelled.
    #[must_use]
    pub const fn never() -> Self {
        Self { rx: None }
    }

    /// Reports whether cancellation has already been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Completes once cancellation is requested.
    pub async fn cancelled(&self) {
        let Some(rx) = self.rx.as_ref() else {
            return pending().await;
        };
        let mut watcher = rx.clone();
        loop {
            if *watcher.borrow_and_update() {
                return;
            }
            if watcher.changed().await.is_err() {
                return pending().await;
            }
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::never()
    }
}

/// Marker returned when a cancellable sleep was interrupted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Interrupted;

/// Sleeps for `duration` unless `cancel` fires first.
pub(crate) async fn sleep_or_cancel(
    duration: Duration,
    cancel: &CancelSignal,
) -> Result<(), Interrupted> {
    if cancel.is_cancelled() {
        return Err(Interrupted);
    }
    tokio::select! {
        () = sleep(duration) => Ok(()),
        () = cancel.cancelled() => Err(Interrupted),
    }
}
