// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

use std::{
    pin::Pin,
    sync::atomic::{AtomicUsize, Ordering},
};

use tokio::sync::{Notify, futures::Notified};

/// Tasks of this process parked on one lock handle.
#[derive(Debug, Default)]
pub(crate) struct WaitCoordinator {
    notify: Notify,
    parked: AtomicUsize,
}

impl WaitCoordinator {
    /// Register the calling task as a waiter.
    ///
    /// Registration must happen before the acquisition attempt the caller is
    /// about to make, otherwise a wake issued in between is lost.
    pub(crate) fn register(&self) -> Waiter<'_> {
        self.parked.fetch_add(1, Ordering::SeqCst);
        let mut notified = Box::pin(self.notify.notified());
        notified.as_mut().enable();
        Waiter {
            notified,
            parked: &self.parked,
        }
    }

    /// Wake one registered waiter, whichever it is.
    pub(crate) fn wake_one(&self) {
        self.notify.notify_one();
    }

    pub(crate) fn has_waiters(&self) -> bool {
        self.parked.load(Ordering::SeqCst) > 0
    }
}

pub(crate) struct Waiter<'a> {
    notified: Pin<Box<Notified<'a>>>,
    parked: &'a AtomicUsize,
}

impl Waiter<'_> {
    /// Park until woken. Wakes may be spurious.
    pub(crate) async fn park(mut self) {
        self.notified.as_mut().await;
    }
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        self.parked.fetch_sub(1, Ordering::SeqCst);
    }
}
