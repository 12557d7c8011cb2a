// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::sync::Notify;

/// An interrupt flag for [DLock::try_lock_for](crate::DLock::try_lock_for) and
/// [DLock::lock_interruptibly](crate::DLock::lock_interruptibly).
///
/// Raising the interrupt makes a parked acquisition give up with
/// [DLockError::Interrupted](crate::error::DLockError::Interrupted). The flag
/// is cleared when an acquisition consumes it, so the same `Interrupt` can be
/// reused for later calls.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    inner: Arc<State>,
}

#[derive(Debug, Default)]
struct State {
    raised: AtomicBool,
    notify: Notify,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupt(&self) {
        self.inner.raised.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_interrupted(&self) -> bool {
        self.inner.raised.load(Ordering::SeqCst)
    }

    /// Clear the flag, returning whether it was raised.
    pub(crate) fn take(&self) -> bool {
        self.inner.raised.swap(false, Ordering::SeqCst)
    }

    /// Resolves once the flag is raised.
    pub(crate) async fn raised(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_interrupted() {
                return;
            }
            notified.await;
        }
    }
}
