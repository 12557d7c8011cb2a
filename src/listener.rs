// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use parking_lot::RwLock;
use tracing::debug;

use crate::error::DLockError;

/// Observer of failures the lock handles internally.
///
/// Callbacks are purely informational. A panicking listener is ignored and
/// does not affect other listeners or the lock.
pub trait LockListener: Send + Sync {
    /// An acquisition attempt failed for a reason other than contention.
    fn acquire_failed(&self, _error: &DLockError) {}

    /// Deleting the lease on unlock failed.
    fn release_failed(&self, _error: &DLockError) {}

    /// Renewing the lease failed. The lease will expire.
    fn keep_alive_failed(&self, _error: &DLockError) {}

    /// Inspecting or reclaiming an abandoned lease failed.
    fn cleanup_failed(&self, _error: &DLockError) {}
}

#[derive(Default)]
pub(crate) struct Listeners {
    listeners: RwLock<Vec<Arc<dyn LockListener>>>,
}

impl Listeners {
    pub(crate) fn add(&self, listener: Arc<dyn LockListener>) {
        let mut listeners = self.listeners.write();
        if !listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            listeners.push(listener);
        }
    }

    pub(crate) fn remove(&self, listener: &Arc<dyn LockListener>) {
        self.listeners.write().retain(|l| !Arc::ptr_eq(l, listener));
    }

    pub(crate) fn acquire_failed(&self, error: &DLockError) {
        self.notify(|l| l.acquire_failed(error));
    }

    pub(crate) fn release_failed(&self, error: &DLockError) {
        self.notify(|l| l.release_failed(error));
    }

    pub(crate) fn keep_alive_failed(&self, error: &DLockError) {
        self.notify(|l| l.keep_alive_failed(error));
    }

    pub(crate) fn cleanup_failed(&self, error: &DLockError) {
        self.notify(|l| l.cleanup_failed(error));
    }

    fn notify(&self, callback: impl Fn(&dyn LockListener)) {
        // Listeners may add or remove listeners from within a callback.
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| callback(listener.as_ref()))).is_err() {
                debug!("lock listener panicked");
            }
        }
    }
}
