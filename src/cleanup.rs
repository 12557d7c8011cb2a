// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

//! Watches a lease held by someone else and reclaims it once it has expired.
//!
//! A holder that crashes stops renewing its lease. Once the recorded expiry
//! has passed the lease is deleted, conditioned on the version just observed
//! so that a lease renewed or recreated in the meantime survives, and one
//! local waiter is woken to try again.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{Inner, error::DLockError, providers::Provider, worker::Stop};

pub(crate) async fn run<P: Provider>(inner: Arc<Inner<P>>, mut stop: Stop) {
    loop {
        if !stop.sleep(inner.config.refresh_interval()).await {
            return;
        }

        // the lease is ours now and unlock wakes the local waiters
        if inner.is_locked() && inner.cleanup.finish_unless(&stop, || !inner.is_locked()) {
            return;
        }

        if !inspect(&inner).await {
            continue;
        }

        inner.waiters.wake_one();
        if inner.cleanup.finish_unless(&stop, || {
            inner.waiters.has_waiters() && !inner.is_locked()
        }) {
            return;
        }
    }
}

/// One watchdog cycle. Returns `true` when the watched lease is gone.
async fn inspect<P: Provider>(inner: &Inner<P>) -> bool {
    let record = match inner.provider.get(&inner.key).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            debug!(key = %inner.key, "lease is gone");
            return true;
        }
        Err(error) => {
            warn!(key = %inner.key, %error, "failed to inspect lease");
            inner.listeners.cleanup_failed(&error);
            return false;
        }
    };

    if !record.is_expired() {
        return false;
    }

    match inner
        .provider
        .delete_conditioned(&inner.key, &record.version)
        .await
    {
        Ok(()) => info!(
            key = %inner.key,
            host = record.creating_host().unwrap_or("unknown"),
            "reclaimed expired lease"
        ),
        Err(DLockError::AlreadyReleased) => {
            debug!(key = %inner.key, "expired lease reclaimed by someone else")
        }
        Err(error) => {
            warn!(key = %inner.key, %error, "failed to reclaim expired lease");
            inner.listeners.cleanup_failed(&error);
        }
    }
    true
}
