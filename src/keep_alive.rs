// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

//! Renews the lease of a held lock every refresh interval.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    Inner,
    error::DLockError,
    lease::{LeaseMetadata, LeaseRecord, Version},
    providers::Provider,
    worker::Stop,
};

pub(crate) async fn run<P: Provider>(inner: Arc<Inner<P>>, mut stop: Stop) {
    loop {
        if !stop.sleep(inner.config.refresh_interval()).await {
            return;
        }

        let _transition = inner.transition.lock().await;
        // unlock may have won the transition lock first
        if stop.is_stopped() {
            return;
        }

        let Some(current) = inner.snapshot() else {
            inner.keep_alive.finish(&stop);
            return;
        };

        match renew(&inner, &current.version).await {
            Ok(Some(renewed)) => {
                debug!(
                    key = %inner.key,
                    expires_at = renewed.expires_at_millis(),
                    "renewed lease"
                );
                inner.state.lock().record = Some(renewed);
            }
            Ok(None) | Err(DLockError::AlreadyReleased) => {
                debug!(key = %inner.key, "lease lost, stopping renewal");
                inner.relinquish();
                inner.keep_alive.finish(&stop);
                inner.waiters.wake_one();
                return;
            }
            Err(error) => {
                warn!(key = %inner.key, %error, "failed to renew lease");
                inner.listeners.keep_alive_failed(&error);
                inner.keep_alive.finish(&stop);
                return;
            }
        }
    }
}

/// Read the lease at the known version and push its expiry forward.
///
/// Returns `None` if the lease is gone or was rewritten by someone else.
async fn renew<P: Provider>(
    inner: &Inner<P>,
    version: &Version,
) -> Result<Option<LeaseRecord>, DLockError> {
    let Some(record) = inner.provider.get_conditioned(&inner.key, version).await? else {
        return Ok(None);
    };

    let metadata = LeaseMetadata::fresh(&inner.config);
    inner
        .provider
        .update_conditioned(&inner.key, &metadata, &record.version)
        .await
        .map(Some)
}
