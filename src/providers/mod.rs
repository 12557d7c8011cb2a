// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

use std::future::Future;

use crate::{
    error::DLockError,
    lease::{LeaseKey, LeaseMetadata, LeaseRecord, Version},
};

#[cfg(feature = "dynamodb")]
pub mod dynamodb;
pub mod memory;

/// `Provider` is a trait that abstracts the backend specific details of
/// storing the lease object.
///
/// Any backend with an atomic create-if-absent and compare-and-swap on a
/// version token can implement it. Every conditional operation must be keyed
/// on a version the caller got from a previous read or write.
pub trait Provider: Send + Sync + 'static {
    /// Create the lease object unless it already exists.
    ///
    /// Fails with [DLockError::AlreadyAcquired] if the object exists.
    fn create_if_absent(
        &self,
        key: &LeaseKey,
        metadata: &LeaseMetadata,
    ) -> impl Future<Output = Result<LeaseRecord, DLockError>> + Send;

    /// Read the lease object if it still carries `expected`.
    ///
    /// Returns `None` when the object is gone or has been rewritten.
    fn get_conditioned(
        &self,
        key: &LeaseKey,
        expected: &Version,
    ) -> impl Future<Output = Result<Option<LeaseRecord>, DLockError>> + Send;

    /// Read the lease object whatever its version.
    fn get(
        &self,
        key: &LeaseKey,
    ) -> impl Future<Output = Result<Option<LeaseRecord>, DLockError>> + Send;

    /// Replace the metadata of the lease object if it still carries `expected`.
    ///
    /// Fails with [DLockError::AlreadyReleased] on a version mismatch.
    fn update_conditioned(
        &self,
        key: &LeaseKey,
        metadata: &LeaseMetadata,
        expected: &Version,
    ) -> impl Future<Output = Result<LeaseRecord, DLockError>> + Send;

    /// Delete the lease object if it still carries `expected`.
    ///
    /// Fails with [DLockError::AlreadyReleased] on a version mismatch.
    fn delete_conditioned(
        &self,
        key: &LeaseKey,
        expected: &Version,
    ) -> impl Future<Output = Result<(), DLockError>> + Send;
}
