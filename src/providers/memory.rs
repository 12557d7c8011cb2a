// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::Mutex;

use crate::{
    error::DLockError,
    lease::{LeaseKey, LeaseMetadata, LeaseRecord, Version},
    providers::Provider,
};

/// In-process [Provider] keeping lease objects in a shared map.
///
/// Clones share the same objects, so several [DLock](crate::DLock) handles
/// built from clones of one provider contend exactly like separate processes
/// on a real backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    objects: Arc<Mutex<HashMap<LeaseKey, LeaseRecord>>>,
    generation: Arc<AtomicU64>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the lease object unconditionally, as a foreign process would.
    pub fn put(&self, key: &LeaseKey, metadata: &LeaseMetadata) -> LeaseRecord {
        let record = self.record(key, metadata);
        self.objects.lock().insert(key.clone(), record.clone());
        record
    }

    /// Delete the lease object unconditionally, as a foreign process would.
    pub fn remove(&self, key: &LeaseKey) -> Option<LeaseRecord> {
        self.objects.lock().remove(key)
    }

    /// The current lease object, if any.
    pub fn current(&self, key: &LeaseKey) -> Option<LeaseRecord> {
        self.objects.lock().get(key).cloned()
    }

    fn record(&self, key: &LeaseKey, metadata: &LeaseMetadata) -> LeaseRecord {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        LeaseRecord {
            key: key.clone(),
            version: Version::new(generation.to_string()),
            metadata: metadata.to_map(),
        }
    }
}

impl Provider for MemoryProvider {
    async fn create_if_absent(
        &self,
        key: &LeaseKey,
        metadata: &LeaseMetadata,
    ) -> Result<LeaseRecord, DLockError> {
        let mut objects = self.objects.lock();
        if objects.contains_key(key) {
            return Err(DLockError::AlreadyAcquired);
        }

        let record = self.record(key, metadata);
        objects.insert(key.clone(), record.clone());
        Ok(record)
    }

    async fn get_conditioned(
        &self,
        key: &LeaseKey,
        expected: &Version,
    ) -> Result<Option<LeaseRecord>, DLockError> {
        Ok(self
            .objects
            .lock()
            .get(key)
            .filter(|record| &record.version == expected)
            .cloned())
    }

    async fn get(&self, key: &LeaseKey) -> Result<Option<LeaseRecord>, DLockError> {
        Ok(self.current(key))
    }

    async fn update_conditioned(
        &self,
        key: &LeaseKey,
        metadata: &LeaseMetadata,
        expected: &Version,
    ) -> Result<LeaseRecord, DLockError> {
        let mut objects = self.objects.lock();
        match objects.get(key) {
            Some(record) if &record.version == expected => {
                let record = self.record(key, metadata);
                objects.insert(key.clone(), record.clone());
                Ok(record)
            }
            _ => Err(DLockError::AlreadyReleased),
        }
    }

    async fn delete_conditioned(&self, key: &LeaseKey, expected: &Version) -> Result<(), DLockError> {
        let mut objects = self.objects.lock();
        match objects.get(key) {
            Some(record) if &record.version == expected => {
                objects.remove(key);
                Ok(())
            }
            _ => Err(DLockError::AlreadyReleased),
        }
    }
}
