// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

//! The durable lease object and its wire layout.

use std::{
    collections::HashMap,
    fmt,
    sync::LazyLock,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::config::LockConfig;

/// Placeholder payload of every lease object.
pub const LOCK_FILE_CONTENT: &[u8] = b"_lock";
pub const CONTENT_TYPE: &str = "text/plain";

pub const LOCK_TTL_EPOCH_MS: &str = "LOCK_TTL_EPOCH_MS";
pub const CREATING_HOST: &str = "CREATING_HOST";
pub const TTL_EXTENSION_SECONDS: &str = "TTL_EXTENSION_SECONDS";
pub const REFRESH_SECONDS: &str = "REFRESH_SECONDS";

static HOST_NAME: LazyLock<String> = LazyLock::new(|| {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "NONE".to_string())
});

/// Name of the host this process runs on, as recorded in new leases.
pub fn host_name() -> &'static str {
    &HOST_NAME
}

/// Milliseconds since the unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Identity of a lease object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LeaseKey {
    pub container_name: String,
    pub object_key: String,
}

impl LeaseKey {
    pub fn new(container_name: impl Into<String>, object_key: impl Into<String>) -> Self {
        Self {
            container_name: container_name.into(),
            object_key: object_key.into(),
        }
    }
}

impl fmt::Display for LeaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container_name, self.object_key)
    }
}

/// Opaque token assigned by the backend on every successful write.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version(String);

impl Version {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata written with every create and renewal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseMetadata {
    pub ttl_epoch_millis: u64,
    pub creating_host: String,
    pub ttl_extension_seconds: u64,
    pub refresh_seconds: u64,
}

impl LeaseMetadata {
    /// Metadata for a lease expiring one life extension from now.
    pub fn fresh(config: &LockConfig) -> Self {
        Self {
            ttl_epoch_millis: now_millis()
                .saturating_add(config.life_extension_seconds().saturating_mul(1000)),
            creating_host: host_name().to_string(),
            ttl_extension_seconds: config.life_extension_seconds(),
            refresh_seconds: config.refresh_interval_seconds(),
        }
    }

    pub fn to_map(&self) -> HashMap<String, String> {
        HashMap::from([
            (
                LOCK_TTL_EPOCH_MS.to_string(),
                self.ttl_epoch_millis.to_string(),
            ),
            (CREATING_HOST.to_string(), self.creating_host.clone()),
            (
                TTL_EXTENSION_SECONDS.to_string(),
                self.ttl_extension_seconds.to_string(),
            ),
            (REFRESH_SECONDS.to_string(), self.refresh_seconds.to_string()),
        ])
    }
}

/// A snapshot of the lease object as last read or written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseRecord {
    pub key: LeaseKey,
    pub version: Version,
    pub metadata: HashMap<String, String>,
}

impl LeaseRecord {
    /// The absolute expiry of the lease.
    ///
    /// A lease without a readable expiry never expires.
    pub fn expires_at_millis(&self) -> u64 {
        self.metadata
            .get(LOCK_TTL_EPOCH_MS)
            .and_then(|ttl| ttl.parse().ok())
            .unwrap_or(u64::MAX)
    }

    pub fn is_expired_at(&self, now_millis: u64) -> bool {
        self.expires_at_millis() <= now_millis
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }

    pub fn creating_host(&self) -> Option<&str> {
        self.metadata.get(CREATING_HOST).map(String::as_str)
    }
}
