// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

use std::{fmt, time::Duration};

use bon::bon;

use crate::{error::DLockError, lease::LeaseKey};

/// Parameters of a single [DLock](crate::DLock).
///
/// `life_extension_seconds` should be comfortably larger than
/// `refresh_interval_seconds` so that one missed renewal does not let the lease
/// expire. This is not enforced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockConfig {
    container_name: String,
    object_key: String,
    refresh_interval_seconds: u64,
    life_extension_seconds: u64,
}

#[bon]
impl LockConfig {
    pub const DEFAULT_REFRESH_INTERVAL_SECONDS: u64 = 10;
    pub const DEFAULT_LIFE_EXTENSION_SECONDS: u64 = 60;

    /// Build a validated configuration.
    ///
    /// Every missing or invalid property is reported in a single
    /// [DLockError::InvalidConfig].
    #[builder]
    pub fn new(
        #[builder(into)] container_name: Option<String>,
        #[builder(into)] object_key: Option<String>,
        #[builder(default = LockConfig::DEFAULT_REFRESH_INTERVAL_SECONDS)]
        refresh_interval_seconds: u64,
        #[builder(default = LockConfig::DEFAULT_LIFE_EXTENSION_SECONDS)]
        life_extension_seconds: u64,
    ) -> Result<Self, DLockError> {
        let mut problems = Vec::new();

        if container_name.is_none() {
            problems.push("missing container_name".to_string());
        }
        if object_key.is_none() {
            problems.push("missing object_key".to_string());
        }
        if refresh_interval_seconds == 0 {
            problems.push("refresh_interval_seconds must be positive".to_string());
        }
        if life_extension_seconds == 0 {
            problems.push("life_extension_seconds must be positive".to_string());
        }

        match (container_name, object_key) {
            (Some(container_name), Some(object_key)) if problems.is_empty() => Ok(Self {
                container_name,
                object_key,
                refresh_interval_seconds,
                life_extension_seconds,
            }),
            _ => Err(DLockError::InvalidConfig(problems)),
        }
    }

    /// The container (bucket, table, ...) holding the lease object.
    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    /// The name of the lease object inside the container.
    pub fn object_key(&self) -> &str {
        &self.object_key
    }

    /// How often the owner renews the lease and contenders look for an
    /// abandoned one.
    pub fn refresh_interval_seconds(&self) -> u64 {
        self.refresh_interval_seconds
    }

    /// How far into the future every renewal pushes the expiry.
    pub fn life_extension_seconds(&self) -> u64 {
        self.life_extension_seconds
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_seconds)
    }

    pub fn life_extension(&self) -> Duration {
        Duration::from_secs(self.life_extension_seconds)
    }

    pub fn key(&self) -> LeaseKey {
        LeaseKey::new(&self.container_name, &self.object_key)
    }
}

impl fmt::Display for LockConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[container_name={}, object_key={}]",
            self.container_name, self.object_key
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LockConfig::builder()
            .container_name("bucket")
            .object_key("lock")
            .build()
            .expect("config should be valid");

        assert_eq!(config.container_name(), "bucket");
        assert_eq!(config.object_key(), "lock");
        assert_eq!(config.refresh_interval_seconds(), 10);
        assert_eq!(config.life_extension_seconds(), 60);
        assert_eq!(config.refresh_interval(), Duration::from_secs(10));
        assert_eq!(config.key(), LeaseKey::new("bucket", "lock"));
    }

    #[test]
    fn explicit_intervals() {
        let config = LockConfig::builder()
            .container_name("bucket")
            .object_key("lock")
            .refresh_interval_seconds(1)
            .life_extension_seconds(3)
            .build()
            .expect("config should be valid");

        assert_eq!(config.refresh_interval_seconds(), 1);
        assert_eq!(config.life_extension(), Duration::from_secs(3));
        assert_eq!(
            config.to_string(),
            "[container_name=bucket, object_key=lock]"
        );
    }

    #[test]
    fn missing_names_are_reported_together() {
        let error = LockConfig::builder()
            .build()
            .expect_err("config should be rejected");

        let DLockError::InvalidConfig(ref problems) = error else {
            panic!("unexpected error: {}", error);
        };
        assert_eq!(problems.len(), 2);

        let message = error.to_string();
        assert!(message.contains("container_name"), "{message}");
        assert!(message.contains("object_key"), "{message}");
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let error = LockConfig::builder()
            .object_key("lock")
            .refresh_interval_seconds(0)
            .life_extension_seconds(0)
            .build()
            .expect_err("config should be rejected");

        match error {
            DLockError::InvalidConfig(problems) => assert_eq!(
                problems,
                vec![
                    "missing container_name".to_string(),
                    "refresh_interval_seconds must be positive".to_string(),
                    "life_extension_seconds must be positive".to_string(),
                ]
            ),
            _ => panic!("unexpected error: {}", error),
        }
    }
}
