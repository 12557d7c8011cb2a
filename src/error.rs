// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

use std::error::Error;

use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum DLockError {
    /// The backend failed for a reason other than a precondition.
    #[error("provider error: {0}")]
    ProviderError(Box<dyn Error + Send + Sync>),

    /// The lease object already exists.
    #[error("lock already acquired")]
    AlreadyAcquired,

    /// The lease object is gone or its version no longer matches.
    #[error("lock already released")]
    AlreadyReleased,

    #[error("lock acquisition interrupted")]
    Interrupted,

    #[error("invalid lock configuration: {}", .0.join(", "))]
    InvalidConfig(Vec<String>),

    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}

impl DLockError {
    pub fn provider(error: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        DLockError::ProviderError(error.into())
    }
}
