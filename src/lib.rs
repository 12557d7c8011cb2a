// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

//! A lease based distributed lock on top of object storage
//!
//! objlock lets independent processes agree on exclusive ownership of a named
//! resource using nothing but the primitives an object store exposes: an
//! atomic "create if absent" and conditional reads, updates and deletes keyed
//! by a version token. The lease object carries an absolute expiry that the
//! holder keeps pushing forward in the background. A holder that crashes stops
//! renewing, and contenders reclaim the lease once it has expired.
//!
//! Within a process, ownership belongs to the tokio task that acquired the
//! lock (or the thread, when called outside a spawned task). Futures polled
//! concurrently inside one task, for example through `join!`, share that
//! ownership.
//!
//! # Examples
//!
//! ## Automatic
//! [DLock::with] will acquire the lock, run the closure and release the lock.
//! ```rust,no_run
//! use objlock::{DLock, DynamodbProvider, LockConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = aws_sdk_dynamodb::config::Builder::new().build();
//!     let client = aws_sdk_dynamodb::Client::from_conf(config);
//!     let provider = DynamodbProvider::builder()
//!         .client(Arc::new(client))
//!         .build();
//!
//!     let config = LockConfig::builder()
//!         .container_name("locks")
//!         .object_key("nightly-report")
//!         .build()
//!         .unwrap();
//!
//!     let lock = DLock::builder().config(config).provider(provider).build();
//!
//!     let result = lock.with(|| async {
//!         // do synchronized work!
//!     }).await;
//! }
//! ```
//!
//! ## Manually
//! You are responsible for acquiring and releasing the lock.
//! ```rust,no_run
//! use objlock::{DLock, Interrupt, LockConfig, MemoryProvider};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = LockConfig::builder()
//!         .container_name("locks")
//!         .object_key("nightly-report")
//!         .build()
//!         .unwrap();
//!
//!     let lock = DLock::builder()
//!         .config(config)
//!         .provider(MemoryProvider::new())
//!         .build();
//!
//!     let interrupt = Interrupt::new();
//!     if lock.try_lock_for(Duration::from_secs(5), &interrupt).await.unwrap() {
//!         // do synchronized work!
//!         lock.unlock().await;
//!     }
//! }
//! ```

use std::{convert::Infallible, future::Future, sync::Arc, thread, time::Duration};

pub mod config;
pub mod error;
pub mod interrupt;
pub mod lease;
pub mod listener;
pub mod providers;

mod cleanup;
mod keep_alive;
mod waiters;
mod worker;

use bon::bon;
use parking_lot::Mutex;
use tokio::{
    select,
    task,
    time::{Instant, sleep_until},
};
use tracing::{debug, warn};

use crate::{
    lease::{LeaseKey, LeaseMetadata, LeaseRecord},
    listener::Listeners,
    waiters::WaitCoordinator,
    worker::Worker,
};

pub use config::LockConfig;
pub use error::DLockError;
pub use interrupt::Interrupt;
pub use listener::LockListener;
#[cfg(feature = "dynamodb")]
pub use providers::dynamodb::DynamodbProvider;
pub use providers::{Provider, memory::MemoryProvider};

/// A distributed lock on one lease object.
///
/// Share a `DLock` between tasks through an [Arc]. Dropping it stops the
/// background workers; a lease still held at that point is left to expire.
pub struct DLock<P>
where
    P: Provider,
{
    inner: Arc<Inner<P>>,
}

pub(crate) struct Inner<P> {
    config: LockConfig,
    key: LeaseKey,
    provider: P,
    state: Mutex<Held>,
    /// Serializes transitions that involve the backend.
    transition: tokio::sync::Mutex<()>,
    keep_alive: Worker,
    cleanup: Worker,
    waiters: WaitCoordinator,
    listeners: Listeners,
}

/// Outcome of a single acquisition attempt.
enum Attempt {
    Acquired,
    /// Someone else holds the lease.
    Contended,
    /// The backend failed; nobody is going to wake us.
    Failed,
}

#[derive(Debug, Default)]
struct Held {
    record: Option<LeaseRecord>,
    owner: Option<Owner>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    Task(task::Id),
    Thread(thread::ThreadId),
}

impl Owner {
    fn current() -> Self {
        match task::try_id() {
            Some(id) => Owner::Task(id),
            None => Owner::Thread(thread::current().id()),
        }
    }
}

#[bon]
impl<P> DLock<P>
where
    P: Provider,
{
    #[builder]
    pub fn new(config: LockConfig, provider: P) -> Self {
        let key = config.key();
        Self {
            inner: Arc::new(Inner {
                config,
                key,
                provider,
                state: Mutex::new(Held::default()),
                transition: tokio::sync::Mutex::new(()),
                keep_alive: Worker::new("keep_alive"),
                cleanup: Worker::new("cleanup"),
                waiters: WaitCoordinator::default(),
                listeners: Listeners::default(),
            }),
        }
    }
}

impl<P> DLock<P>
where
    P: Provider,
{
    /// Attempt to acquire the lock without waiting.
    ///
    /// Returns `true` immediately if the calling task already holds the lock.
    /// If someone else holds the lease a background watchdog starts looking
    /// for it to expire, and `false` is returned.
    ///
    /// Backend failures are reported to [LockListener::acquire_failed].
    pub async fn try_lock(&self) -> bool {
        matches!(self.attempt().await, Attempt::Acquired)
    }

    /// Acquire the lock, waiting at most `timeout`.
    ///
    /// A zero `timeout` does not wait at all. If `interrupt` is raised while
    /// waiting it is cleared and [DLockError::Interrupted] is returned.
    pub async fn try_lock_for(
        &self,
        timeout: Duration,
        interrupt: &Interrupt,
    ) -> Result<bool, DLockError> {
        if timeout.is_zero() {
            return Ok(false);
        }

        // an unrepresentable deadline waits forever
        let deadline = Instant::now().checked_add(timeout);
        self.acquire(deadline, Some(interrupt)).await
    }

    /// Acquire the lock, waiting as long as it takes.
    ///
    /// After a backend failure the attempt is repeated once per refresh
    /// interval.
    pub async fn lock(&self) {
        // cannot fail without an interrupt
        let _ = self.acquire(None, None).await;
    }

    /// Acquire the lock, waiting until it is acquired or `interrupt` is raised.
    pub async fn lock_interruptibly(&self, interrupt: &Interrupt) -> Result<(), DLockError> {
        self.acquire(None, Some(interrupt)).await.map(|_| ())
    }

    /// Release the lock.
    ///
    /// Only the task that acquired the lock can release it; from any other
    /// task this does nothing. The lease is deleted only if it still carries
    /// the last version this handle wrote. Failures are reported to
    /// [LockListener::release_failed] and the handle forgets the lease either
    /// way.
    pub async fn unlock(&self) {
        let owner = Owner::current();
        let inner = &self.inner;
        let transition = inner.transition.lock().await;

        let record = {
            let mut state = inner.state.lock();
            if state.record.is_none() || state.owner != Some(owner) {
                return;
            }
            state.owner = None;
            state.record.take()
        };
        inner.keep_alive.stop();

        if let Some(record) = record {
            match inner
                .provider
                .delete_conditioned(&inner.key, &record.version)
                .await
            {
                Ok(()) => debug!(key = %inner.key, "released lease"),
                Err(error) => {
                    warn!(key = %inner.key, %error, "failed to release lease");
                    inner.listeners.release_failed(&error);
                }
            }
        }

        drop(transition);
        inner.waiters.wake_one();
    }

    /// Execute a closure while holding the lock.
    ///
    /// The closure is only called after the lock has been acquired, and the
    /// lock is released once its future completes.
    pub async fn with<F, Fut, R>(&self, f: F) -> R
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        self.lock().await;
        let result = f().await;
        self.unlock().await;
        result
    }

    /// Conditions have no meaning for a lease shared between processes.
    pub fn new_condition(&self) -> Result<Infallible, DLockError> {
        Err(DLockError::Unsupported("new_condition"))
    }

    /// Whether this handle believes it holds the lease.
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    pub fn is_held_by_current_task(&self) -> bool {
        self.inner.is_held_by(Owner::current())
    }

    pub fn add_lock_listener(&self, listener: Arc<dyn LockListener>) {
        self.inner.listeners.add(listener);
    }

    pub fn remove_lock_listener(&self, listener: &Arc<dyn LockListener>) {
        self.inner.listeners.remove(listener);
    }

    pub fn config(&self) -> &LockConfig {
        &self.inner.config
    }

    async fn attempt(&self) -> Attempt {
        let owner = Owner::current();
        let inner = &self.inner;
        if inner.is_held_by(owner) {
            return Attempt::Acquired;
        }

        let _transition = inner.transition.lock().await;
        if inner.is_locked() {
            // held by another task of this process, unlock wakes us
            return Attempt::Contended;
        }

        let metadata = LeaseMetadata::fresh(&inner.config);
        match inner.provider.create_if_absent(&inner.key, &metadata).await {
            Ok(record) => {
                debug!(key = %inner.key, version = %record.version, "acquired lease");
                *inner.state.lock() = Held {
                    record: Some(record),
                    owner: Some(owner),
                };
                inner.start_keep_alive();
                Attempt::Acquired
            }
            Err(DLockError::AlreadyAcquired) => {
                debug!(key = %inner.key, "lease held by someone else");
                inner.start_cleanup();
                Attempt::Contended
            }
            Err(error) => {
                warn!(key = %inner.key, %error, "failed to acquire lease");
                inner.listeners.acquire_failed(&error);
                Attempt::Failed
            }
        }
    }

    async fn acquire(
        &self,
        deadline: Option<Instant>,
        interrupt: Option<&Interrupt>,
    ) -> Result<bool, DLockError> {
        let owner = Owner::current();
        loop {
            let waiter = self.inner.waiters.register();
            // nothing wakes a waiter after a backend failure, so retry on a timer
            let retry_at = match self.attempt().await {
                Attempt::Acquired => return Ok(true),
                Attempt::Contended => None,
                Attempt::Failed => {
                    Instant::now().checked_add(self.inner.config.refresh_interval())
                }
            };
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Ok(self.inner.is_held_by(owner));
            }

            let interrupted = select! {
                _ = waiter.park() => false,
                _ = elapsed(deadline) => false,
                _ = elapsed(retry_at) => false,
                _ = raised(interrupt) => true,
            };

            if interrupted {
                if let Some(interrupt) = interrupt {
                    interrupt.take();
                }
                let error = DLockError::Interrupted;
                self.inner.listeners.acquire_failed(&error);
                return Err(error);
            }
        }
    }
}

impl<P> Drop for DLock<P>
where
    P: Provider,
{
    fn drop(&mut self) {
        self.inner.keep_alive.stop();
        self.inner.cleanup.stop();
    }
}

impl<P> Inner<P>
where
    P: Provider,
{
    fn snapshot(&self) -> Option<LeaseRecord> {
        self.state.lock().record.clone()
    }

    fn is_locked(&self) -> bool {
        self.state.lock().record.is_some()
    }

    fn is_held_by(&self, owner: Owner) -> bool {
        let state = self.state.lock();
        state.record.is_some() && state.owner == Some(owner)
    }

    /// Forget the lease after losing it to someone else.
    fn relinquish(&self) {
        *self.state.lock() = Held::default();
    }

    fn start_keep_alive(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        self.keep_alive.start(|stop| keep_alive::run(inner, stop));
    }

    fn start_cleanup(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        self.cleanup.start(|stop| cleanup::run(inner, stop));
    }
}

async fn elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn raised(interrupt: Option<&Interrupt>) {
    match interrupt {
        Some(interrupt) => interrupt.raised().await,
        None => std::future::pending().await,
    }
}
