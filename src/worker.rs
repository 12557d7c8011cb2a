// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

use std::{future::Future, time::Duration};

use parking_lot::Mutex;
use tokio::{select, sync::watch, time::sleep};
use tracing::debug;

/// Lifecycle of a background task of which at most one runs at a time.
#[derive(Debug)]
pub(crate) struct Worker {
    name: &'static str,
    slot: Mutex<Slot>,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    running: Option<watch::Sender<()>>,
}

/// Handed to the running task. The task stops once the sender in the slot is
/// dropped.
pub(crate) struct Stop {
    receiver: watch::Receiver<()>,
    generation: u64,
}

impl Worker {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: Mutex::new(Slot::default()),
        }
    }

    /// Spawn the task built by `run` unless one is already running.
    pub(crate) fn start<F, Fut>(&self, run: F) -> bool
    where
        F: FnOnce(Stop) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.slot.lock();
        if slot.running.is_some() {
            return false;
        }

        slot.generation += 1;
        let (sender, receiver) = watch::channel(());
        slot.running = Some(sender);

        debug!(worker = self.name, generation = slot.generation, "starting");
        tokio::spawn(run(Stop {
            receiver,
            generation: slot.generation,
        }));
        true
    }

    /// Signal the running task, if any, to stop.
    pub(crate) fn stop(&self) {
        if self.slot.lock().running.take().is_some() {
            debug!(worker = self.name, "stopping");
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.slot.lock().running.is_some()
    }

    /// Called by the task on its way out.
    pub(crate) fn finish(&self, stop: &Stop) {
        self.finish_unless(stop, || false);
    }

    /// Called by the task when a cycle completes. Returns `true` if the task
    /// must exit, `false` if `keep_running` asked for another cycle.
    ///
    /// `keep_running` is evaluated under the slot lock so that a concurrent
    /// [Worker::start] either sees the slot cleared or is served by the task
    /// continuing.
    pub(crate) fn finish_unless(&self, stop: &Stop, keep_running: impl FnOnce() -> bool) -> bool {
        let mut slot = self.slot.lock();
        if slot.generation != stop.generation || slot.running.is_none() {
            return true;
        }
        if keep_running() {
            return false;
        }

        slot.running = None;
        debug!(worker = self.name, generation = stop.generation, "finished");
        true
    }
}

impl Stop {
    /// Sleep for `duration`. Returns `false` if the task was stopped meanwhile.
    pub(crate) async fn sleep(&mut self, duration: Duration) -> bool {
        select! {
            _ = self.receiver.changed() => false,
            _ = sleep(duration) => !self.is_stopped(),
        }
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.receiver.has_changed().is_err()
    }
}
