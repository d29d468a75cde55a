// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The per-key FIFO drain loop.
//!
//! There is no long-lived `Worker` object: a key "has a worker" exactly when it has an entry in
//! its shard's map, and "running" is just this module's [`run_cycle`] executing on whatever thread
//! the backend [`Executor`](crate::Executor) gave it. This mirrors how
//! `oxidizer_rt`'s `SpawnQueue` treats a queue of pending work as the only state that matters,
//! rather than reifying "the thing draining the queue" as its own object.

use std::sync::Arc;

use crate::distributor::DistributorInner;
use crate::error::{Error, Result, SharedError};
use crate::executor::BoxTask;
use crate::failure_hook;
use crate::key::DistributorKey;

/// Schedules a fresh run of the drain loop for `key` on the distributor's backend executor.
///
/// Called both when a key's worker is created for the first time and when a worker yields at a
/// cycle boundary and re-dispatches itself.
pub(crate) fn dispatch<K: DistributorKey>(core: &Arc<DistributorInner<K>>, key: K) -> Result<()> {
    let core_for_cycle = Arc::clone(core);
    let key_for_cycle = key.clone();
    let task: BoxTask = Box::new(move || run_cycle(core_for_cycle, key_for_cycle));
    core.executor
        .execute(task)
        .map_err(|error| Error::SchedulingFailed(SharedError::from_boxed(error)))
}

/// Drains a key's FIFO, running tasks one at a time, until either the queue empties (the worker is
/// then removed from the map) or `max_tasks_per_cycle` tasks have run in this call (the worker
/// yields by re-dispatching itself, so one busy key cannot starve the backend executor's other
/// work).
///
/// Every task is run inside `catch_unwind`: a panicking task cannot take down the thread running
/// this loop, and is instead reported to the global failure hook.
pub(crate) fn run_cycle<K: DistributorKey>(core: Arc<DistributorInner<K>>, key: K) {
    let index = core.striped.index_for(&key);
    let mut consumed = 0usize;
    loop {
        let batch = {
            let mut shard = core.shards[index].lock();
            let Some(queue) = shard.get_mut(&key) else {
                tracing::debug!(?key, "worker cycle found no queue installed, nothing to do");
                return;
            };
            if queue.is_empty() {
                shard.remove(&key);
                tracing::debug!(?key, "worker removed: queue drained");
                return;
            }
            if consumed >= core.max_tasks_per_cycle {
                drop(shard);
                tracing::debug!(?key, consumed, "worker yielding at cycle boundary");
                if let Err(error) = dispatch(&core, key.clone()) {
                    // The worker stays installed in the map with its remaining queue intact, but
                    // nothing will drain it until a fresh `add_task` call for this key happens to
                    // land (which only enqueues, since the map entry already exists). Operators
                    // need to know their backend executor is unhealthy.
                    tracing::error!(?key, %error, "failed to re-dispatch worker after yield; key is stalled");
                    failure_hook::handle_failure(&error);
                }
                return;
            }
            let remaining_budget = core.max_tasks_per_cycle - consumed;
            let take = queue.len().min(remaining_budget);
            let batch = if take == queue.len() {
                std::mem::take(queue)
            } else {
                queue.drain(..take).collect()
            };
            consumed += take;
            batch
        };
        for task in batch {
            run_one(task);
        }
    }
}

fn run_one(task: BoxTask) {
    if let Err(payload) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || task())) {
        let error = Error::ExecutionFailed(SharedError::from_panic(payload));
        tracing::warn!(%error, "keydispatch: task panicked while running inside a worker cycle");
        failure_hook::handle_failure(&error);
    }
}
