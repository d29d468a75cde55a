// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{BoxError, Error, Result};
use crate::executor::{BoxTask, Executor};
use crate::future::CompletableFuture;
use crate::key::DistributorKey;
use crate::striped::StripedLock;
use crate::submitter::KeySubmitter;
use crate::worker;

type Shard<K> = Mutex<HashMap<K, VecDeque<BoxTask>>>;

pub(crate) struct DistributorInner<K: DistributorKey> {
    pub(crate) executor: Arc<dyn Executor>,
    pub(crate) striped: StripedLock,
    pub(crate) shards: Box<[Shard<K>]>,
    pub(crate) max_tasks_per_cycle: usize,
}

/// Configuration for building a [`Distributor`].
///
/// Mirrors the builder style used throughout the rest of this workspace: every setter consumes
/// and returns `self`, and `build` performs validation up front rather than deferring it to the
/// first call that would have failed anyway.
#[derive(Debug, Clone)]
pub struct DistributorConfig {
    expected_concurrency: usize,
    max_tasks_per_cycle: usize,
}

impl DistributorConfig {
    /// Default per-cycle task budget: generous enough that short-lived keys rarely yield, while
    /// still bounding how long one busy key can monopolize a worker thread.
    pub const DEFAULT_MAX_TASKS_PER_CYCLE: usize = 16;

    /// Starts a configuration sized to comfortably serve `expected_concurrency` concurrent keys.
    #[must_use]
    pub fn new(expected_concurrency: usize) -> Self {
        Self {
            expected_concurrency,
            max_tasks_per_cycle: Self::DEFAULT_MAX_TASKS_PER_CYCLE,
        }
    }

    /// Overrides how many tasks a worker runs before yielding back to the backend executor.
    #[must_use]
    pub fn with_max_tasks_per_cycle(mut self, max_tasks_per_cycle: usize) -> Self {
        self.max_tasks_per_cycle = max_tasks_per_cycle;
        self
    }

    /// Builds the distributor, running on `executor`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `expected_concurrency` or `max_tasks_per_cycle` is
    /// zero.
    pub fn build<K: DistributorKey>(self, executor: Arc<dyn Executor>) -> Result<Distributor<K>> {
        Distributor::new(executor, self.expected_concurrency, self.max_tasks_per_cycle)
    }
}

/// Dispatches tasks submitted under a key to a backend executor, guaranteeing that tasks sharing a
/// key run one at a time and in submission order, while tasks under different keys may run
/// concurrently.
///
/// Cloning a `Distributor` is cheap (it is an `Arc` around its shared state); every clone refers to
/// the same key→worker map and the same backend executor.
#[derive(Clone)]
pub struct Distributor<K: DistributorKey> {
    inner: Arc<DistributorInner<K>>,
}

impl<K: DistributorKey> std::fmt::Debug for Distributor<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Distributor")
            .field("stripe_count", &self.inner.striped.stripe_count())
            .field("max_tasks_per_cycle", &self.inner.max_tasks_per_cycle)
            .finish()
    }
}

impl<K: DistributorKey> Distributor<K> {
    /// Creates a distributor running on `executor`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `expected_concurrency` or `max_tasks_per_cycle` is
    /// zero.
    pub fn new(executor: Arc<dyn Executor>, expected_concurrency: usize, max_tasks_per_cycle: usize) -> Result<Self> {
        if expected_concurrency == 0 {
            return Err(Error::InvalidArgument(
                "expected_concurrency must be at least 1".to_string(),
            ));
        }
        if max_tasks_per_cycle == 0 {
            return Err(Error::InvalidArgument(
                "max_tasks_per_cycle must be at least 1".to_string(),
            ));
        }
        let striped = StripedLock::new(expected_concurrency);
        let shards = (0..striped.stripe_count()).map(|_| Mutex::new(HashMap::new())).collect();
        Ok(Self {
            inner: Arc::new(DistributorInner {
                executor,
                striped,
                shards,
                max_tasks_per_cycle,
            }),
        })
    }

    /// Enqueues a fire-and-forget task under `key`.
    ///
    /// If no worker currently exists for `key`, one is created and dispatched to the backend
    /// executor as part of this call. If the backend executor refuses to schedule that initial
    /// dispatch, the freshly created (and still empty, since `task` rides along in the same
    /// insertion) worker is removed again so a later `add_task` call for the same key gets a clean
    /// retry, and `task` is dropped along with it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchedulingFailed`] if this call needed to create a new worker and the
    /// backend executor refused to schedule it.
    pub fn add_task(&self, key: K, task: impl FnOnce() + Send + 'static) -> Result<()> {
        self.add_boxed_task(key, Box::new(task))
    }

    pub(crate) fn add_boxed_task(&self, key: K, task: BoxTask) -> Result<()> {
        let index = self.inner.striped.index_for(&key);
        let mut shard = self.inner.shards[index].lock();
        let created = match shard.get_mut(&key) {
            Some(queue) => {
                queue.push_back(task);
                false
            }
            None => {
                let mut queue = VecDeque::with_capacity(1);
                queue.push_back(task);
                shard.insert(key.clone(), queue);
                true
            }
        };
        if created {
            tracing::debug!(?key, "worker created");
            if let Err(error) = worker::dispatch(&self.inner, key.clone()) {
                shard.remove(&key);
                return Err(error);
            }
        }
        Ok(())
    }

    /// Submits `callable` under `key`, returning a future for its result.
    ///
    /// `callable` runs on whichever thread the backend executor eventually hands this key's
    /// worker, strictly after every task previously submitted under the same key, and strictly
    /// before any task submitted under the same key afterward.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchedulingFailed`] under the same conditions as [`add_task`](Self::add_task).
    pub fn submit<T, F>(&self, key: K, callable: F) -> Result<CompletableFuture<T>>
    where
        F: FnOnce() -> std::result::Result<T, BoxError> + Send + 'static,
        T: Clone + Send + 'static,
    {
        let future = CompletableFuture::new();
        let future_for_worker = future.clone();
        self.add_task(key, move || future_for_worker.run(callable))?;
        Ok(future)
    }

    /// Submits a fallible-free `runnable` under `key`, settling the returned future with `result`
    /// once `runnable` finishes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchedulingFailed`] under the same conditions as [`add_task`](Self::add_task).
    pub fn submit_runnable<T, F>(&self, key: K, runnable: F, result: T) -> Result<CompletableFuture<T>>
    where
        F: FnOnce() + Send + 'static,
        T: Clone + Send + 'static,
    {
        self.submit(key, move || {
            runnable();
            Ok(result)
        })
    }

    /// Returns a handle scoped to `key` that implements [`Executor`] by forwarding to
    /// [`add_task`](Self::add_task).
    #[must_use]
    pub fn executor_for_key(&self, key: K) -> KeySubmitter<K> {
        self.submitter_for_key(key)
    }

    /// Returns a handle scoped to `key` offering both fire-and-forget `execute` and
    /// future-returning `submit`/`submit_runnable` methods.
    #[must_use]
    pub fn submitter_for_key(&self, key: K) -> KeySubmitter<K> {
        KeySubmitter::new(key, self.clone())
    }

    /// Returns the backend executor this distributor dispatches worker cycles to.
    #[must_use]
    pub fn executor(&self) -> Arc<dyn Executor> {
        Arc::clone(&self.inner.executor)
    }

    /// The number of stripes backing this distributor's key→worker map.
    #[must_use]
    pub fn stripe_count(&self) -> usize {
        self.inner.striped.stripe_count()
    }

    #[cfg(test)]
    fn has_worker(&self, key: &K) -> bool {
        let index = self.inner.striped.index_for(key);
        self.inner.shards[index].lock().contains_key(key)
    }
}
