// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::distributor::Distributor;
use crate::error::{BoxError, Result};
use crate::executor::{BoxTask, Executor};
use crate::future::CompletableFuture;
use crate::key::DistributorKey;

/// A thin, reusable capability scoped to a single key.
///
/// `KeySubmitter` does not hold any state of its own beyond the key and a cloned handle to the
/// distributor it came from; it exists so callers that only ever operate on one key do not need to
/// repeat that key on every call. It implements [`Executor`], so it can also be handed to code
/// that expects a generic backend executor (for example, a [`CompletableFuture`] listener that
/// should run under the same per-key ordering as the future's own task).
#[derive(Clone, Debug)]
pub struct KeySubmitter<K: DistributorKey> {
    key: K,
    distributor: Distributor<K>,
}

impl<K: DistributorKey> KeySubmitter<K> {
    pub(crate) fn new(key: K, distributor: Distributor<K>) -> Self {
        Self { key, distributor }
    }

    /// The key this submitter is scoped to.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Enqueues a fire-and-forget task under this submitter's key.
    ///
    /// # Errors
    ///
    /// See [`Distributor::add_task`].
    pub fn execute(&self, task: impl FnOnce() + Send + 'static) -> Result<()> {
        self.distributor.add_task(self.key.clone(), task)
    }

    /// Submits `callable` under this submitter's key.
    ///
    /// # Errors
    ///
    /// See [`Distributor::submit`].
    pub fn submit<T, F>(&self, callable: F) -> Result<CompletableFuture<T>>
    where
        F: FnOnce() -> std::result::Result<T, BoxError> + Send + 'static,
        T: Clone + Send + 'static,
    {
        self.distributor.submit(self.key.clone(), callable)
    }

    /// Submits a fallible-free `runnable` under this submitter's key.
    ///
    /// # Errors
    ///
    /// See [`Distributor::submit_runnable`].
    pub fn submit_runnable<T, F>(&self, runnable: F, result: T) -> Result<CompletableFuture<T>>
    where
        F: FnOnce() + Send + 'static,
        T: Clone + Send + 'static,
    {
        self.distributor.submit_runnable(self.key.clone(), runnable, result)
    }
}

impl<K: DistributorKey> Executor for KeySubmitter<K> {
    fn execute(&self, task: BoxTask) -> std::result::Result<(), BoxError> {
        self.distributor
            .add_boxed_task(self.key.clone(), task)
            .map_err(|error| Box::new(error) as BoxError)
    }
}
