// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::panic::AssertUnwindSafe;

use crate::error::{BoxError, Error, SharedError};
use crate::failure_hook;
use crate::future::CompletableFuture;

/// A unit of work handed to a backend [`Executor`].
///
/// Tasks are nullary and fallible only in the sense that running them may panic; anything a task
/// needs to report is captured before it is boxed (see [`CompletableFuture::run`](crate::future)).
pub type BoxTask = Box<dyn FnOnce() + Send + 'static>;

/// A backend capable of running boxed tasks, possibly on another thread.
///
/// `Distributor` and [`KeySubmitter`](crate::KeySubmitter) never run a task themselves; they hand
/// it to an `Executor`. This is the seam that lets the same per-key FIFO scheduling logic sit on
/// top of an inline, same-thread backend, a fixed OS thread pool, or any other executor an
/// embedding application already owns.
pub trait Executor: Send + Sync {
    /// Schedules `task` to run, returning an error if it could not even be scheduled.
    ///
    /// Implementations must not run `task` synchronously and then report a scheduling failure;
    /// once `execute` returns `Ok`, the task is considered accepted and will eventually run (or
    /// panic, which is the caller's concern, not the executor's).
    fn execute(&self, task: BoxTask) -> std::result::Result<(), BoxError>;
}

/// An executor that runs every task synchronously on the calling thread.
///
/// Useful for tests and for single-threaded embeddings where the per-key FIFO ordering guarantee
/// is all that is needed, without any concurrency between keys.
///
/// # Panics
///
/// `execute` never panics itself: a panicking task is caught and reported to the global failure
/// hook, matching the behavior of the thread-pool backed executor.
#[derive(Debug, Default, Clone, Copy)]
pub struct SameThreadExecutor;

impl Executor for SameThreadExecutor {
    fn execute(&self, task: BoxTask) -> std::result::Result<(), BoxError> {
        if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(move || task())) {
            let error = Error::ExecutionFailed(SharedError::from_panic(payload));
            failure_hook::handle_failure(&error);
        }
        Ok(())
    }
}

impl SameThreadExecutor {
    /// Runs `callable` synchronously and returns an already-settled future carrying its outcome.
    ///
    /// Unlike [`Distributor::submit`](crate::Distributor::submit), there is no key, no queue, and
    /// no cooperative yielding: the future is `done` before this call returns.
    #[must_use]
    pub fn submit<T, F>(&self, callable: F) -> CompletableFuture<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> std::result::Result<T, BoxError> + Send + 'static,
    {
        let future = CompletableFuture::new();
        future.run(callable);
        future
    }
}

/// An executor backed by a fixed-size pool of OS threads.
///
/// Wraps a [`threadpool::ThreadPool`]; scheduling a task simply enqueues it onto the pool, which
/// never fails synchronously, so `execute` always returns `Ok`.
#[derive(Clone)]
pub struct ThreadPoolExecutor {
    pool: threadpool::ThreadPool,
}

impl std::fmt::Debug for ThreadPoolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPoolExecutor")
            .field("max_count", &self.pool.max_count())
            .finish()
    }
}

impl ThreadPoolExecutor {
    /// Creates a pool with a fixed number of worker threads.
    #[must_use]
    pub fn new(num_threads: usize) -> Self {
        Self {
            pool: threadpool::ThreadPool::new(num_threads.max(1)),
        }
    }

    /// Creates a named pool, useful for distinguishing worker threads in a debugger or profiler.
    #[must_use]
    pub fn with_name(name: impl Into<String>, num_threads: usize) -> Self {
        Self {
            pool: threadpool::Builder::new()
                .num_threads(num_threads.max(1))
                .thread_name(name.into())
                .build(),
        }
    }

    /// The number of worker threads backing this pool.
    #[must_use]
    pub fn max_count(&self) -> usize {
        self.pool.max_count()
    }
}

impl Executor for ThreadPoolExecutor {
    fn execute(&self, task: BoxTask) -> std::result::Result<(), BoxError> {
        self.pool.execute(move || task());
        Ok(())
    }
}

/// An executor whose `execute` always rejects scheduling, for exercising the `SchedulingFailed`
/// paths in [`Distributor`](crate::Distributor) and the worker drain loop without needing a
/// backend that can genuinely fail (neither [`SameThreadExecutor`] nor [`ThreadPoolExecutor`]
/// ever can).
#[cfg(test)]
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct FailingExecutor;

#[cfg(test)]
impl Executor for FailingExecutor {
    fn execute(&self, _task: BoxTask) -> std::result::Result<(), BoxError> {
        Err("backend refused to schedule task".into())
    }
}
