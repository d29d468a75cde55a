// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// A specialized `Result` type for keydispatch operations that return a [`Error`][enum@Error] on
/// failure.
pub type Result<T> = std::result::Result<T, Error>;

/// A type-erased error produced by a task, callable, listener, or backend executor.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// An error originating in keydispatch.
///
/// This is an umbrella type for all kinds of errors the distributor and the futures it hands out
/// can report, including programming errors (invalid configuration) and errors re-packaged from
/// user tasks or the backend executor. Future versions may add additional enum variants.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The caller supplied an invalid argument (e.g. a zero-sized configuration value).
    #[error("{0}")]
    InvalidArgument(String),

    /// The task completed with a failure instead of a value.
    #[error("task execution failed: {0}")]
    ExecutionFailed(SharedError),

    /// The future was canceled before a result became available, or after cancellation was
    /// observed while the task was already running.
    #[error("the task was canceled before a result could be delivered")]
    Canceled,

    /// The waiting operation's deadline elapsed before the task settled.
    #[error("timed out waiting for the task to complete")]
    Timeout,

    /// The backend executor refused to schedule a task or worker cycle.
    #[error("the backend executor refused to schedule the task: {0}")]
    SchedulingFailed(SharedError),
}

/// A cheaply cloneable, type-erased error.
///
/// [`CompletableFuture::get`](crate::CompletableFuture::get) may be called any number of times
/// after a future settles, and each call must observe the same failure. Plain `BoxError` cannot be
/// cloned, so a failed outcome is captured once behind an `Arc` and handed out from there.
#[derive(Debug, Clone)]
pub struct SharedError(Arc<dyn std::error::Error + Send + Sync + 'static>);

impl SharedError {
    /// Wraps an arbitrary error.
    pub fn new(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Arc::new(error))
    }

    pub(crate) fn from_boxed(error: BoxError) -> Self {
        Self(Arc::from(error))
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self(Arc::new(PanicPayload(message)))
    }
}

impl fmt::Display for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for SharedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

#[derive(Debug)]
struct PanicPayload(String);

impl fmt::Display for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task panicked: {}", self.0)
    }
}

impl std::error::Error for PanicPayload {}
