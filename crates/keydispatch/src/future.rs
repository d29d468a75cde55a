// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{BoxError, Error, Result, SharedError};
use crate::executor::Executor;
use crate::failure_hook;

type Listener = Box<dyn FnOnce() + Send>;

enum Outcome<T> {
    Success(T),
    Failure(SharedError),
}

struct State<T> {
    started: bool,
    done: bool,
    canceled: bool,
    outcome: Option<Outcome<T>>,
    listeners: Vec<(Listener, Option<Arc<dyn Executor>>)>,
}

impl<T> Default for State<T> {
    fn default() -> Self {
        Self {
            started: false,
            done: false,
            canceled: false,
            outcome: None,
            listeners: Vec::new(),
        }
    }
}

struct Shared<T> {
    state: Mutex<State<T>>,
    condvar: Condvar,
}

/// A future whose value becomes available when a task completes, with blocking accessors.
///
/// Unlike `std::future::Future`, `CompletableFuture` does not integrate with an async executor:
/// [`get`](Self::get) and [`get_timeout`](Self::get_timeout) block the calling thread. It is
/// produced by [`Distributor::submit`](crate::Distributor::submit) and similar submission
/// methods, and is cheap to clone (internally it is an `Arc` around shared, mutex-guarded state).
///
/// # State machine
///
/// A future starts `pending`. Once the task it wraps begins running it becomes `running`. From
/// either state, [`cancel`](Self::cancel) can be called; if the task had not yet started, the
/// future settles immediately as canceled (`is_cancelled()` becomes `true`). If the task had
/// already started, cancellation does not stop it — it keeps running to completion and its result
/// is still delivered to listeners registered before the cancellation — but every `get`/
/// `get_timeout` call from the moment `cancel` was observed onward reports [`Error::Canceled`],
/// even once the task's real outcome becomes available. Listeners registered after a future has
/// settled (by either path) are dispatched immediately, inline on the registering thread.
#[derive(Clone)]
pub struct CompletableFuture<T: Clone + Send + 'static> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone + Send + 'static> fmt::Debug for CompletableFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("CompletableFuture")
            .field("started", &state.started)
            .field("done", &state.done)
            .field("canceled", &state.canceled)
            .finish()
    }
}

impl<T: Clone + Send + 'static> Default for CompletableFuture<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> CompletableFuture<T> {
    /// Creates a new, pending future.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                condvar: Condvar::new(),
            }),
        }
    }

    /// Runs `callable` and settles this future with its outcome.
    ///
    /// A panic raised by `callable` is caught and recorded as an [`Error::ExecutionFailed`], the
    /// same as an `Err` return value; the worker driving this future's key is never taken down by
    /// a misbehaving task. If this future was canceled before `run` was called, `callable` is not
    /// invoked at all.
    pub(crate) fn run<F>(&self, callable: F)
    where
        F: FnOnce() -> std::result::Result<T, BoxError>,
    {
        {
            let mut state = self.shared.state.lock();
            if state.canceled {
                return;
            }
            state.started = true;
        }

        let outcome = std::panic::catch_unwind(AssertUnwindSafe(callable));
        let (settled, failure) = match outcome {
            Ok(Ok(value)) => (Outcome::Success(value), None),
            Ok(Err(error)) => {
                let shared_error = SharedError::from_boxed(error);
                let failure = Error::ExecutionFailed(shared_error.clone());
                (Outcome::Failure(shared_error), Some(failure))
            }
            Err(payload) => {
                let shared_error = SharedError::from_panic(payload);
                let failure = Error::ExecutionFailed(shared_error.clone());
                (Outcome::Failure(shared_error), Some(failure))
            }
        };

        let listeners = {
            let mut state = self.shared.state.lock();
            state.done = true;
            state.outcome = Some(settled);
            std::mem::take(&mut state.listeners)
        };
        self.shared.condvar.notify_all();
        for (listener, executor) in listeners {
            dispatch_listener(listener, executor);
        }
        if let Some(error) = failure {
            failure_hook::handle_failure(&error);
        }
    }

    /// Attempts to cancel this future.
    ///
    /// Returns `true` only if the task had not yet started running, in which case the future
    /// settles immediately as canceled. If the task had already started, this still marks the
    /// future canceled for the purposes of `get`/`is_cancelled`, returns `false`, and lets the
    /// task run to completion in the background.
    ///
    /// `interrupt_if_running` is accepted for API parity with interrupt-capable futures elsewhere
    /// but has no effect: there is no portable way to interrupt an arbitrary running closure, so a
    /// task that has started always runs to completion.
    pub fn cancel(&self, _interrupt_if_running: bool) -> bool {
        let (was_not_started, listeners) = {
            let mut state = self.shared.state.lock();
            if state.canceled || state.done {
                return false;
            }
            state.canceled = true;
            let was_not_started = !state.started;
            if was_not_started {
                state.done = true;
            }
            (was_not_started, std::mem::take(&mut state.listeners))
        };
        self.shared.condvar.notify_all();
        for (listener, executor) in listeners {
            dispatch_listener(listener, executor);
        }
        was_not_started
    }

    /// Returns `true` once the future has settled, whether by completion or cancellation before
    /// the task started.
    ///
    /// For a future canceled after its task had already started, `is_done` only becomes `true`
    /// once the task actually finishes running.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.shared.state.lock().done
    }

    /// Returns `true` only if this future was canceled before its task started running.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        let state = self.shared.state.lock();
        state.canceled && !state.started
    }

    /// Blocks the calling thread until this future settles, then returns its outcome.
    ///
    /// May be called more than once; every call after the first returns the same outcome.
    pub fn get(&self) -> Result<T> {
        let mut state = self.shared.state.lock();
        while !state.done && !state.canceled {
            self.shared.condvar.wait(&mut state);
        }
        Self::resolve(&state)
    }

    /// Blocks the calling thread until this future settles or `timeout` elapses, whichever comes
    /// first.
    ///
    /// The deadline is computed once from a monotonic clock at the start of the call; spurious
    /// wakeups re-check the settle condition against the same deadline rather than restarting the
    /// timeout.
    pub fn get_timeout(&self, timeout: Duration) -> Result<T> {
        let mut state = self.shared.state.lock();
        let deadline = Instant::now() + timeout;
        while !state.done && !state.canceled {
            let wait_result = self.shared.condvar.wait_until(&mut state, deadline);
            if wait_result.timed_out() && !state.done && !state.canceled {
                return Err(Error::Timeout);
            }
        }
        Self::resolve(&state)
    }

    /// Registers a listener to run inline, on whichever thread observes (or causes) this future
    /// to settle, as soon as it does.
    ///
    /// If the future has already settled, `listener` is dispatched immediately before this method
    /// returns. A listener that panics during inline dispatch is reported to the global failure
    /// hook rather than propagating into the caller that triggered settlement.
    pub fn add_listener(&self, listener: impl FnOnce() + Send + 'static) {
        self.add_listener_on(listener, None);
    }

    /// Registers a listener to run on `executor` once this future settles.
    ///
    /// If the future has already settled, the listener is scheduled on `executor` immediately. If
    /// `executor` rejects the listener, that scheduling failure is reported to the global failure
    /// hook.
    pub fn add_listener_via(&self, listener: impl FnOnce() + Send + 'static, executor: Arc<dyn Executor>) {
        self.add_listener_on(listener, Some(executor));
    }

    fn add_listener_on(&self, listener: impl FnOnce() + Send + 'static, executor: Option<Arc<dyn Executor>>) {
        let listener: Listener = Box::new(listener);
        let mut state = self.shared.state.lock();
        if state.done || state.canceled {
            drop(state);
            dispatch_listener(listener, executor);
        } else {
            state.listeners.push((listener, executor));
        }
    }

    fn resolve(state: &State<T>) -> Result<T> {
        if state.canceled {
            return Err(Error::Canceled);
        }
        match state
            .outcome
            .as_ref()
            .expect("a future marked done always carries an outcome")
        {
            Outcome::Success(value) => Ok(value.clone()),
            Outcome::Failure(error) => Err(Error::ExecutionFailed(error.clone())),
        }
    }
}

fn dispatch_listener(listener: Listener, executor: Option<Arc<dyn Executor>>) {
    match executor {
        Some(executor) => {
            if let Err(error) = executor.execute(listener) {
                let error = Error::SchedulingFailed(SharedError::from_boxed(error));
                failure_hook::handle_failure(&error);
            }
        }
        None => {
            if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(listener)) {
                let error = Error::ExecutionFailed(SharedError::from_panic(payload));
                failure_hook::handle_failure(&error);
            }
        }
    }
}
