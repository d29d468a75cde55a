// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::OnceLock;

use crate::error::Error;

type Hook = Box<dyn Fn(&Error) + Send + Sync + 'static>;

static FAILURE_HOOK: OnceLock<Hook> = OnceLock::new();

/// Installs the process-wide failure hook.
///
/// Every task, listener dispatch, or scheduling attempt that fails without a caller positioned to
/// observe the error directly (a bare [`Distributor::add_task`](crate::Distributor::add_task)
/// submission, a panicking task, a listener that panics during inline dispatch, a worker that
/// fails to re-dispatch itself after yielding) is reported here instead.
///
/// Can be called at most once per process; a second call returns
/// [`Error::InvalidArgument`] without replacing the hook already installed. If no hook is ever
/// installed, failures are logged via `tracing` at the `error` level.
pub fn set_failure_hook(hook: impl Fn(&Error) + Send + Sync + 'static) -> crate::error::Result<()> {
    FAILURE_HOOK
        .set(Box::new(hook))
        .map_err(|_| Error::InvalidArgument("a failure hook is already installed".to_string()))
}

pub(crate) fn handle_failure(error: &Error) {
    match FAILURE_HOOK.get() {
        Some(hook) => hook(error),
        None => {
            tracing::error!(
                error = %error,
                "keydispatch: unhandled task failure (call set_failure_hook to customize this)"
            );
        }
    }
}
