// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A bounded-wait harness for blocking test scenarios.
//!
//! Grounded on `oxidizer_testing::execute_or_abandon`: a deadlock regression in the distributor or
//! a future's blocking accessors should fail the test suite with a clear timeout, rather than hang
//! the whole run.

#![allow(dead_code, reason = "not every test binary in this directory exercises every helper")]

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// How long a scenario is allowed to run before it is considered hung.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs `f` on a background thread, returning its result if it finishes within
/// [`TEST_TIMEOUT`], or `None` if it did not.
pub fn execute_or_abandon<F, R>(f: F) -> Option<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let _ = sender.send(f());
    });
    receiver.recv_timeout(TEST_TIMEOUT).ok()
}
