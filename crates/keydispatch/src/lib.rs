// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-key serial task distribution over an arbitrary multi-threaded executor.
//!
//! `keydispatch` guarantees that tasks submitted under the same key run one at a time, in
//! submission order, while tasks submitted under different keys may run concurrently, bounded only
//! by the backend [`Executor`] they are dispatched onto. It is the kind of primitive you reach for
//! when you need per-entity ordering (per-user, per-connection, per-shard) without paying for a
//! dedicated thread or actor per entity and without a single global lock serializing unrelated
//! keys against each other.
//!
//! # When to use
//!
//! Use [`Distributor`] when independent producers submit tasks keyed by some identifier and you
//! need "everything for key K happens in the order it was submitted, and nothing for key K runs
//! concurrently with anything else for key K" without hand-rolling a per-key queue and worker loop.
//! If you do not need per-key ordering at all, a plain [`Executor`] (or your own thread pool) is
//! simpler and has less overhead.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use keydispatch::{Distributor, SameThreadExecutor};
//!
//! let distributor: Distributor<&str> =
//!     Distributor::new(Arc::new(SameThreadExecutor), 16, 16).expect("valid configuration");
//!
//! let future = distributor
//!     .submit("user-42", || Ok::<_, keydispatch::BoxError>(21 * 2))
//!     .expect("scheduled");
//! assert_eq!(future.get().expect("task succeeded"), 42);
//! ```
//!
//! # Cancellation and panic safety
//!
//! A [`CompletableFuture`] can be canceled before its task starts, preventing it from ever running.
//! Canceling a future whose task has already started does not stop it; see
//! [`CompletableFuture::cancel`] for the exact semantics. A task that panics instead of returning
//! normally never takes down the worker driving its key: the panic is caught, turned into an
//! [`Error::ExecutionFailed`], delivered to the future (if there is one), and reported to the
//! global failure hook (see [`set_failure_hook`]).
//!
//! # Thread safety
//!
//! Every public type in this crate is `Send + Sync` and safe to share across threads, typically by
//! cloning a [`Distributor`] (cheap: it is an `Arc` around its shared state) into each producer.
//!
//! # Efficiency
//!
//! The key→worker map is sharded across a fixed number of stripes (see [`StripedLock`]), so
//! unrelated keys rarely contend with each other even under high key cardinality. A worker yields
//! back to the backend executor after running `max_tasks_per_cycle` tasks, so one persistently busy
//! key cannot starve other keys waiting on the same backend thread pool.

mod distributor;
mod error;
mod executor;
mod failure_hook;
mod future;
mod key;
mod striped;
mod submitter;
mod worker;

pub use distributor::{Distributor, DistributorConfig};
pub use error::{BoxError, Error, Result, SharedError};
pub use executor::{BoxTask, Executor, SameThreadExecutor, ThreadPoolExecutor};
pub use failure_hook::set_failure_hook;
pub use future::CompletableFuture;
pub use key::DistributorKey;
pub use striped::{StripeGuard, StripedLock};
pub use submitter::KeySubmitter;
