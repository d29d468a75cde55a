// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::hash::Hash;

/// The bounds a type must satisfy to be used as a distribution key.
///
/// Blanket-implemented for every type that already satisfies the bounds; this exists purely to
/// avoid repeating the same five-trait bound on every public signature in this crate.
pub trait DistributorKey: Eq + Hash + Clone + Send + Sync + Debug + 'static {}

impl<K> DistributorKey for K where K: Eq + Hash + Clone + Send + Sync + Debug + 'static {}
