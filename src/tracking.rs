// SPDX-License-Identifier: AGPL-3.0-or-later
//! Executed-graph tracking (feature `track-execution`).
//!
//! A single process-wide atomic word records which `graph_index` values
//! have executed at least one task. The reporting layer uses it to
//! catch a silently dead configuration: validation enabled, counts
//! requested, but a graph that never ran. This is the only mutable
//! global in the crate.

use std::sync::atomic::{AtomicU64, Ordering};

static EXECUTED: AtomicU64 = AtomicU64::new(0);

/// Largest trackable `graph_index` (one bit per graph).
pub const MAX_TRACKED_GRAPHS: i64 = 64;

/// Record that a task of `graph_index` executed.
///
/// # Panics
///
/// Panics if `graph_index` does not fit the mask.
pub fn record_executed(graph_index: i64) {
    assert!(
        (0..MAX_TRACKED_GRAPHS).contains(&graph_index),
        "graph index {graph_index} exceeds the {MAX_TRACKED_GRAPHS}-graph tracking mask"
    );
    EXECUTED.fetch_or(1 << graph_index, Ordering::Relaxed);
}

/// Whether any task of `graph_index` has executed.
#[must_use]
pub fn graph_executed(graph_index: i64) -> bool {
    (0..MAX_TRACKED_GRAPHS).contains(&graph_index)
        && EXECUTED.load(Ordering::Relaxed) & (1 << graph_index) != 0
}

/// Raw mask of executed graph indices.
#[must_use]
pub fn executed_mask() -> u64 {
    EXECUTED.load(Ordering::Relaxed)
}

/// Clear the mask. For tests.
pub fn reset_executed() {
    EXECUTED.store(0, Ordering::Relaxed);
}
