//! Cache-model tests.

/// Fully-associative cache and replacement policies.
pub mod assoc;

/// CEASER and CEASER-S.
pub mod ceaser;

/// Hierarchy propagation.
pub mod hierarchy;

/// Way-partitioning and per-line locking.
pub mod partition;

/// Set-associative indexing.
pub mod set_assoc;

/// Scatter, phantom, and NewCache.
pub mod skewed;
