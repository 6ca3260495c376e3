//! Memory handles and per-handle telemetry.
//!
//! A handle is a copyable identifier for one named allocation inside the
//! MMU. The allocation record keeps everything the access path needs: the
//! base address, the owning context, the access-type filter used to mimic
//! constant-time implementations, the victim-target line, and the telemetry
//! harvested while an attacker eviction-set watch is installed.

use std::collections::HashSet;

use crate::common::{Address, CacheContext, Tag, CACHE_LINE_SIZE};

/// Identifier of an allocation owned by the MMU.
///
/// Handles are plain indices: they stay valid for the lifetime of the MMU
/// that produced them and borrow it for the duration of every access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MemHandle(pub(crate) usize);

/// Restricts which offsets of a handle propagate to the cache.
///
/// Constant-time victim implementations touch a fixed set of lines
/// regardless of their secret; the filters simulate that by silently
/// swallowing accesses outside the permitted window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AccessFilter {
    /// Every access reaches the cache.
    #[default]
    All,
    /// Only the victim-target line reaches the cache.
    TargetOnly,
    /// Only the first five lines reach the cache.
    FirstFive,
    /// Only the first ten lines reach the cache.
    FirstTen,
    /// Only the first fifteen lines reach the cache.
    FirstFifteen,
}

impl AccessFilter {
    /// Whether an access at `offset` (with the handle's target at
    /// `target`) propagates to the cache.
    pub(crate) fn permits(self, offset: Address, target: Address) -> bool {
        let line = offset / CACHE_LINE_SIZE;
        match self {
            AccessFilter::All => true,
            AccessFilter::TargetOnly => line == target / CACHE_LINE_SIZE,
            AccessFilter::FirstFive => line < 5,
            AccessFilter::FirstTen => line < 10,
            AccessFilter::FirstFifteen => line < 15,
        }
    }
}

/// Eviction telemetry harvested while a watch is installed.
#[derive(Clone, Debug, Default)]
pub(crate) struct HandleTelemetry {
    /// Handle-relative lines whose accesses displaced watched lines.
    pub touched: HashSet<u64>,
    /// Total watched-line displacements caused through this handle.
    pub attacker_evicted: u64,
    /// Displacements caused by an access to the victim-target line.
    pub correct: u64,
    /// Displacements caused by any other line.
    pub incorrect: u64,
}

/// One named allocation.
#[derive(Debug)]
pub(crate) struct Allocation {
    pub name: String,
    pub base: Address,
    pub size: Address,
    pub context: CacheContext,
    pub public: bool,
    pub filter: AccessFilter,
    /// Victim-target offset; the line whose eviction means the attack
    /// observed the right thing.
    pub target: Address,
    /// Attacker eviction-set tags to watch for, if installed.
    pub watch: Option<HashSet<Tag>>,
    pub telemetry: HandleTelemetry,
}

impl Allocation {
    pub(crate) fn permits(&self, offset: Address) -> bool {
        self.filter.permits(offset, self.target)
    }
}
