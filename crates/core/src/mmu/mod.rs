//! MMU: the named-allocation layer between workloads and the cache.
//!
//! The MMU owns a contiguous simulated address space and the cache under
//! test. Workloads allocate named regions and access them by handle plus
//! offset; every access translates to a line tag, passes the handle's
//! access-type filter, reaches the cache under the handle's context, and
//! feeds the per-handle eviction telemetry.
//!
//! Ownership is strict: handles are indices into the MMU's allocation
//! table, never references, so an access borrows the MMU for exactly the
//! duration of the call and nothing outlives it.

/// Handle, filter, and telemetry definitions.
pub mod handle;

use std::collections::{HashMap, HashSet};

use crate::cache::{Cache, CacheResponse};
use crate::common::{Address, CacheContext, Error, Rng, Tag, CACHE_LINE_SIZE};

pub use handle::{AccessFilter, MemHandle};

use handle::{Allocation, HandleTelemetry};

/// Default allocation alignment in bytes.
const DEFAULT_ALIGN: Address = 128;

/// Kinds of access a handle can issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AccessKind {
    Read,
    Write,
    Exec,
    Flush,
}

/// The memory-management unit.
#[derive(Debug)]
pub struct Mmu {
    cache: Cache,
    next_free: Address,
    allocations: Vec<Option<Allocation>>,
    by_name: HashMap<String, Vec<usize>>,
    scratch: Vec<CacheResponse>,
}

impl Mmu {
    /// Wraps a cache with the allocation space starting at a fixed page.
    pub fn new(cache: Cache) -> Mmu {
        Mmu {
            cache,
            next_free: 4096,
            allocations: Vec::new(),
            by_name: HashMap::new(),
            scratch: Vec::with_capacity(8),
        }
    }

    /// Wraps a cache with a randomised base page, so repeated experiments
    /// see different absolute tags.
    pub fn with_random_base(cache: Cache, rng: &mut Rng) -> Mmu {
        let mut mmu = Mmu::new(cache);
        mmu.next_free = rng.below(1024) * 4096;
        mmu
    }

    /// The cache under test.
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// The cache under test, mutable.
    pub fn cache_mut(&mut self) -> &mut Cache {
        &mut self.cache
    }

    /// Allocates `size` bytes under `name` with default alignment.
    pub fn allocate(
        &mut self,
        name: &str,
        size: Address,
        ctx: CacheContext,
        public: bool,
    ) -> Result<MemHandle, Error> {
        self.allocate_aligned(name, size, DEFAULT_ALIGN, 0, ctx, public)
    }

    /// Allocates `size` bytes under `name` at the next `align`-aligned
    /// address plus `fix`.
    ///
    /// A *public* name may be allocated once per context; later allocations
    /// share the first one's base address, which simulates shared code or
    /// tables. Re-allocating a non-public name is an error.
    pub fn allocate_aligned(
        &mut self,
        name: &str,
        size: Address,
        align: Address,
        fix: Address,
        ctx: CacheContext,
        public: bool,
    ) -> Result<MemHandle, Error> {
        assert!(align > 0, "alignment must be non-zero");
        let mut shared_base = None;
        if let Some(indices) = self.by_name.get(name) {
            let live: Vec<usize> = indices
                .iter()
                .copied()
                .filter(|&i| self.allocations[i].is_some())
                .collect();
            if let Some(&first) = live.first() {
                let existing = self.allocations[first].as_ref().expect("live index");
                if !public || !existing.public {
                    return Err(Error::AllocationTaken(name.to_owned()));
                }
                if let Some(&index) = live.iter().find(|&&i| {
                    self.allocations[i]
                        .as_ref()
                        .is_some_and(|a| a.context == ctx)
                }) {
                    return Ok(MemHandle(index));
                }
                shared_base = Some(existing.base);
            }
        }

        if let Some(base) = shared_base {
            return Ok(self.insert(name, base, size, ctx, true));
        }

        let mut base = (self.next_free + align - 1) / align * align;
        base += fix;
        self.next_free = base + size;
        Ok(self.insert(name, base, size, ctx, public))
    }

    fn insert(
        &mut self,
        name: &str,
        base: Address,
        size: Address,
        ctx: CacheContext,
        public: bool,
    ) -> MemHandle {
        let index = self.allocations.len();
        self.allocations.push(Some(Allocation {
            name: name.to_owned(),
            base,
            size,
            context: ctx,
            public,
            filter: AccessFilter::All,
            target: 0,
            watch: None,
            telemetry: HandleTelemetry::default(),
        }));
        self.by_name.entry(name.to_owned()).or_default().push(index);
        MemHandle(index)
    }

    /// Releases an allocation. The address space is not reused.
    pub fn free(&mut self, handle: MemHandle) {
        if let Some(alloc) = self.allocations[handle.0].take() {
            if let Some(indices) = self.by_name.get_mut(&alloc.name) {
                indices.retain(|&i| i != handle.0);
                if indices.is_empty() {
                    self.by_name.remove(&alloc.name);
                }
            }
        }
    }

    fn alloc(&self, handle: MemHandle) -> &Allocation {
        self.allocations[handle.0]
            .as_ref()
            .expect("access through a freed memory handle")
    }

    fn alloc_mut(&mut self, handle: MemHandle) -> &mut Allocation {
        self.allocations[handle.0]
            .as_mut()
            .expect("access through a freed memory handle")
    }

    /// Absolute address of `offset` within the allocation.
    ///
    /// # Panics
    ///
    /// Out-of-range offsets are programming bugs and abort.
    pub fn translate(&self, handle: MemHandle, offset: Address) -> Address {
        let alloc = self.alloc(handle);
        assert!(
            offset < alloc.size,
            "offset {offset:#x} outside allocation `{}` of {:#x} bytes",
            alloc.name,
            alloc.size
        );
        alloc.base + offset
    }

    /// Size in bytes of the allocation.
    pub fn size_of(&self, handle: MemHandle) -> Address {
        self.alloc(handle).size
    }

    /// Context the allocation belongs to.
    pub fn context_of(&self, handle: MemHandle) -> CacheContext {
        self.alloc(handle).context
    }

    /// Sets the handle's access-type filter.
    pub fn set_access_filter(&mut self, handle: MemHandle, filter: AccessFilter) {
        self.alloc_mut(handle).filter = filter;
    }

    /// Marks the offset whose line counts as the victim target.
    pub fn set_victim_target(&mut self, handle: MemHandle, offset: Address) {
        self.alloc_mut(handle).target = offset;
    }

    /// Installs the attacker eviction-set watch: subsequent accesses count
    /// displacements of the given line tags.
    pub fn install_watch(&mut self, handle: MemHandle, watch: HashSet<Tag>) {
        self.alloc_mut(handle).watch = Some(watch);
    }

    /// Removes the watch, leaving the counters readable.
    pub fn clear_watch(&mut self, handle: MemHandle) {
        self.alloc_mut(handle).watch = None;
    }

    /// Watched-line displacements since the last reset.
    pub fn attacker_addresses_evicted(&self, handle: MemHandle) -> u64 {
        self.alloc(handle).telemetry.attacker_evicted
    }

    /// Displacements attributable to the victim-target line.
    pub fn correct_evictions(&self, handle: MemHandle) -> u64 {
        self.alloc(handle).telemetry.correct
    }

    /// Displacements attributable to any other line.
    pub fn incorrect_evictions(&self, handle: MemHandle) -> u64 {
        self.alloc(handle).telemetry.incorrect
    }

    /// Number of distinct lines that displaced watched lines.
    pub fn unique_tags(&self, handle: MemHandle) -> u64 {
        self.alloc(handle).telemetry.touched.len() as u64
    }

    /// Zeroes the watched-displacement counter.
    pub fn reset_attacker_addresses_evicted(&mut self, handle: MemHandle) {
        self.alloc_mut(handle).telemetry.attacker_evicted = 0;
    }

    /// Zeroes the correct/incorrect attribution counters.
    pub fn reset_eviction_split(&mut self, handle: MemHandle) {
        let telemetry = &mut self.alloc_mut(handle).telemetry;
        telemetry.correct = 0;
        telemetry.incorrect = 0;
    }

    /// Forgets the distinct-line record.
    pub fn clear_unique_tags(&mut self, handle: MemHandle) {
        self.alloc_mut(handle).telemetry.touched.clear();
    }

    fn eviction_check(&mut self, handle: MemHandle, offset: Address, last: Option<CacheResponse>) {
        let Some(last) = last else { return };
        if !last.eviction {
            return;
        }
        let alloc = self.allocations[handle.0]
            .as_mut()
            .expect("access through a freed memory handle");
        let Some(watch) = &alloc.watch else { return };
        if watch.contains(&last.evicted_tag) {
            if offset / CACHE_LINE_SIZE == alloc.target / CACHE_LINE_SIZE {
                alloc.telemetry.correct += 1;
            } else {
                alloc.telemetry.incorrect += 1;
            }
            alloc.telemetry.touched.insert(offset / CACHE_LINE_SIZE);
            alloc.telemetry.attacker_evicted += 1;
        }
    }

    fn access_with(
        &mut self,
        handle: MemHandle,
        offset: Address,
        kind: AccessKind,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        let start = responses.len();
        let alloc = self.alloc(handle);
        assert!(
            offset < alloc.size,
            "offset {offset:#x} outside allocation `{}` of {:#x} bytes",
            alloc.name,
            alloc.size
        );
        let permitted = alloc.permits(offset);
        let tag = Tag::of(alloc.base + offset);
        let ctx = alloc.context;

        let hit = if permitted {
            match kind {
                AccessKind::Read => self.cache.read_with(tag, ctx, responses),
                AccessKind::Write => self.cache.write_with(tag, ctx, responses),
                AccessKind::Exec => self.cache.exec_with(tag, ctx, responses),
                AccessKind::Flush => self.cache.evict_with(tag, ctx, responses),
            }
        } else {
            false
        };

        self.eviction_check(handle, offset, responses[start..].last().copied());
        hit
    }

    fn access(&mut self, handle: MemHandle, offset: Address, kind: AccessKind) -> bool {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        let hit = self.access_with(handle, offset, kind, &mut scratch);
        self.scratch = scratch;
        hit
    }

    /// Read access at `offset`. Returns whether the cache hit.
    pub fn read(&mut self, handle: MemHandle, offset: Address) -> bool {
        self.access(handle, offset, AccessKind::Read)
    }

    /// Read access that also appends the per-level cache responses.
    pub fn read_with(
        &mut self,
        handle: MemHandle,
        offset: Address,
        responses: &mut Vec<CacheResponse>,
    ) -> bool {
        self.access_with(handle, offset, AccessKind::Read, responses)
    }

    /// Write access at `offset`.
    pub fn write(&mut self, handle: MemHandle, offset: Address) -> bool {
        self.access(handle, offset, AccessKind::Write)
    }

    /// Instruction-fetch access at `offset`.
    pub fn exec(&mut self, handle: MemHandle, offset: Address) -> bool {
        self.access(handle, offset, AccessKind::Exec)
    }

    /// Flushes the line at `offset` out of the cache.
    pub fn flush(&mut self, handle: MemHandle, offset: Address) -> bool {
        self.access(handle, offset, AccessKind::Flush)
    }

    /// Asks the cache whether the two handle offsets could ever compete
    /// for a way.
    pub fn has_collision(
        &self,
        handle: MemHandle,
        offset: Address,
        other: MemHandle,
        other_offset: Address,
    ) -> bool {
        let a = self.translate(handle, offset);
        let b = self.translate(other, other_offset);
        self.cache.has_collision(
            Tag::of(a),
            self.context_of(handle),
            Tag::of(b),
            self.context_of(other),
        )
    }
}
