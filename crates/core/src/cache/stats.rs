//! Per-context cache access statistics.

/// Monotone counters for one security domain's accesses to one cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStatistics {
    /// Read accesses that hit.
    pub read_hits: u64,
    /// Read accesses that missed.
    pub read_misses: u64,
    /// Read misses that displaced a resident line.
    pub read_evictions: u64,
    /// Write accesses that hit.
    pub write_hits: u64,
    /// Write accesses that missed.
    pub write_misses: u64,
    /// Write misses that displaced a resident line.
    pub write_evictions: u64,
    /// Exec accesses that hit.
    pub exec_hits: u64,
    /// Exec accesses that missed.
    pub exec_misses: u64,
    /// Exec misses that displaced a resident line.
    pub exec_evictions: u64,
    /// Invalidations that found their line.
    pub inv_hits: u64,
    /// Invalidations that found nothing.
    pub inv_misses: u64,
}

impl CacheStatistics {
    /// Field values in the canonical report order.
    pub fn as_row(&self) -> [u64; 11] {
        [
            self.read_hits,
            self.read_misses,
            self.read_evictions,
            self.write_hits,
            self.write_misses,
            self.write_evictions,
            self.exec_hits,
            self.exec_misses,
            self.exec_evictions,
            self.inv_hits,
            self.inv_misses,
        ]
    }

    /// Canonical column names matching [`CacheStatistics::as_row`].
    pub fn column_names(prefix: &str) -> Vec<String> {
        [
            "RdHits", "RdMisses", "RdEvictions", "WrHits", "WrMisses", "WrEvictions", "ExecHits",
            "ExecMisses", "ExecEvictions", "InvHits", "InvMisses",
        ]
        .iter()
        .map(|name| format!("{prefix}{name}"))
        .collect()
    }
}

impl std::fmt::Display for CacheStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Read Hits: {}", self.read_hits)?;
        writeln!(f, "Read Misses: {}", self.read_misses)?;
        writeln!(f, "Read Evictions: {}", self.read_evictions)?;
        writeln!(f, "Write Hits: {}", self.write_hits)?;
        writeln!(f, "Write Misses: {}", self.write_misses)?;
        writeln!(f, "Write Evictions: {}", self.write_evictions)?;
        writeln!(f, "Exec Hits: {}", self.exec_hits)?;
        writeln!(f, "Exec Misses: {}", self.exec_misses)?;
        writeln!(f, "Exec Evictions: {}", self.exec_evictions)?;
        writeln!(f, "Invalidation Hits: {}", self.inv_hits)?;
        write!(f, "Invalidation Misses: {}", self.inv_misses)
    }
}
