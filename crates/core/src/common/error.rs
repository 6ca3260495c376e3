//! Crate-wide error type.
//!
//! Errors occur only at experiment boundaries: loading and validating a
//! configuration document, allocating named memory regions, and writing
//! result files. The access hot path is infallible; out-of-range handle
//! offsets are programming bugs and panic instead of returning an error.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by configuration loading, allocation, and reporting.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration file could not be read.
    #[error("cannot read configuration `{path}`: {source}")]
    ConfigRead {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not a valid hierarchy document.
    #[error("cannot parse configuration `{path}`: {source}")]
    ConfigParse {
        /// Offending path.
        path: PathBuf,
        /// Underlying parse error.
        source: serde_json::Error,
    },

    /// The document describes no cache levels at all.
    #[error("configuration describes no cache levels")]
    EmptyHierarchy,

    /// A level number is out of range or repeated.
    #[error("invalid cache level {level}: levels must be 1..={count} and unique")]
    InvalidLevel {
        /// The offending level number.
        level: u32,
        /// Number of levels in the document.
        count: usize,
    },

    /// A geometry field that must be non-zero is zero.
    #[error("cache level {level}: `{field}` must be non-zero")]
    ZeroGeometry {
        /// The offending level number.
        level: u32,
        /// Name of the zero field.
        field: &'static str,
    },

    /// The line count does not divide into the requested ways.
    #[error("cache level {level}: {lines} lines do not divide into {ways}-way sets")]
    IndivisibleWays {
        /// The offending level number.
        level: u32,
        /// Configured number of lines.
        lines: usize,
        /// Configured number of ways.
        ways: usize,
    },

    /// The requested replacement policy cannot drive this cache type.
    #[error("cache level {level}: policy `{policy}` is incompatible with type `{cache_type}`")]
    IncompatiblePolicy {
        /// The offending level number.
        level: u32,
        /// The requested policy name.
        policy: String,
        /// The cache type it cannot drive.
        cache_type: String,
    },

    /// A named allocation already exists and cannot be shared.
    #[error("allocation `{0}` already exists and is not public")]
    AllocationTaken(String),

    /// Result file I/O failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
