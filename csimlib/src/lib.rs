//! # CsimLib
//!
//! Csimlib simulates a set-associative cache with least recently used replacement, under a
//! write-back, write-allocate policy
//!
//! It replays a trace of loads and stores against a cache of a given geometry, and counts hits,
//! misses, and evictions, along with how many bytes are left dirty in the cache and how many dirty
//! bytes were evicted. Only tags and dirty bits are tracked, never the data
//!
//! The geometry follows the usual convention: 2^s sets, E lines per set, and 2^b byte blocks

/// Contains the cache, its sets, and the blocks they hold
pub mod cache;

/// Contains the cache geometry, which can be parsed from JSON
pub mod config;

/// Contains the errors raised when configuring or simulating
pub mod error;

/// Contains utilities for getting at trace files
pub mod io;

/// Contains the simulator used to replay a trace against a cache
pub mod simulator;

/// Contains the trace format, and the access events it is made of
pub mod trace;

#[cfg(test)]
mod test;

/// Contains utilities for running tests and benchmarks.
pub mod util;
