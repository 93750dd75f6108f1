//! Koa Trie Library
//!
//! This library implements a radix trie indexing engine: a mapping from
//! string keys to one or more associated values with exact lookup, prefix
//! enumeration, and longest-prefix matching. How multiple values attached
//! to the same key are combined is pluggable, and an optional out-of-core
//! mode offloads deep subtrees to secondary storage to bound memory use on
//! very large key sets.
//!
//! # Architecture
//!
//! The engine is designed with the following principles in mind:
//! - A single exclusively-owned node graph; no locking, no shared mutation
//! - Strategy traits at the attribute-merge seam rather than inheritance
//! - Running counters maintained transactionally, never recomputed by scan
//! - Comprehensive error handling with explicit propagation
//! - Not-found is a result, not an error

// Re-export public modules
pub mod trie;

// Feature-gated modules
#[cfg(feature = "benchmarking")]
pub mod bench;

// Re-export the engine surface at the crate root
pub use trie::{
    Accumulate, AttributeMerge, Joined, KoaTrie, KoaTrieConfig, KoaTrieError, KoaTrieResult,
    NodeSummary, NodeVariant, Replace, TrieStats, DEFAULT_SEPARATOR,
};

/// Version information for the Koa Trie crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
