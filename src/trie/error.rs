// Copyright (c) 2025 Koa Trie Authors
//
// Licensed under MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)

//! Error types for the Koa Radix Trie.
//!
//! Lookup misses are not errors anywhere in this crate; only conditions the
//! caller cannot safely ignore (construction-time configuration problems and
//! subtree page I/O failures) surface through these types.

use std::io;
use std::path::PathBuf;

/// Errors that can occur in Koa Trie operations.
#[derive(Debug, thiserror::Error)]
pub enum KoaTrieError {
    /// A paging depth of zero was requested. Depth counts edges from the
    /// root, so the smallest subtree that can be paged out starts at depth 1.
    #[error("Paging depth must be at least 1")]
    ZeroPageDepth,

    /// A paging depth was configured without a storage directory to page into.
    #[error("Paging depth {depth} requested without a storage directory")]
    MissingStorageDir {
        /// The configured paging depth.
        depth: usize,
    },

    /// The configured storage directory could not be created or written to.
    #[error("Storage directory '{path}' is not usable")]
    StorageDir {
        /// The directory that failed validation.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// A value handed to the delimited-string merge strategy contains the
    /// reserved separator and was rejected at the insertion boundary.
    #[error("Value contains the reserved separator {separator:?}")]
    SeparatorCollision {
        /// The separator the strategy joins segments with.
        separator: char,
    },

    /// A batch passed to a sorted bulk load was not in lexicographic order.
    #[error("Batch keys are not sorted: '{prev}' precedes '{next}'")]
    UnsortedBatch {
        /// The key that appeared first.
        prev: String,
        /// The out-of-order key that followed it.
        next: String,
    },

    /// A paged subtree file could not be read back from storage. This is a
    /// data-availability failure, distinct from an ordinary lookup miss.
    #[error("Failed to read paged subtree file '{file}'")]
    PageRead {
        /// The page file name within the storage directory.
        file: String,
        /// The underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// A paged subtree file was read but could not be decoded. This indicates
    /// on-disk corruption rather than normal absence of a key.
    #[error("Paged subtree file '{file}' is corrupt")]
    PageDecode {
        /// The page file name within the storage directory.
        file: String,
        /// The underlying decode failure.
        #[source]
        source: serde_json::Error,
    },

    /// A paged subtree file could not be written during a save pass.
    #[error("Failed to write paged subtree file '{file}'")]
    PageWrite {
        /// The page file name within the storage directory.
        file: String,
        /// The underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// A stub node was encountered while no subtree store is attached, so it
    /// cannot be resolved back into a live subtree.
    #[error("Encountered paged subtree '{file}' with paging disabled")]
    PageUnavailable {
        /// The page file name the stub refers to.
        file: String,
    },
}

/// Result type for Koa Trie operations.
pub type KoaTrieResult<T> = Result<T, KoaTrieError>;
