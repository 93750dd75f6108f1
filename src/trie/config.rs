// Copyright (c) 2025 Koa Trie Authors
//
// Licensed under MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)

//! Configuration for the Koa Radix Trie.

use std::path::PathBuf;

/// Node variant selected at construction time.
///
/// Variants differ only in the per-node metadata the engine maintains; the
/// attribute storage itself is chosen by the merge strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeVariant {
    /// Plain attribute nodes with no extra metadata.
    #[default]
    Attribute,

    /// Attribute nodes that additionally track, per node, the length of the
    /// longest key terminating in that node's subtree. The counter is kept
    /// consistent eagerly on every insertion and deletion, since recomputing
    /// it on demand would require a full subtree scan.
    MaxLength,
}

/// Configuration options for the Koa Radix Trie.
///
/// Paging is disabled unless a paging depth is set. Validation happens in
/// [`KoaTrie::with_config`](crate::trie::KoaTrie::with_config), which is
/// where configuration errors are reported.
#[derive(Debug, Clone, Default)]
pub struct KoaTrieConfig {
    /// Which node variant the engine maintains.
    node_variant: NodeVariant,

    /// Depth (in edges from the root) at which subtrees are offloaded to the
    /// storage directory. `None` disables paging entirely.
    page_depth: Option<usize>,

    /// Directory that paged subtree files are written to.
    storage_dir: Option<PathBuf>,
}

impl KoaTrieConfig {
    /// Create a new default configuration: plain attribute nodes, no paging.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the node variant the engine maintains.
    pub fn with_node_variant(mut self, variant: NodeVariant) -> Self {
        self.node_variant = variant;
        self
    }

    /// Set the depth at which subtrees are paged out to secondary storage.
    ///
    /// Depth counts edges from the root: with a depth of 2, every subtree
    /// rooted two edges below the root is eligible for paging. A storage
    /// directory must also be configured or construction will fail.
    pub fn with_page_depth(mut self, depth: usize) -> Self {
        self.page_depth = Some(depth);
        self
    }

    /// Set the directory paged subtree files are written to.
    ///
    /// The directory is created and probed for writability when the trie is
    /// constructed.
    pub fn with_storage_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.storage_dir = Some(dir.into());
        self
    }

    /// Get the configured node variant.
    pub fn node_variant(&self) -> NodeVariant {
        self.node_variant
    }

    /// Get the configured paging depth, if any.
    pub fn page_depth(&self) -> Option<usize> {
        self.page_depth
    }

    /// Get the configured storage directory, if any.
    pub fn storage_dir(&self) -> Option<&PathBuf> {
        self.storage_dir.as_ref()
    }
}
